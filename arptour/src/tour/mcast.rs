//! Multicast termination handshake
//!
//! The last node announces the end of the tour to the rendezvous group;
//! every member identifies itself once and then drains further messages
//! until five seconds pass in silence, at which point it leaves the
//! group and the tour process exits.

use std::time::Duration;

use log::info;

use crate::{
    sock::{mcast::McastPair, poll},
    Result,
};

/// Silence window ending the handshake
pub const HANDSHAKE_SILENCE: Duration = Duration::from_secs(5);

/// Substring marking an end-of-tour announcement
const IDENTIFY_MARK: &str = "identify";

/// Announcement sent by the terminal node.
pub fn identify_message(hostname: &str) -> String {
    format!(
        "<<<<<This is node {hostname}. Tour has ended. \
         Group members please identify yourselves.>>>>>"
    )
}

/// Response sent once by every member.
pub fn member_message(hostname: &str) -> String {
    format!("<<<<<Node {hostname}. I am a member of the group.>>>>>")
}

/// True when `msg` asks the group to identify.
pub fn is_identify(msg: &str) -> bool {
    msg.contains(IDENTIFY_MARK)
}

/// Send the end-of-tour announcement (terminal node only).
pub fn announce_end(pair: &McastPair, hostname: &str) -> Result<()> {
    let msg = identify_message(hostname);
    info!(target: "tour", "node {hostname}, sending: {msg}");
    pair.send(&msg)?;
    Ok(())
}

/// Handle one received multicast datagram.
///
/// Returns `true` when the handshake has completed and the tour should
/// finish. On an identification request this node responds once, then
/// keeps reading until no datagram arrives for five seconds.
pub fn process_message(pair: &mut McastPair, hostname: &str, msg: &str) -> Result<bool> {
    info!(target: "tour", "node {hostname}, received: {msg}");

    if !is_identify(msg) {
        return Ok(false);
    }

    let response = member_message(hostname);
    info!(target: "tour", "node {hostname}, sending: {response}");
    pair.send(&response)?;

    // Bounded wait: read everything the group still has to say, exit
    // after five silent seconds
    loop {
        if !poll::wait_readable_one(pair.recv_fd(), HANDSHAKE_SILENCE)? {
            return Ok(true);
        }
        let msg = pair.recv()?;
        info!(target: "tour", "node {hostname}, received: {msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_message_marks() {
        assert!(is_identify(&identify_message("vm1")));
    }

    #[test]
    fn test_member_message_does_not_mark() {
        assert!(!is_identify(&member_message("vm1")));
    }

    #[test]
    fn test_message_texts() {
        assert_eq!(
            member_message("vm3"),
            "<<<<<Node vm3. I am a member of the group.>>>>>"
        );
        assert!(identify_message("vm1").starts_with("<<<<<This is node vm1."));
    }
}
