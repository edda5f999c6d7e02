//! Tour forwarder
//!
//! Owns the raw tour socket and the multicast pair, advances arriving
//! route packets, and starts a ping worker whenever an arrival exposes a
//! predecessor edge this node has not observed earlier in the sequence.
//! The packet is always retransmitted before the ping worker is spawned,
//! so forwarding never waits on ARP resolution.

use std::{net::Ipv4Addr, thread, time::Duration};

use log::{info, warn};

use crate::{
    arp::areq::areq,
    net::{
        interface,
        ip::{IPPROTO_ICMP, IPPROTO_TOUR},
        tour::{TourPacket, MCAST_GROUP, MCAST_PORT},
    },
    sock::{mcast::McastPair, poll, raw::RawIpSocket},
    tour::{build_sequence, mcast, ping::PingManager},
    util, Result,
};

/// Grace period before the terminal node announces the end of the tour,
/// letting echo replies from the final predecessor visit arrive
pub const TERMINAL_GRACE: Duration = Duration::from_secs(5);

/// Per-node tour daemon state
pub struct TourService {
    hostname: String,
    ip: Ipv4Addr,
    rt: RawIpSocket,
    mcast: McastPair,
    ping: PingManager,
}

impl TourService {
    /// Resolve the local identity and create every owned socket.
    /// Failure here is fatal to the daemon.
    pub fn new() -> Result<Self> {
        let hostname = util::local_hostname()?;
        let ip = util::hostname_to_ip(&hostname)?;
        let iface = interface::discover()?;

        info!(target: "tour", "module started on {hostname} ({ip})");

        let rt = RawIpSocket::open(IPPROTO_TOUR, true)?;
        let icmp = RawIpSocket::open(IPPROTO_ICMP, false)?;
        let ping = PingManager::new(icmp, iface.name.clone(), ip);
        let mcast = McastPair::open(MCAST_GROUP, MCAST_PORT)?;

        Ok(Self {
            hostname,
            ip,
            rt,
            mcast,
            ping,
        })
    }

    /// Source path: build the sequence, join the group, emit packet one.
    pub fn start(&mut self, hosts: &[String]) -> Result<()> {
        let nodes = build_sequence(&self.hostname, self.ip, hosts)?;
        let sequence: Vec<Ipv4Addr> = nodes.iter().map(|n| n.ip).collect();

        self.mcast.join()?;

        let packet = TourPacket::initial(sequence);
        info!(
            target: "tour",
            "sending routing packet to <{}> {} of {}",
            util::host_label(packet.ip.destination),
            packet.header.index + 1,
            packet.header.seq_length
        );
        self.rt
            .send_to(packet.ip.destination, &packet.to_bytes())?;
        Ok(())
    }

    /// Event loop over the tour socket and the multicast receiver.
    /// Returns once the termination handshake has completed.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let fds = [self.rt.as_raw_fd(), self.mcast.recv_fd()];
            let ready = poll::wait_readable(&fds, None)?;

            if ready[0] {
                if let Err(e) = self.process_tour() {
                    warn!(target: "tour", "tour packet error: {e}");
                }
            }
            if ready[1] {
                let msg = self.mcast.recv()?;
                if mcast::process_message(&mut self.mcast, &self.hostname, &msg)? {
                    self.finish()?;
                    return Ok(());
                }
            }
        }
    }

    /// Handle one arriving route packet.
    fn process_tour(&mut self) -> Result<()> {
        let mut buf = [0u8; 1024];
        let (n, _) = self.rt.recv_from(&mut buf)?;

        let mut packet = match TourPacket::from_bytes(&buf[..n]) {
            Ok(packet) => packet,
            // Malformed packets on the tour protocol are dropped silently
            Err(_) => return Ok(()),
        };
        if !TourPacket::is_tour(&packet.ip) {
            return Ok(());
        }

        info!(
            target: "tour",
            "received routing packet from <{}>",
            util::host_label(packet.ip.source)
        );

        // First arrival at this node joins the rendezvous group
        self.mcast.join()?;

        packet.header.index += 1;
        let index = usize::from(packet.header.index);
        let len = usize::from(packet.header.seq_length);

        if index < len {
            packet.retarget(self.ip);
            info!(
                target: "tour",
                "sending routing packet to <{}> {} of {}",
                util::host_label(packet.ip.destination),
                index + 1,
                len
            );
            // The tour is best-effort; a lost packet is not retried
            if let Err(e) = self.rt.send_to(packet.ip.destination, &packet.to_bytes()) {
                warn!(target: "tour", "routing packet send failed: {e}");
            }
        } else {
            info!(target: "tour", "routing packet reached the last node");
        }

        if index >= 2 && index <= len {
            if preceding_pair_seen(index, &packet.sequence) {
                info!(target: "tour", "preceding node has been pinged before");
            } else {
                info!(target: "tour", "new preceding node, calling areq and ping");
                let target = packet.sequence[index - 2];
                match areq(target) {
                    Ok(hw) => self.ping.spawn(target, hw.mac()),
                    // Ping failure never halts the tour
                    Err(e) => warn!(target: "tour", "areq for {target} failed: {e}"),
                }
            }
        }

        if index == len {
            thread::sleep(TERMINAL_GRACE);
            mcast::announce_end(&self.mcast, &self.hostname)?;
        }

        Ok(())
    }

    /// Leave the group and log the end of the tour.
    fn finish(&mut self) -> Result<()> {
        info!(target: "tour", "<{}> tour has ended", self.hostname);
        self.mcast.leave()
    }
}

/// Has the edge that just arrived (sequence[index-2] forwarding to
/// sequence[index-1]) appeared earlier in the sequence in the same
/// order? `index` is the already advanced header index.
///
/// Prevents duplicate pings when the tour revisits the same edge.
pub fn preceding_pair_seen(index: usize, sequence: &[Ipv4Addr]) -> bool {
    if index < 2 || index > sequence.len() {
        return false;
    }
    let local = index - 1;
    let prev = index - 2;
    (1..local).any(|i| sequence[i] == sequence[local] && sequence[i - 1] == sequence[prev])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(last_octets: &[u8]) -> Vec<Ipv4Addr> {
        last_octets
            .iter()
            .map(|&o| Ipv4Addr::new(10, 0, 0, o))
            .collect()
    }

    #[test]
    fn test_first_hop_is_new() {
        // v1 -> v2: nothing earlier to match
        assert!(!preceding_pair_seen(2, &seq(&[1, 2, 3, 1])));
    }

    #[test]
    fn test_fresh_edges_are_new() {
        let s = seq(&[1, 2, 3, 1]);
        assert!(!preceding_pair_seen(3, &s)); // v2 -> v3
        assert!(!preceding_pair_seen(4, &s)); // v3 -> v1 at the terminal
    }

    #[test]
    fn test_revisited_edge_is_skipped() {
        // v1 v2 v3 v2 v3: the second v2 -> v3 arrival repeats positions 1 -> 2
        let s = seq(&[1, 2, 3, 2, 3]);
        assert!(preceding_pair_seen(5, &s));
    }

    #[test]
    fn test_same_node_different_predecessor_is_new() {
        // v3 is revisited but via v4 this time
        let s = seq(&[1, 2, 3, 4, 3]);
        assert!(!preceding_pair_seen(5, &s));
    }

    #[test]
    fn test_out_of_range_index() {
        let s = seq(&[1, 2]);
        assert!(!preceding_pair_seen(1, &s));
        assert!(!preceding_pair_seen(7, &s));
    }
}
