//! AREQ client stub
//!
//! `areq(ip)` is the synchronous local call used by the tour forwarder to
//! resolve an IPv4 address to its hardware address record. It opens a
//! fresh stream connection to the ARP service from a unique anonymous
//! path, writes the 4-byte address, and waits at most three seconds for
//! exactly one record.

use std::{
    io::{Read, Write},
    net::Ipv4Addr,
    os::fd::AsRawFd,
    os::unix::net::UnixStream,
    process,
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, Instant},
};

use log::info;
use socket2::{Domain, SockAddr, Socket, Type};

use crate::{
    arp::{HwAddr, ARP_SERVICE_PATH, CLIENT_PATH_PREFIX, HWADDR_RECORD_SIZE},
    error::NetError,
    sock::poll,
    Result,
};

/// Upper bound on the whole request/response exchange
pub const AREQ_TIMEOUT: Duration = Duration::from_secs(3);

/// Unique throwaway path for the client side of the stream.
fn client_path() -> String {
    static SEQ: AtomicU32 = AtomicU32::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}{}-{:06}", CLIENT_PATH_PREFIX, process::id(), seq)
}

/// Resolve `ip` through the local ARP service.
///
/// Connection refused (service down), an elapsed deadline, and a short
/// read all surface as errors; the caller logs and carries on.
pub fn areq(ip: Ipv4Addr) -> Result<HwAddr> {
    let path = client_path();
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    socket.bind(&SockAddr::unix(&path)?)?;
    // Unlink right away; the bound socket keeps working without the file
    let _ = std::fs::remove_file(&path);

    socket.connect(&SockAddr::unix(ARP_SERVICE_PATH)?)?;
    let owned_fd: std::os::fd::OwnedFd = socket.into();
    let mut stream: UnixStream = owned_fd.into();

    info!(target: "areq", "AREQ <{ip}> to local ARP service");
    stream.write_all(&ip.octets())?;

    let deadline = Instant::now() + AREQ_TIMEOUT;
    let remaining = deadline.saturating_duration_since(Instant::now());
    if !poll::wait_readable_one(stream.as_raw_fd(), remaining)? {
        info!(target: "areq", "AREQ <{ip}> timeout");
        return Err(NetError::Timeout {
            operation: "areq",
            duration_ms: AREQ_TIMEOUT.as_millis() as u64,
        });
    }

    // Guard the read itself too: readability does not promise the whole
    // record is buffered yet
    stream.set_read_timeout(Some(
        deadline
            .saturating_duration_since(Instant::now())
            .max(Duration::from_millis(1)),
    ))?;

    let mut record = [0u8; HWADDR_RECORD_SIZE];
    stream
        .read_exact(&mut record)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => NetError::Disconnected { operation: "areq" },
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => NetError::Timeout {
                operation: "areq",
                duration_ms: AREQ_TIMEOUT.as_millis() as u64,
            },
            _ => NetError::Io(e),
        })?;

    let hw = HwAddr::from_bytes(&record)?;
    info!(
        target: "areq",
        "AREQ <{ip}> received: <{}, {}, {}, {}>",
        hw.ifindex, hw.hatype, hw.halen, hw.mac()
    );
    Ok(hw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_paths_are_unique() {
        assert_ne!(client_path(), client_path());
    }

    #[test]
    fn test_refused_when_service_absent() {
        // No ARP service is bound in the test environment
        assert!(areq(Ipv4Addr::new(10, 0, 0, 99)).is_err());
    }
}
