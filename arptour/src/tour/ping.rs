//! Link-level ping workers
//!
//! Each (IP, MAC) pair handed over by the forwarder gets one worker that
//! injects four ICMP echo requests as complete Ethernet frames and logs
//! the round-trip time of each reply.
//!
//! All workers share one raw ICMP socket for replies. A single reader
//! thread drains it iteratively, filters by the echo identifier, and
//! dispatches each reply to the owning worker's channel keyed by the
//! reply's source address; every worker owns exactly one target.

use std::{
    collections::HashMap,
    net::Ipv4Addr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Mutex,
    },
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use log::{info, warn};

use crate::{
    net::{
        ethernet::{self, ETHERTYPE_IPV4},
        icmp::{IcmpEcho, ICMP_ECHO_DATA_SIZE, ICMP_ECHO_HEADER_SIZE, ICMP_ECHO_REPLY},
        interface,
        ip::{Ipv4Header, IPPROTO_ICMP},
        MacAddress,
    },
    sock::{packet::PacketSocket, raw::RawIpSocket},
    Result,
};

/// Echo requests sent per worker
pub const PING_COUNT: u16 = 4;

/// Interval between sends; also the reply wait bound
pub const PING_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on concurrently pinging workers
pub const MAX_WORKERS: usize = 8;

/// Injected frame length: Ethernet + IPv4 + ICMP echo header + timestamp
pub const PING_FRAME_SIZE: usize =
    ethernet::ETHERNET_HEADER_SIZE + Ipv4Header::MIN_SIZE + ICMP_ECHO_HEADER_SIZE + ICMP_ECHO_DATA_SIZE;

/// One parsed echo reply, delivered to the owning worker
#[derive(Debug, Clone, Copy)]
pub struct EchoReply {
    pub seq: u16,
    pub ttl: u8,
    /// ICMP message length (what the log line reports)
    pub bytes: usize,
    pub rtt_ms: f64,
}

type Registry = Arc<Mutex<HashMap<Ipv4Addr, mpsc::Sender<EchoReply>>>>;

/// Lock the reply registry, recovering a poisoned lock.
fn lock_registry(
    registry: &Mutex<HashMap<Ipv4Addr, mpsc::Sender<EchoReply>>>,
) -> std::sync::MutexGuard<'_, HashMap<Ipv4Addr, mpsc::Sender<EchoReply>>> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

/// Spawns workers and owns the shared reply reader
pub struct PingManager {
    iface_name: String,
    local_ip: Ipv4Addr,
    icmp_id: u16,
    registry: Registry,
    active: Arc<AtomicUsize>,
}

impl PingManager {
    /// Take ownership of the shared ICMP reply socket and start the
    /// reader thread.
    pub fn new(reply_socket: RawIpSocket, iface_name: String, local_ip: Ipv4Addr) -> Self {
        let icmp_id = (std::process::id() & 0xFFFF) as u16;
        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));

        let reader_registry = Arc::clone(&registry);
        thread::spawn(move || reply_reader(reply_socket, icmp_id, reader_registry));

        Self {
            iface_name,
            local_ip,
            icmp_id,
            registry,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start one worker for a newly observed predecessor pair.
    ///
    /// When the pool is exhausted the pair is logged and skipped; the
    /// tour itself is never held up by pinging.
    pub fn spawn(&self, target_ip: Ipv4Addr, target_mac: MacAddress) {
        if self.active.load(Ordering::Acquire) >= MAX_WORKERS {
            warn!(target: "ping", "worker pool exhausted, skipping ping of {target_ip}");
            return;
        }

        let (tx, rx) = mpsc::channel();
        lock_registry(&self.registry).insert(target_ip, tx);
        self.active.fetch_add(1, Ordering::AcqRel);

        let iface_name = self.iface_name.clone();
        let local_ip = self.local_ip;
        let icmp_id = self.icmp_id;
        let registry = Arc::clone(&self.registry);
        let active = Arc::clone(&self.active);

        thread::spawn(move || {
            if let Err(e) = ping_worker(&iface_name, local_ip, icmp_id, target_ip, target_mac, &rx)
            {
                warn!(target: "ping", "ping of {target_ip} failed: {e}");
            }
            lock_registry(&registry).remove(&target_ip);
            active.fetch_sub(1, Ordering::AcqRel);
        });
    }
}

/// Current wall-clock time as the 16-byte echo payload.
fn timestamp_data() -> [u8; ICMP_ECHO_DATA_SIZE] {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    let mut data = [0u8; ICMP_ECHO_DATA_SIZE];
    data[0..8].copy_from_slice(&now.as_secs().to_be_bytes());
    data[8..16].copy_from_slice(&u64::from(now.subsec_micros()).to_be_bytes());
    data
}

/// Round-trip time in milliseconds given the reflected payload.
fn rtt_from_data(data: &[u8]) -> Option<f64> {
    if data.len() < ICMP_ECHO_DATA_SIZE {
        return None;
    }
    let mut secs = [0u8; 8];
    let mut micros = [0u8; 8];
    secs.copy_from_slice(&data[0..8]);
    micros.copy_from_slice(&data[8..16]);
    let sent =
        Duration::from_secs(u64::from_be_bytes(secs)) + Duration::from_micros(u64::from_be_bytes(micros));
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    Some(now.checked_sub(sent)?.as_secs_f64() * 1000.0)
}

/// Build one complete echo-request frame for injection.
fn build_echo_frame(
    local_mac: MacAddress,
    target_mac: MacAddress,
    local_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
    icmp_id: u16,
    seq: u16,
) -> Vec<u8> {
    let echo = IcmpEcho::request(icmp_id, seq, timestamp_data().to_vec());
    let echo_bytes = echo.to_bytes();
    let ip = Ipv4Header::ping(
        local_ip,
        target_ip,
        (Ipv4Header::MIN_SIZE + echo_bytes.len()) as u16,
    );

    let mut payload = Vec::with_capacity(Ipv4Header::MIN_SIZE + echo_bytes.len());
    payload.extend_from_slice(&ip.to_bytes());
    payload.extend_from_slice(&echo_bytes);

    ethernet::construct_frame(target_mac, local_mac, ETHERTYPE_IPV4, &payload)
}

/// Worker body: four sends one second apart, each followed by a bounded
/// wait for the matching reply.
fn ping_worker(
    iface_name: &str,
    local_ip: Ipv4Addr,
    icmp_id: u16,
    target_ip: Ipv4Addr,
    target_mac: MacAddress,
    rx: &mpsc::Receiver<EchoReply>,
) -> Result<()> {
    // The local link address is re-resolved on a probe socket rather
    // than borrowed from the forwarder
    let iface = interface::probe(iface_name)?;
    let injector = PacketSocket::open(ETHERTYPE_IPV4)?;

    info!(
        target: "ping",
        "PING {target_ip} ({target_mac}): {PING_FRAME_SIZE} data bytes"
    );

    for seq in 0..PING_COUNT {
        let frame = build_echo_frame(iface.mac, target_mac, local_ip, target_ip, icmp_id, seq);
        injector.send(iface.index, ETHERTYPE_IPV4, &frame)?;

        let deadline = std::time::Instant::now() + PING_INTERVAL;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match rx.recv_timeout(remaining) {
                Ok(reply) if reply.seq < PING_COUNT => {
                    info!(
                        target: "ping",
                        "{} bytes from {target_ip}: seq={}, ttl={}, rtt={:.3} ms",
                        reply.bytes, reply.seq, reply.ttl, reply.rtt_ms
                    );
                    break;
                }
                // Out-of-range sequence: keep reading until the deadline
                Ok(_) => continue,
                Err(_) => break,
            }
        }

        let rest = deadline.saturating_duration_since(std::time::Instant::now());
        if !rest.is_zero() {
            thread::sleep(rest);
        }
    }

    Ok(())
}

/// Reply reader: drains the shared ICMP socket forever, routing echo
/// replies that carry our identifier to the worker owning the source
/// address. Everything else is discarded and the read retried.
fn reply_reader(socket: RawIpSocket, icmp_id: u16, registry: Registry) {
    let mut buf = [0u8; 1024];
    loop {
        let (n, _) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "ping", "reply read failed: {e}");
                thread::sleep(Duration::from_millis(50));
                continue;
            }
        };

        let Ok(ip) = Ipv4Header::from_bytes(&buf[..n]) else {
            continue;
        };
        if ip.protocol != IPPROTO_ICMP || n < ip.header_len() {
            continue;
        }
        let Ok(echo) = IcmpEcho::from_bytes(&buf[ip.header_len()..n]) else {
            continue;
        };
        if echo.icmp_type != ICMP_ECHO_REPLY || echo.id != icmp_id {
            continue;
        }
        let Some(rtt_ms) = rtt_from_data(&echo.data) else {
            continue;
        };

        let reply = EchoReply {
            seq: echo.seq,
            ttl: ip.ttl,
            bytes: n - ip.header_len(),
            rtt_ms,
        };

        let mut owners = lock_registry(&registry);
        if let Some(tx) = owners.get(&ip.source) {
            // A send failure means the worker already finished
            if tx.send(reply).is_err() {
                owners.remove(&ip.source);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_frame_layout() {
        let frame = build_echo_frame(
            MacAddress([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]),
            MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            0x1234,
            2,
        );
        assert_eq!(frame.len(), PING_FRAME_SIZE);

        let eth = ethernet::parse_frame(&frame).unwrap();
        assert_eq!(eth.ethertype, ETHERTYPE_IPV4);
        assert_eq!(eth.dst_mac, MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));

        let ip = Ipv4Header::from_bytes(eth.payload).unwrap();
        assert_eq!(ip.protocol, IPPROTO_ICMP);
        assert_eq!(ip.ttl, 255);

        let echo = IcmpEcho::from_bytes(&eth.payload[ip.header_len()..]).unwrap();
        assert_eq!(echo.id, 0x1234);
        assert_eq!(echo.seq, 2);
        assert_eq!(echo.data.len(), ICMP_ECHO_DATA_SIZE);
    }

    #[test]
    fn test_rtt_roundtrip() {
        let data = timestamp_data();
        let rtt = rtt_from_data(&data).unwrap();
        assert!(rtt >= 0.0);
        assert!(rtt < 1000.0);
    }

    #[test]
    fn test_rtt_rejects_short_data() {
        assert!(rtt_from_data(&[0u8; 4]).is_none());
    }
}
