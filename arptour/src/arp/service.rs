//! ARP service engine
//!
//! Single-threaded event loop over three descriptor groups: the packet
//! socket carrying custom ARP frames, the Unix stream listener taking
//! AREQs, and the stream connection of every incomplete cache entry
//! (watched only to detect client disconnects).
//!
//! Cache mutation and the answering of a pending client happen in the
//! same loop iteration, so a client can never observe a partially
//! resolved entry.

use std::{
    fs,
    io::{Read, Write},
    net::Ipv4Addr,
    os::fd::AsRawFd,
    os::unix::net::{UnixListener, UnixStream},
};

use log::{debug, info, warn};

use crate::{
    arp::{cache::ArpCache, HwAddr, ARP_SERVICE_PATH},
    net::{
        arp::{ArpFrame, ARP_ID_CODE, ARP_OP_REPLY, ARP_OP_REQUEST},
        ethernet::ETHERTYPE_CUSTOM_ARP,
        interface::{self, Interface, ARPHRD_ETHER},
    },
    sock::{packet::{FrameMeta, PacketSocket}, poll},
    Result,
};

/// The ARP service: sockets, interface table, and the cache
pub struct ArpService {
    /// Local interface table; entry 0 is the primary interface
    interfaces: Vec<Interface>,
    /// Packet socket bound to the custom EtherType
    pf: PacketSocket,
    /// AREQ listener at the well-known path
    listener: UnixListener,
    cache: ArpCache,
}

impl ArpService {
    /// Enumerate interfaces and create both sockets. Failure here is
    /// fatal to the daemon.
    pub fn new() -> Result<Self> {
        let interfaces = vec![interface::discover()?];
        for iface in &interfaces {
            info!(
                target: "arp",
                "address pair found: <{}, {}> @ interface {}",
                iface.ipv4, iface.mac, iface.index
            );
        }

        let pf = PacketSocket::open(ETHERTYPE_CUSTOM_ARP)?;

        // Stale socket files from a previous run would fail the bind.
        let _ = fs::remove_file(ARP_SERVICE_PATH);
        let listener = UnixListener::bind(ARP_SERVICE_PATH)?;

        Ok(Self {
            interfaces,
            pf,
            listener,
            cache: ArpCache::new(),
        })
    }

    /// Run the event loop. Only returns on a polling failure.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let mut fds = vec![self.pf.as_raw_fd(), self.listener.as_raw_fd()];
            let mut waiter_fds = Vec::new();
            for ip in self.cache.pending_ips() {
                if let Some(entry) = self.cache.get(ip) {
                    for waiter in &entry.waiters {
                        waiter_fds.push((ip, waiter.as_raw_fd()));
                    }
                }
            }
            fds.extend(waiter_fds.iter().map(|&(_, fd)| fd));

            let ready = poll::wait_readable(&fds, None)?;

            if ready[0] {
                if let Err(e) = self.handle_frame() {
                    warn!(target: "arp", "frame error: {e}");
                }
            }
            if ready[1] {
                if let Err(e) = self.handle_client() {
                    warn!(target: "arp", "client error: {e}");
                }
            }

            // A pending client connection turning readable without the
            // engine having written means the client went away; its
            // resolution is cancelled.
            for (&(ip, fd), &is_ready) in waiter_fds.iter().zip(&ready[2..]) {
                if is_ready {
                    self.drop_waiter(ip, fd);
                }
            }
        }
    }

    fn primary(&self) -> &Interface {
        &self.interfaces[0]
    }

    /// The local interface owning `ip`, if any.
    fn local_interface(&self, ip: Ipv4Addr) -> Option<&Interface> {
        self.interfaces.iter().find(|iface| iface.ipv4 == ip)
    }

    /// Read and dispatch one frame off the packet socket.
    fn handle_frame(&mut self) -> Result<()> {
        let mut buf = [0u8; 256];
        let (n, meta) = self.pf.recv(&mut buf)?;

        let frame = match ArpFrame::from_bytes(&buf[..n]) {
            Ok(frame) => frame,
            // Malformed frames are dropped silently
            Err(_) => return Ok(()),
        };

        // Frames of foreign ARP implementations are not ours to answer
        if frame.header.ar_id != ARP_ID_CODE {
            return Ok(());
        }

        match frame.header.ar_op {
            ARP_OP_REQUEST => self.process_request(&frame, meta),
            ARP_OP_REPLY => self.process_reply(&frame, meta),
            op => {
                warn!(target: "arp", "undefined ARP operation {op}");
                Ok(())
            }
        }
    }

    /// REQ: learn the sender when the frame is relevant to this node,
    /// answer with a unicast REP when the target is local.
    fn process_request(&mut self, frame: &ArpFrame, meta: FrameMeta) -> Result<()> {
        let sender_ip = frame.payload.sender_ip;
        let target_local = self.local_interface(frame.payload.target_ip).cloned();

        // Learn only from frames relevant to this node: target local or
        // sender already tracked
        if target_local.is_none() && !self.cache.contains(sender_ip) {
            return Ok(());
        }

        info!(target: "arp", "received ARP REQ from interface {}", meta.ifindex);
        log_frame(frame);
        let entry = self.cache.insert_or_update(
            sender_ip,
            frame.payload.sender_mac,
            meta.ifindex,
            meta.hatype,
        );
        let (entry_ifindex, entry_mac) = (entry.ifindex, entry.mac);

        if let Some(local) = target_local {
            // REP goes out on the interface the entry was last seen on
            let rep = ArpFrame::reply(local.mac, local.ipv4, entry_mac, sender_ip);
            info!(target: "arp", "sending ARP REP via interface {entry_ifindex} <unicast>");
            log_frame(&rep);
            self.pf
                .send(entry_ifindex, ETHERTYPE_CUSTOM_ARP, &rep.to_bytes())?;
        }

        Ok(())
    }

    /// REP: accepted only when the sender is already cached and the
    /// target is local. Updates the entry and drains its waiters.
    fn process_reply(&mut self, frame: &ArpFrame, meta: FrameMeta) -> Result<()> {
        let sender_ip = frame.payload.sender_ip;
        if !self.cache.contains(sender_ip)
            || self.local_interface(frame.payload.target_ip).is_none()
        {
            return Ok(());
        }

        info!(target: "arp", "received ARP REP from interface {}", meta.ifindex);
        log_frame(frame);

        let entry = self.cache.insert_or_update(
            sender_ip,
            frame.payload.sender_mac,
            meta.ifindex,
            meta.hatype,
        );

        let record = HwAddr::ethernet(entry.ifindex, entry.hatype, entry.mac);
        for waiter in entry.waiters.drain(..) {
            reply_waiter(sender_ip, waiter, &record);
        }

        Ok(())
    }

    /// Accept one AREQ connection and either answer from the cache or
    /// start an on-wire resolution.
    fn handle_client(&mut self) -> Result<()> {
        let (mut stream, peer) = self.listener.accept()?;

        let mut ip_bytes = [0u8; 4];
        if let Err(e) = stream.read_exact(&mut ip_bytes) {
            warn!(target: "arp", "short AREQ read: {e}");
            return Ok(());
        }
        let ip = Ipv4Addr::from(ip_bytes);
        info!(
            target: "arp",
            "incoming AREQ <{ip}> from {:?}",
            peer.as_pathname().unwrap_or_else(|| std::path::Path::new("<unnamed>"))
        );

        let hit = self.cache.get(ip).and_then(|entry| {
            entry
                .is_complete()
                .then(|| HwAddr::ethernet(entry.ifindex, entry.hatype, entry.mac))
        });
        let pending = self.cache.contains(ip);

        if let Some(record) = hit {
            info!(target: "arp", "AREQ <{ip}> found in cache, reply immediately");
            reply_waiter(ip, stream, &record);
        } else if pending {
            // A resolution is already in flight; exactly one REQUEST per
            // incomplete entry goes on the wire
            info!(target: "arp", "AREQ <{ip}> already pending, attaching client");
            let primary_index = self.primary().index;
            self.cache
                .insert_incomplete(ip, primary_index, ARPHRD_ETHER, stream);
        } else {
            info!(target: "arp", "AREQ <{ip}> not found in cache, creating incomplete entry");
            let primary_index = self.primary().index;
            self.cache
                .insert_incomplete(ip, primary_index, ARPHRD_ETHER, stream);
            self.send_request(ip)?;
        }

        Ok(())
    }

    /// Broadcast a REQUEST for `target` on the primary interface.
    fn send_request(&self, target: Ipv4Addr) -> Result<()> {
        let primary = self.primary();
        let req = ArpFrame::request(primary.mac, primary.ipv4, target);
        info!(target: "arp", "sending ARP REQ via interface {} <broadcast>", primary.index);
        log_frame(&req);
        self.pf
            .send(primary.index, ETHERTYPE_CUSTOM_ARP, &req.to_bytes())?;
        Ok(())
    }

    /// Remove one disconnected waiter; the entry goes with it when it was
    /// only there to correlate the reply.
    fn drop_waiter(&mut self, ip: Ipv4Addr, fd: i32) {
        if let Some(entry) = self.cache.get_mut(ip) {
            entry.waiters.retain(|w| w.as_raw_fd() != fd);
            if entry.waiters.is_empty() && entry.mac.is_zero() {
                self.cache.remove(ip);
                info!(
                    target: "arp",
                    "client connection terminated, incomplete entry <{ip}> removed"
                );
            }
        }
    }
}

/// Write the record to a waiting client and close the connection.
fn reply_waiter(ip: Ipv4Addr, mut waiter: UnixStream, record: &HwAddr) {
    info!(target: "arp", "reply to AREQ <{ip}, {}>", record.mac());
    if let Err(e) = waiter.write_all(&record.to_bytes()) {
        warn!(target: "arp", "AREQ reply write failed: {e}");
    }
    // Dropping the stream closes the connection, completing the contract
}

/// Debug dump of a full ARP frame, mirroring its on-wire structure.
fn log_frame(frame: &ArpFrame) {
    debug!(
        target: "arp",
        "  ETHHDR | dest: {}, source: {}, proto: {}",
        frame.eth_dst, frame.eth_src, ETHERTYPE_CUSTOM_ARP
    );
    debug!(
        target: "arp",
        "  ARPHDR | id: {}, hrd: {:#06x}, pro: {:#06x}, hln: {}, pln: {}, op: {} {}",
        frame.header.ar_id,
        frame.header.ar_hrd,
        frame.header.ar_pro,
        frame.header.ar_hln,
        frame.header.ar_pln,
        frame.header.ar_op,
        if frame.header.ar_op == ARP_OP_REQUEST { "REQ" } else { "REP" }
    );
    debug!(
        target: "arp",
        "    DATA | sender: {} {}",
        frame.payload.sender_mac, frame.payload.sender_ip
    );
    debug!(
        target: "arp",
        "    DATA | target: {} {}",
        frame.payload.target_mac, frame.payload.target_ip
    );
}
