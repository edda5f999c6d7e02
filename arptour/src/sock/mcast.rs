//! Multicast UDP rendezvous pair
//!
//! One sending and one receiving UDP socket bound to the fixed multicast
//! group and port. Membership is joined lazily: the source joins before
//! its first send, every other node on first arrival of the tour packet.

use std::{
    net::{Ipv4Addr, SocketAddrV4, UdpSocket},
    os::fd::{AsRawFd, RawFd},
};

use socket2::{Domain, Protocol, Socket, Type};

use crate::Result;

/// Send/receive pair for the termination handshake
#[derive(Debug)]
pub struct McastPair {
    group: Ipv4Addr,
    port: u16,
    send: UdpSocket,
    recv: UdpSocket,
    joined: bool,
}

impl McastPair {
    /// Create both sockets bound for `group:port`.
    ///
    /// The send socket carries `SO_REUSEADDR` and a multicast TTL of 1 so
    /// handshake datagrams never leave the segment. The receive socket is
    /// bound to the group address itself.
    pub fn open(group: Ipv4Addr, port: u16) -> Result<Self> {
        let send = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        send.set_reuse_address(true)?;
        let send: UdpSocket = send.into();
        send.set_multicast_ttl_v4(1)?;

        let recv = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        recv.set_reuse_address(true)?;
        recv.bind(&SocketAddrV4::new(group, port).into())?;
        let recv: UdpSocket = recv.into();

        Ok(Self {
            group,
            port,
            send,
            recv,
            joined: false,
        })
    }

    /// Join the group on all interfaces. Idempotent.
    pub fn join(&mut self) -> Result<()> {
        if !self.joined {
            self.recv
                .join_multicast_v4(&self.group, &Ipv4Addr::UNSPECIFIED)?;
            self.joined = true;
            log::info!(target: "tour", "join multicast address {}:{}", self.group, self.port);
        }
        Ok(())
    }

    /// Leave the group.
    pub fn leave(&mut self) -> Result<()> {
        if self.joined {
            self.recv
                .leave_multicast_v4(&self.group, &Ipv4Addr::UNSPECIFIED)?;
            self.joined = false;
            log::info!(target: "tour", "leave multicast address {}:{}", self.group, self.port);
        }
        Ok(())
    }

    pub fn joined(&self) -> bool {
        self.joined
    }

    /// Send a text datagram to the group.
    pub fn send(&self, msg: &str) -> Result<usize> {
        Ok(self
            .send
            .send_to(msg.as_bytes(), SocketAddrV4::new(self.group, self.port))?)
    }

    /// Receive one datagram as text (invalid UTF-8 is replaced).
    pub fn recv(&self) -> Result<String> {
        let mut buf = [0u8; 256];
        let (n, _) = self.recv.recv_from(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
    }

    /// Raw fd of the receiving socket, for the readiness loop.
    pub fn recv_fd(&self) -> RawFd {
        self.recv.as_raw_fd()
    }
}
