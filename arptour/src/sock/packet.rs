//! `AF_PACKET` raw socket wrapper
//!
//! Sends and receives complete Ethernet frames, bypassing the kernel's
//! protocol stack. The ARP engine binds one to the custom EtherType; ping
//! workers use one bound to `ETH_P_IP` to inject echo frames.

use std::{io, mem, os::fd::RawFd};

use crate::{net::MacAddress, Result};

/// Link-layer metadata of a received frame, taken from `sockaddr_ll`
#[derive(Debug, Clone, Copy)]
pub struct FrameMeta {
    /// Interface the frame arrived on
    pub ifindex: i32,
    /// Hardware type reported by the kernel (1 for Ethernet)
    pub hatype: u16,
}

/// A raw packet socket bound to one EtherType
#[derive(Debug)]
pub struct PacketSocket {
    fd: RawFd,
}

impl PacketSocket {
    /// Open a packet socket receiving frames of the given EtherType.
    pub fn open(ethertype: u16) -> Result<Self> {
        // SAFETY: plain socket(2) call; the fd is owned by PacketSocket.
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                i32::from(ethertype.to_be()),
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(Self { fd })
    }

    /// Send a complete frame out of the given interface.
    ///
    /// The destination hardware address is read back out of the frame's
    /// first six bytes to fill the link-layer sockaddr.
    pub fn send(&self, ifindex: i32, ethertype: u16, frame: &[u8]) -> Result<usize> {
        // SAFETY: sockaddr_ll is a plain C struct; all-zero is valid.
        let mut sll: libc::sockaddr_ll = unsafe { mem::zeroed() };
        sll.sll_family = libc::AF_PACKET as u16;
        sll.sll_protocol = ethertype.to_be();
        sll.sll_ifindex = ifindex;
        sll.sll_halen = 6;
        if let Some(dst) = MacAddress::from_slice(frame) {
            sll.sll_addr[..6].copy_from_slice(&dst.0);
        }

        // SAFETY: frame points at len readable bytes and sll at a valid
        // sockaddr_ll for the duration of the call.
        let n = unsafe {
            libc::sendto(
                self.fd,
                frame.as_ptr().cast(),
                frame.len(),
                0,
                (&sll as *const libc::sockaddr_ll).cast(),
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(n as usize)
    }

    /// Receive one frame along with its link-layer metadata.
    pub fn recv(&self, buf: &mut [u8]) -> Result<(usize, FrameMeta)> {
        // SAFETY: sockaddr_ll is a plain C struct; all-zero is valid.
        let mut from: libc::sockaddr_ll = unsafe { mem::zeroed() };
        let mut fromlen = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;

        // SAFETY: buf is writable for buf.len() bytes; from/fromlen
        // describe a valid sockaddr_ll out-parameter.
        let n = unsafe {
            libc::recvfrom(
                self.fd,
                buf.as_mut_ptr().cast(),
                buf.len(),
                0,
                (&mut from as *mut libc::sockaddr_ll).cast(),
                &mut fromlen,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error().into());
        }

        Ok((
            n as usize,
            FrameMeta {
                ifindex: from.sll_ifindex,
                hatype: from.sll_hatype,
            },
        ))
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for PacketSocket {
    fn drop(&mut self) {
        // SAFETY: fd was returned by socket(2) and is closed exactly once.
        unsafe { libc::close(self.fd) };
    }
}
