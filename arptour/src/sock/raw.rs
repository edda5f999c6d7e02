//! Raw IPv4 socket wrapper
//!
//! The tour forwarder owns two of these: one for the tour protocol
//! (with `IP_HDRINCL`, since the forwarder writes its own IPv4 header)
//! and one for ICMP, used as the shared echo-reply reader.

use std::{io, mem, net::Ipv4Addr, os::fd::RawFd};

use crate::Result;

/// A raw `AF_INET` socket for one IP protocol number
#[derive(Debug)]
pub struct RawIpSocket {
    fd: RawFd,
}

impl RawIpSocket {
    /// Open a raw socket for `protocol`. With `hdrincl` set the caller
    /// supplies the complete IPv4 header on every send.
    pub fn open(protocol: u8, hdrincl: bool) -> Result<Self> {
        // SAFETY: plain socket(2) call; the fd is owned by RawIpSocket.
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_RAW, i32::from(protocol)) };
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let sock = Self { fd };

        if hdrincl {
            let on: libc::c_int = 1;
            // SAFETY: on points at a c_int for the duration of the call.
            let r = unsafe {
                libc::setsockopt(
                    fd,
                    libc::IPPROTO_IP,
                    libc::IP_HDRINCL,
                    (&on as *const libc::c_int).cast(),
                    mem::size_of::<libc::c_int>() as libc::socklen_t,
                )
            };
            if r < 0 {
                return Err(io::Error::last_os_error().into());
            }
        }

        Ok(sock)
    }

    /// Send a packet to `dst`. With `IP_HDRINCL`, `packet` starts with
    /// the IPv4 header.
    pub fn send_to(&self, dst: Ipv4Addr, packet: &[u8]) -> Result<usize> {
        // SAFETY: sockaddr_in is a plain C struct; all-zero is valid.
        let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
        sin.sin_family = libc::AF_INET as libc::sa_family_t;
        sin.sin_addr.s_addr = u32::from_be_bytes(dst.octets()).to_be();

        // SAFETY: packet points at len readable bytes and sin at a valid
        // sockaddr_in for the duration of the call.
        let n = unsafe {
            libc::sendto(
                self.fd,
                packet.as_ptr().cast(),
                packet.len(),
                0,
                (&sin as *const libc::sockaddr_in).cast(),
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(n as usize)
    }

    /// Receive one datagram (IPv4 header included) and its source.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, Ipv4Addr)> {
        // SAFETY: sockaddr_in is a plain C struct; all-zero is valid.
        let mut from: libc::sockaddr_in = unsafe { mem::zeroed() };
        let mut fromlen = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

        // SAFETY: buf is writable for buf.len() bytes; from/fromlen
        // describe a valid sockaddr_in out-parameter.
        let n = unsafe {
            libc::recvfrom(
                self.fd,
                buf.as_mut_ptr().cast(),
                buf.len(),
                0,
                (&mut from as *mut libc::sockaddr_in).cast(),
                &mut fromlen,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error().into());
        }

        let src = Ipv4Addr::from(u32::from_be(from.sin_addr.s_addr).to_be_bytes());
        Ok((n as usize, src))
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for RawIpSocket {
    fn drop(&mut self) {
        // SAFETY: fd was returned by socket(2) and is closed exactly once.
        unsafe { libc::close(self.fd) };
    }
}
