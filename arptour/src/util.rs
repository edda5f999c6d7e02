//! Name service helpers
//!
//! Hostname and address lookups go through the platform resolver; on the
//! deployment segment a hosts mapping `vmN <-> IP` is expected but not
//! required. Lookups are used for the CLI sequence and for log labels.

use std::{
    ffi::CStr,
    io, mem,
    net::{Ipv4Addr, SocketAddr, ToSocketAddrs},
};

use crate::{error::NetError, Result};

/// Hostname of the local node.
pub fn local_hostname() -> Result<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is writable for buf.len() bytes; gethostname
    // NUL-terminates on success.
    let r = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if r < 0 {
        return Err(io::Error::last_os_error().into());
    }
    // SAFETY: the kernel wrote a NUL-terminated string into buf.
    let name = unsafe { CStr::from_ptr(buf.as_ptr().cast()) };
    Ok(name.to_string_lossy().into_owned())
}

/// Forward lookup: hostname to primary IPv4 address.
pub fn hostname_to_ip(name: &str) -> Result<Ipv4Addr> {
    let addrs = (name, 0u16)
        .to_socket_addrs()
        .map_err(|_| NetError::ResolveFailure {
            name: name.to_string(),
        })?;
    for addr in addrs {
        if let SocketAddr::V4(v4) = addr {
            return Ok(*v4.ip());
        }
    }
    Err(NetError::ResolveFailure {
        name: name.to_string(),
    })
}

/// Reverse lookup: IPv4 address to hostname.
pub fn ip_to_hostname(ip: Ipv4Addr) -> Result<String> {
    // SAFETY: sockaddr_in is a plain C struct; all-zero is valid.
    let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
    sin.sin_family = libc::AF_INET as libc::sa_family_t;
    sin.sin_addr.s_addr = u32::from_be_bytes(ip.octets()).to_be();

    let mut host = [0u8; libc::NI_MAXHOST as usize];
    // SAFETY: sin is a valid sockaddr_in and host a writable buffer of
    // the advertised length; no service name is requested.
    let r = unsafe {
        libc::getnameinfo(
            (&sin as *const libc::sockaddr_in).cast(),
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            host.as_mut_ptr().cast(),
            host.len() as libc::socklen_t,
            std::ptr::null_mut(),
            0,
            libc::NI_NAMEREQD,
        )
    };
    if r != 0 {
        return Err(NetError::ResolveFailure {
            name: ip.to_string(),
        });
    }
    // SAFETY: getnameinfo NUL-terminated host on success.
    let name = unsafe { CStr::from_ptr(host.as_ptr().cast()) };
    Ok(name.to_string_lossy().into_owned())
}

/// Log label for an address: the hostname when resolvable, otherwise the
/// dotted quad.
pub fn host_label(ip: Ipv4Addr) -> String {
    ip_to_hostname(ip).unwrap_or_else(|_| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_hostname_nonempty() {
        assert!(!local_hostname().unwrap().is_empty());
    }

    #[test]
    fn test_localhost_resolves() {
        assert_eq!(
            hostname_to_ip("localhost").unwrap(),
            Ipv4Addr::new(127, 0, 0, 1)
        );
    }

    #[test]
    fn test_unknown_host_fails() {
        assert!(hostname_to_ip("no-such-host.invalid").is_err());
    }

    #[test]
    fn test_host_label_falls_back_to_quad() {
        // 240.0.0.0/4 is reserved; no PTR record exists
        let label = host_label(Ipv4Addr::new(240, 1, 2, 3));
        assert!(!label.is_empty());
    }
}
