//! Local interface discovery
//!
//! Queries the primary Ethernet interface once at startup via the
//! `SIOCGIFCONF` / `SIOCGIFHWADDR` / `SIOCGIFINDEX` ioctls on a probe
//! socket. The resulting descriptor is immutable for the lifetime of the
//! process.

use std::{ffi::CStr, io, mem, net::Ipv4Addr};

use crate::{error::NetError, net::MacAddress, Result};

/// Preferred interface name, matching the deployment segment
pub const PRIMARY_IFNAME: &str = "eth0";

/// ARP hardware type for Ethernet
pub const ARPHRD_ETHER: u16 = 1;

/// Descriptor of the local primary interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Interface name ("eth0")
    pub name: String,
    /// Kernel interface index
    pub index: i32,
    /// Hardware address
    pub mac: MacAddress,
    /// Primary IPv4 address
    pub ipv4: Ipv4Addr,
}

struct ProbeSocket(i32);

impl ProbeSocket {
    fn open() -> Result<Self> {
        // SAFETY: plain socket(2) call; the fd is owned by ProbeSocket.
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(Self(fd))
    }
}

impl Drop for ProbeSocket {
    fn drop(&mut self) {
        // SAFETY: fd was returned by socket(2) and is closed exactly once.
        unsafe { libc::close(self.0) };
    }
}

fn ifreq_for(name: &str) -> libc::ifreq {
    // SAFETY: ifreq is a plain C struct; an all-zero value is valid.
    let mut ifr: libc::ifreq = unsafe { mem::zeroed() };
    for (dst, src) in ifr.ifr_name.iter_mut().zip(name.as_bytes()) {
        *dst = *src as libc::c_char;
    }
    ifr
}

/// Fill in MAC and index for `name` using ioctls on the probe socket.
fn query_link(fd: i32, name: &str) -> Result<(MacAddress, i32)> {
    let mut ifr = ifreq_for(name);

    // SAFETY: ifr points at a properly initialized ifreq for this request.
    if unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR as _, &mut ifr) } < 0 {
        return Err(io::Error::last_os_error().into());
    }
    // SAFETY: SIOCGIFHWADDR filled the ifr_hwaddr union member.
    let hw = unsafe { ifr.ifr_ifru.ifru_hwaddr };
    let mut mac = [0u8; 6];
    for (dst, src) in mac.iter_mut().zip(hw.sa_data.iter()) {
        *dst = *src as u8;
    }

    // SAFETY: as above, for the interface index request.
    if unsafe { libc::ioctl(fd, libc::SIOCGIFINDEX as _, &mut ifr) } < 0 {
        return Err(io::Error::last_os_error().into());
    }
    // SAFETY: SIOCGIFINDEX filled the ifr_ifindex union member.
    let index = unsafe { ifr.ifr_ifru.ifru_ifindex };

    Ok((MacAddress(mac), index))
}

/// Look up a single named interface (probe socket, three ioctls).
///
/// Used by ping workers, which re-resolve the local link address rather
/// than borrowing the forwarder's descriptor.
pub fn probe(name: &str) -> Result<Interface> {
    let sock = ProbeSocket::open()?;
    let mut ifr = ifreq_for(name);

    // SAFETY: ifr points at a properly initialized ifreq for this request.
    if unsafe { libc::ioctl(sock.0, libc::SIOCGIFADDR as _, &mut ifr) } < 0 {
        return Err(io::Error::last_os_error().into());
    }
    // SAFETY: SIOCGIFADDR filled ifr_addr with a sockaddr_in.
    let addr = unsafe { *(&ifr.ifr_ifru.ifru_addr as *const libc::sockaddr as *const libc::sockaddr_in) };
    let ipv4 = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr).to_be_bytes());

    let (mac, index) = query_link(sock.0, name)?;

    Ok(Interface {
        name: name.to_string(),
        index,
        mac,
        ipv4,
    })
}

/// Discover the primary interface.
///
/// Walks the kernel interface list and picks `eth0` when present,
/// otherwise the first non-loopback interface with an IPv4 address.
/// Alias entries ("eth0:1") are skipped.
pub fn discover() -> Result<Interface> {
    let sock = ProbeSocket::open()?;

    const MAX_IFS: usize = 64;
    let mut reqs: [libc::ifreq; MAX_IFS] =
        // SAFETY: array of plain C structs; all-zero is a valid value.
        unsafe { mem::zeroed() };
    let mut ifc: libc::ifconf =
        // SAFETY: as above.
        unsafe { mem::zeroed() };
    ifc.ifc_len = mem::size_of_val(&reqs) as libc::c_int;
    ifc.ifc_ifcu.ifcu_req = reqs.as_mut_ptr();

    // SAFETY: ifc describes a writable buffer of MAX_IFS ifreq entries.
    if unsafe { libc::ioctl(sock.0, libc::SIOCGIFCONF as _, &mut ifc) } < 0 {
        return Err(io::Error::last_os_error().into());
    }

    let count = ifc.ifc_len as usize / mem::size_of::<libc::ifreq>();
    let mut fallback: Option<Interface> = None;

    for ifr in reqs.iter().take(count) {
        // SAFETY: ifr_name is a NUL-terminated C string filled by the kernel.
        let name = unsafe { CStr::from_ptr(ifr.ifr_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        if name == "lo" || name.contains(':') {
            continue;
        }

        // SAFETY: SIOCGIFCONF returns AF_INET entries; ifru_addr is a
        // sockaddr_in.
        let addr = unsafe {
            *(&ifr.ifr_ifru.ifru_addr as *const libc::sockaddr as *const libc::sockaddr_in)
        };
        let ipv4 = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr).to_be_bytes());

        // Interfaces without a hardware address (tunnels, ppp) are not
        // usable for frame injection
        let Ok((mac, index)) = query_link(sock.0, &name) else {
            continue;
        };
        let iface = Interface {
            name: name.clone(),
            index,
            mac,
            ipv4,
        };

        if name == PRIMARY_IFNAME {
            return Ok(iface);
        }
        if fallback.is_none() {
            fallback = Some(iface);
        }
    }

    fallback.ok_or(NetError::NoInterface {
        name: PRIMARY_IFNAME,
    })
}
