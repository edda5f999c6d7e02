//! ARP service and its local client interface
//!
//! The service process owns the custom-ARP packet socket, the Unix stream
//! listener, and the cache. Clients resolve addresses through [`areq`],
//! which exchanges a 4-byte IPv4 address for one fixed-size hardware
//! address record over a fresh stream connection.
//!
//! [`areq`]: areq::areq

pub mod areq;
pub mod cache;
pub mod service;

use crate::{error::NetError, net::MacAddress, Result};

/// Well-known path of the ARP service listener
pub const ARP_SERVICE_PATH: &str = "/tmp/14508-61173-arpService";

/// Prefix of the anonymous client-side socket paths
pub const CLIENT_PATH_PREFIX: &str = "/tmp/14508-61173-tourApplication-";

/// On-wire size of the hardware address record
pub const HWADDR_RECORD_SIZE: usize = 15;

/// Hardware address record exchanged over the AREQ stream
///
/// Wire layout (native little-endian, packed):
/// `i32` interface index, `u16` hardware type, `u8` address length,
/// 8 address bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwAddr {
    /// Interface the address was learned on
    pub ifindex: i32,
    /// Hardware type (1 for Ethernet)
    pub hatype: u16,
    /// Significant length of `addr`
    pub halen: u8,
    /// Physical layer address, zero padded
    pub addr: [u8; 8],
}

impl HwAddr {
    /// Record describing an Ethernet neighbor.
    pub fn ethernet(ifindex: i32, hatype: u16, mac: MacAddress) -> Self {
        let mut addr = [0u8; 8];
        addr[..6].copy_from_slice(&mac.0);
        Self {
            ifindex,
            hatype,
            halen: 6,
            addr,
        }
    }

    /// The MAC portion of the record.
    pub fn mac(&self) -> MacAddress {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.addr[..6]);
        MacAddress(mac)
    }

    pub fn to_bytes(&self) -> [u8; HWADDR_RECORD_SIZE] {
        let mut bytes = [0u8; HWADDR_RECORD_SIZE];
        bytes[0..4].copy_from_slice(&self.ifindex.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.hatype.to_le_bytes());
        bytes[6] = self.halen;
        bytes[7..15].copy_from_slice(&self.addr);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HWADDR_RECORD_SIZE {
            return Err(NetError::Truncated {
                what: "hwaddr_record",
                len: bytes.len(),
            });
        }

        let mut addr = [0u8; 8];
        addr.copy_from_slice(&bytes[7..15]);
        Ok(Self {
            ifindex: i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            hatype: u16::from_le_bytes([bytes[4], bytes[5]]),
            halen: bytes[6],
            addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let record = HwAddr::ethernet(
            2,
            1,
            MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
        );
        assert_eq!(
            record.to_bytes(),
            [
                0x02, 0x00, 0x00, 0x00, // ifindex, little-endian
                0x01, 0x00, // hatype, little-endian
                0x06, // halen
                0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x00,
            ]
        );
    }

    #[test]
    fn test_roundtrip() {
        let record = HwAddr::ethernet(7, 1, MacAddress([1, 2, 3, 4, 5, 6]));
        let parsed = HwAddr::from_bytes(&record.to_bytes()).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.mac(), MacAddress([1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_short_record_rejected() {
        assert!(HwAddr::from_bytes(&[0u8; 10]).is_err());
    }
}
