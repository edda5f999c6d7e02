//! ICMPv4 echo codec
//!
//! Only the echo request/reply pair is needed: the ping workers craft
//! echo requests at the Ethernet layer and the shared reply reader parses
//! echo replies off the raw ICMP socket.

use crate::{error::NetError, net, Result};

/// Echo Request
pub const ICMP_ECHO_REQUEST: u8 = 8;
/// Echo Reply
pub const ICMP_ECHO_REPLY: u8 = 0;

/// ICMP echo header size: type + code + checksum + id + seq = 8 bytes
pub const ICMP_ECHO_HEADER_SIZE: usize = 8;

/// Echo payload carried by every request: a send timestamp
/// (seconds + microseconds since the epoch, big-endian)
pub const ICMP_ECHO_DATA_SIZE: usize = 16;

/// ICMP echo message (header and data)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpEcho {
    /// Message type (echo request or reply)
    pub icmp_type: u8,
    /// Always zero for echo
    pub code: u8,
    /// Checksum over header plus data
    pub checksum: u16,
    /// Echo identifier (low 16 bits of the sender's pid)
    pub id: u16,
    /// Sequence number
    pub seq: u16,
    /// Echo data, reflected verbatim by the peer
    pub data: Vec<u8>,
}

impl IcmpEcho {
    /// Build an echo request with the checksum already filled in.
    pub fn request(id: u16, seq: u16, data: Vec<u8>) -> Self {
        let mut echo = Self {
            icmp_type: ICMP_ECHO_REQUEST,
            code: 0,
            checksum: 0,
            id,
            seq,
            data,
        };
        echo.checksum = net::rfc1071_checksum(&echo.to_bytes());
        echo
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ICMP_ECHO_HEADER_SIZE + self.data.len());
        bytes.push(self.icmp_type);
        bytes.push(self.code);
        bytes.extend_from_slice(&self.checksum.to_be_bytes());
        bytes.extend_from_slice(&self.id.to_be_bytes());
        bytes.extend_from_slice(&self.seq.to_be_bytes());
        bytes.extend_from_slice(&self.data);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ICMP_ECHO_HEADER_SIZE {
            return Err(NetError::Truncated {
                what: "icmp_echo",
                len: bytes.len(),
            });
        }

        Ok(Self {
            icmp_type: bytes[0],
            code: bytes[1],
            checksum: u16::from_be_bytes([bytes[2], bytes[3]]),
            id: u16::from_be_bytes([bytes[4], bytes[5]]),
            seq: u16::from_be_bytes([bytes[6], bytes[7]]),
            data: bytes[ICMP_ECHO_HEADER_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_checksum_validates() {
        let echo = IcmpEcho::request(0x1234, 2, vec![0xAB; ICMP_ECHO_DATA_SIZE]);
        // A correct message checksums to zero over header plus data
        assert_eq!(net::rfc1071_checksum(&echo.to_bytes()), 0);
    }

    #[test]
    fn test_roundtrip() {
        let echo = IcmpEcho::request(77, 3, vec![1, 2, 3, 4]);
        let parsed = IcmpEcho::from_bytes(&echo.to_bytes()).unwrap();
        assert_eq!(parsed, echo);
    }

    #[test]
    fn test_too_short() {
        assert!(IcmpEcho::from_bytes(&[8, 0, 0]).is_err());
    }

    #[test]
    fn test_layout_big_endian() {
        let echo = IcmpEcho::request(0x0102, 0x0304, Vec::new());
        let bytes = echo.to_bytes();
        assert_eq!(bytes[0], ICMP_ECHO_REQUEST);
        assert_eq!(&bytes[4..6], &[0x01, 0x02]);
        assert_eq!(&bytes[6..8], &[0x03, 0x04]);
    }
}
