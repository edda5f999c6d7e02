//! Ethernet II frame parsing and construction
//!
//! Handles the 14-byte Ethernet header carried in front of both the
//! custom ARP frame and the injected ICMP echo frames.

use crate::{error::NetError, net::MacAddress, Result};

/// Ethernet frame header size: dst(6) + src(6) + ethertype(2) = 14 bytes
pub const ETHERNET_HEADER_SIZE: usize = 14;

/// EtherType of the custom ARP protocol (deliberately not 0x0806)
pub const ETHERTYPE_CUSTOM_ARP: u16 = 61173;

/// EtherType for IPv4, used by the injected ping frames
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// Parsed Ethernet frame
#[derive(Debug, Clone)]
pub struct EthernetFrame<'a> {
    /// Destination MAC address
    pub dst_mac: MacAddress,
    /// Source MAC address
    pub src_mac: MacAddress,
    /// EtherType field
    pub ethertype: u16,
    /// Payload (reference to data after the header)
    pub payload: &'a [u8],
}

/// Parse an Ethernet frame from raw bytes.
///
/// Returns an `EthernetFrame` with references into the original buffer
/// for zero-copy payload access.
pub fn parse_frame(data: &[u8]) -> Result<EthernetFrame<'_>> {
    if data.len() < ETHERNET_HEADER_SIZE {
        return Err(NetError::Truncated {
            what: "ethernet_frame",
            len: data.len(),
        });
    }

    let mut dst = [0u8; 6];
    let mut src = [0u8; 6];
    dst.copy_from_slice(&data[0..6]);
    src.copy_from_slice(&data[6..12]);
    let ethertype = u16::from_be_bytes([data[12], data[13]]);

    Ok(EthernetFrame {
        dst_mac: MacAddress(dst),
        src_mac: MacAddress(src),
        ethertype,
        payload: &data[ETHERNET_HEADER_SIZE..],
    })
}

/// Construct an Ethernet frame from components.
pub fn construct_frame(
    dst: MacAddress,
    src: MacAddress,
    ethertype: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut frame = Vec::with_capacity(ETHERNET_HEADER_SIZE + payload.len());

    frame.extend_from_slice(&dst.0);
    frame.extend_from_slice(&src.0);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);

    frame
}

/// Construct a broadcast frame (destination ff:ff:ff:ff:ff:ff).
pub fn construct_broadcast_frame(src: MacAddress, ethertype: u16, payload: &[u8]) -> Vec<u8> {
    construct_frame(MacAddress::BROADCAST, src, ethertype, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_and_parse() {
        let dst = MacAddress([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        let src = MacAddress([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);
        let payload = b"Hello, Ethernet!";

        let frame = construct_frame(dst, src, ETHERTYPE_IPV4, payload);
        assert_eq!(frame.len(), ETHERNET_HEADER_SIZE + payload.len());

        let parsed = parse_frame(&frame).unwrap();
        assert_eq!(parsed.dst_mac, dst);
        assert_eq!(parsed.src_mac, src);
        assert_eq!(parsed.ethertype, ETHERTYPE_IPV4);
        assert_eq!(parsed.payload, payload);
    }

    #[test]
    fn test_parse_too_short() {
        let short = [0u8; 10];
        assert!(parse_frame(&short).is_err());
    }

    #[test]
    fn test_broadcast_frame() {
        let src = MacAddress([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);
        let frame = construct_broadcast_frame(src, ETHERTYPE_CUSTOM_ARP, &[]);
        assert_eq!(&frame[0..6], &[0xFF; 6]);
        assert_eq!(
            u16::from_be_bytes([frame[12], frame[13]]),
            ETHERTYPE_CUSTOM_ARP
        );
    }
}
