//! Custom ARP frame codec
//!
//! The ARP protocol spoken here is deliberately distinguishable from
//! RFC 826 ARP: frames ride a private EtherType and carry an extra
//! identification word in front of the usual header fields. A node drops
//! any frame whose identification does not match [`ARP_ID_CODE`].

use std::net::Ipv4Addr;

use crate::{
    error::NetError,
    net::{ethernet, MacAddress},
    Result,
};

/// Identification word carried by every frame of this protocol
pub const ARP_ID_CODE: u16 = 14508;

/// Hardware type: Ethernet
pub const ARP_HRD_ETHERNET: u16 = 0x0001;
/// Protocol type: IPv4
pub const ARP_PRO_IPV4: u16 = 0x0800;

/// ARP operation: request
pub const ARP_OP_REQUEST: u16 = 1;
/// ARP operation: reply
pub const ARP_OP_REPLY: u16 = 2;

/// Custom ARP header size: id(2) + hrd(2) + pro(2) + hln(1) + pln(1) + op(2)
pub const ARP_HEADER_SIZE: usize = 10;

/// ARP payload size: two (MAC, IPv4) pairs
pub const ARP_PAYLOAD_SIZE: usize = 20;

/// Total frame length: Ethernet header + ARP header + payload = 44 bytes
pub const ARP_FRAME_SIZE: usize =
    ethernet::ETHERNET_HEADER_SIZE + ARP_HEADER_SIZE + ARP_PAYLOAD_SIZE;

/// Custom ARP header (all fields big-endian on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpHeader {
    /// Protocol identification, must equal [`ARP_ID_CODE`]
    pub ar_id: u16,
    /// Hardware address format
    pub ar_hrd: u16,
    /// Protocol address format
    pub ar_pro: u16,
    /// Hardware address length
    pub ar_hln: u8,
    /// Protocol address length
    pub ar_pln: u8,
    /// Operation (request or reply)
    pub ar_op: u16,
}

impl ArpHeader {
    /// Header with the fixed Ethernet/IPv4 field values and the given op.
    pub fn new(op: u16) -> Self {
        Self {
            ar_id: ARP_ID_CODE,
            ar_hrd: ARP_HRD_ETHERNET,
            ar_pro: ARP_PRO_IPV4,
            ar_hln: 6,
            ar_pln: 4,
            ar_op: op,
        }
    }

    pub fn to_bytes(&self) -> [u8; ARP_HEADER_SIZE] {
        let mut bytes = [0u8; ARP_HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.ar_id.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.ar_hrd.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.ar_pro.to_be_bytes());
        bytes[6] = self.ar_hln;
        bytes[7] = self.ar_pln;
        bytes[8..10].copy_from_slice(&self.ar_op.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ARP_HEADER_SIZE {
            return Err(NetError::Truncated {
                what: "arp_header",
                len: bytes.len(),
            });
        }

        Ok(Self {
            ar_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            ar_hrd: u16::from_be_bytes([bytes[2], bytes[3]]),
            ar_pro: u16::from_be_bytes([bytes[4], bytes[5]]),
            ar_hln: bytes[6],
            ar_pln: bytes[7],
            ar_op: u16::from_be_bytes([bytes[8], bytes[9]]),
        })
    }
}

/// ARP payload: sender and target address pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPayload {
    pub sender_mac: MacAddress,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddress,
    pub target_ip: Ipv4Addr,
}

impl ArpPayload {
    pub fn to_bytes(&self) -> [u8; ARP_PAYLOAD_SIZE] {
        let mut bytes = [0u8; ARP_PAYLOAD_SIZE];
        bytes[0..6].copy_from_slice(&self.sender_mac.0);
        bytes[6..10].copy_from_slice(&self.sender_ip.octets());
        bytes[10..16].copy_from_slice(&self.target_mac.0);
        bytes[16..20].copy_from_slice(&self.target_ip.octets());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ARP_PAYLOAD_SIZE {
            return Err(NetError::Truncated {
                what: "arp_payload",
                len: bytes.len(),
            });
        }

        let mut sender_mac = [0u8; 6];
        let mut target_mac = [0u8; 6];
        sender_mac.copy_from_slice(&bytes[0..6]);
        target_mac.copy_from_slice(&bytes[10..16]);

        Ok(Self {
            sender_mac: MacAddress(sender_mac),
            sender_ip: Ipv4Addr::new(bytes[6], bytes[7], bytes[8], bytes[9]),
            target_mac: MacAddress(target_mac),
            target_ip: Ipv4Addr::new(bytes[16], bytes[17], bytes[18], bytes[19]),
        })
    }
}

/// A fully parsed ARP frame (Ethernet addressing plus ARP content)
#[derive(Debug, Clone, Copy)]
pub struct ArpFrame {
    pub eth_dst: MacAddress,
    pub eth_src: MacAddress,
    pub header: ArpHeader,
    pub payload: ArpPayload,
}

impl ArpFrame {
    /// Serialize into the fixed 44-byte on-wire representation.
    pub fn to_bytes(&self) -> [u8; ARP_FRAME_SIZE] {
        let mut frame = [0u8; ARP_FRAME_SIZE];
        frame[0..6].copy_from_slice(&self.eth_dst.0);
        frame[6..12].copy_from_slice(&self.eth_src.0);
        frame[12..14].copy_from_slice(&ethernet::ETHERTYPE_CUSTOM_ARP.to_be_bytes());
        frame[14..24].copy_from_slice(&self.header.to_bytes());
        frame[24..44].copy_from_slice(&self.payload.to_bytes());
        frame
    }

    /// Parse a received frame. Length and EtherType are validated here;
    /// the identification word is left to the caller so that mismatches
    /// can be dropped without surfacing an error.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let eth = ethernet::parse_frame(data)?;
        if eth.ethertype != ethernet::ETHERTYPE_CUSTOM_ARP {
            return Err(NetError::InvalidField { field: "ethertype" });
        }
        let header = ArpHeader::from_bytes(eth.payload)?;
        let payload = ArpPayload::from_bytes(&eth.payload[ARP_HEADER_SIZE..])?;

        Ok(Self {
            eth_dst: eth.dst_mac,
            eth_src: eth.src_mac,
            header,
            payload,
        })
    }

    /// Build a broadcast REQUEST asking for `target_ip`.
    ///
    /// The target hardware address is zero; that is what the request is
    /// trying to learn.
    pub fn request(sender_mac: MacAddress, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            eth_dst: MacAddress::BROADCAST,
            eth_src: sender_mac,
            header: ArpHeader::new(ARP_OP_REQUEST),
            payload: ArpPayload {
                sender_mac,
                sender_ip,
                target_mac: MacAddress::ZERO,
                target_ip,
            },
        }
    }

    /// Build a unicast REPLY answering `target`'s request.
    pub fn reply(
        sender_mac: MacAddress,
        sender_ip: Ipv4Addr,
        target_mac: MacAddress,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            eth_dst: target_mac,
            eth_src: sender_mac,
            header: ArpHeader::new(ARP_OP_REPLY),
            payload: ArpPayload {
                sender_mac,
                sender_ip,
                target_mac,
                target_ip,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> ArpFrame {
        ArpFrame::request(
            MacAddress([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]),
            Ipv4Addr::new(10, 0, 2, 15),
            Ipv4Addr::new(10, 0, 2, 1),
        )
    }

    #[test]
    fn test_frame_is_44_bytes() {
        assert_eq!(ARP_FRAME_SIZE, 44);
        assert_eq!(sample_request().to_bytes().len(), 44);
    }

    #[test]
    fn test_request_fields() {
        let frame = sample_request();
        assert_eq!(frame.eth_dst, MacAddress::BROADCAST);
        assert_eq!(frame.header.ar_id, ARP_ID_CODE);
        assert_eq!(frame.header.ar_op, ARP_OP_REQUEST);
        assert_eq!(frame.payload.target_mac, MacAddress::ZERO);
    }

    #[test]
    fn test_roundtrip() {
        let frame = ArpFrame::reply(
            MacAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
            Ipv4Addr::new(192, 168, 1, 1),
            MacAddress([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]),
            Ipv4Addr::new(192, 168, 1, 100),
        );
        let bytes = frame.to_bytes();
        let parsed = ArpFrame::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.header, frame.header);
        assert_eq!(parsed.payload, frame.payload);
        assert_eq!(parsed.eth_dst, frame.eth_dst);
        assert_eq!(parsed.eth_src, frame.eth_src);
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn test_header_layout_big_endian() {
        let bytes = sample_request().to_bytes();
        // ar_id sits right after the Ethernet header
        assert_eq!(u16::from_be_bytes([bytes[14], bytes[15]]), ARP_ID_CODE);
        assert_eq!(u16::from_be_bytes([bytes[16], bytes[17]]), ARP_HRD_ETHERNET);
        assert_eq!(u16::from_be_bytes([bytes[18], bytes[19]]), ARP_PRO_IPV4);
        assert_eq!(bytes[20], 6);
        assert_eq!(bytes[21], 4);
        assert_eq!(u16::from_be_bytes([bytes[22], bytes[23]]), ARP_OP_REQUEST);
    }

    #[test]
    fn test_wrong_ethertype_rejected() {
        let mut bytes = sample_request().to_bytes();
        bytes[12..14].copy_from_slice(&0x0806u16.to_be_bytes());
        assert!(ArpFrame::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_truncated_rejected() {
        let bytes = sample_request().to_bytes();
        assert!(ArpFrame::from_bytes(&bytes[..30]).is_err());
    }
}
