//! Tour route packet codec
//!
//! A tour packet is a raw IPv4 packet (protocol 222, magic
//! identification) whose payload is an 8-byte tour header followed by the
//! complete visit sequence as consecutive 4-byte IPv4 addresses.
//! `payload[0]` is the originator and `payload[index]` the next hop.

use std::net::Ipv4Addr;

use crate::{
    error::NetError,
    net::ip::{self, Ipv4Header},
    Result,
};

/// Fixed multicast rendezvous group for the termination handshake
pub const MCAST_GROUP: Ipv4Addr = Ipv4Addr::new(0xEE, 0x5C, 0x53, 0x12);
/// Fixed multicast rendezvous port
pub const MCAST_PORT: u16 = 7518;

/// Tour header size: group(4) + port(2) + seq_length(1) + index(1)
pub const TOUR_HEADER_SIZE: usize = 8;

/// Tour header (big-endian on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TourHeader {
    /// Multicast group for the end-of-tour handshake
    pub group: Ipv4Addr,
    /// Multicast port for the end-of-tour handshake
    pub port: u16,
    /// Number of addresses in the visit sequence
    pub seq_length: u8,
    /// Index of the next hop in the sequence
    pub index: u8,
}

impl TourHeader {
    pub fn to_bytes(&self) -> [u8; TOUR_HEADER_SIZE] {
        let mut bytes = [0u8; TOUR_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.group.octets());
        bytes[4..6].copy_from_slice(&self.port.to_be_bytes());
        bytes[6] = self.seq_length;
        bytes[7] = self.index;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TOUR_HEADER_SIZE {
            return Err(NetError::Truncated {
                what: "tour_header",
                len: bytes.len(),
            });
        }

        Ok(Self {
            group: Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]),
            port: u16::from_be_bytes([bytes[4], bytes[5]]),
            seq_length: bytes[6],
            index: bytes[7],
        })
    }
}

/// A complete tour packet: outer IPv4 header, tour header, visit sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TourPacket {
    pub ip: Ipv4Header,
    pub header: TourHeader,
    pub sequence: Vec<Ipv4Addr>,
}

impl TourPacket {
    /// Total on-wire length for a sequence of `seq_length` addresses.
    pub fn wire_len(seq_length: usize) -> usize {
        Ipv4Header::MIN_SIZE + TOUR_HEADER_SIZE + 4 * seq_length
    }

    /// Build the initial packet sent by the source node: index 1, the
    /// fixed rendezvous group, destination `sequence[1]`.
    pub fn initial(sequence: Vec<Ipv4Addr>) -> Self {
        let total = Self::wire_len(sequence.len()) as u16;
        let ip = Ipv4Header::tour(sequence[0], sequence[1], total);
        Self {
            ip,
            header: TourHeader {
                group: MCAST_GROUP,
                port: MCAST_PORT,
                seq_length: sequence.len() as u8,
                index: 1,
            },
            sequence,
        }
    }

    /// Rewrite the outer header for the next hop: source becomes `src`
    /// (this node), destination `sequence[index]`.
    pub fn retarget(&mut self, src: Ipv4Addr) {
        let total = Self::wire_len(self.sequence.len()) as u16;
        self.ip = Ipv4Header::tour(src, self.sequence[usize::from(self.header.index)], total);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::wire_len(self.sequence.len()));
        bytes.extend_from_slice(&self.ip.to_bytes());
        bytes.extend_from_slice(&self.header.to_bytes());
        for addr in &self.sequence {
            bytes.extend_from_slice(&addr.octets());
        }
        bytes
    }

    /// Parse a packet read from the raw socket (IP header included).
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let ip = Ipv4Header::from_bytes(data)?;
        let header_len = ip.header_len();
        if data.len() < header_len + TOUR_HEADER_SIZE {
            return Err(NetError::Truncated {
                what: "tour_packet",
                len: data.len(),
            });
        }

        let header = TourHeader::from_bytes(&data[header_len..])?;
        let seq_bytes = &data[header_len + TOUR_HEADER_SIZE..];
        let want = 4 * usize::from(header.seq_length);
        if seq_bytes.len() < want {
            return Err(NetError::Truncated {
                what: "tour_sequence",
                len: seq_bytes.len(),
            });
        }

        let sequence = seq_bytes[..want]
            .chunks_exact(4)
            .map(|c| Ipv4Addr::new(c[0], c[1], c[2], c[3]))
            .collect();

        Ok(Self {
            ip,
            header,
            sequence,
        })
    }

    /// True when the identification word marks this as a tour packet.
    pub fn is_tour(ip: &Ipv4Header) -> bool {
        ip.identification == ip::IP_ID_CODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(hosts: &[[u8; 4]]) -> Vec<Ipv4Addr> {
        hosts
            .iter()
            .map(|o| Ipv4Addr::new(o[0], o[1], o[2], o[3]))
            .collect()
    }

    #[test]
    fn test_initial_packet() {
        let packet = TourPacket::initial(seq(&[
            [10, 0, 0, 1],
            [10, 0, 0, 2],
            [10, 0, 0, 3],
            [10, 0, 0, 1],
        ]));

        assert_eq!(packet.ip.protocol, ip::IPPROTO_TOUR);
        assert_eq!(packet.ip.identification, ip::IP_ID_CODE);
        assert_eq!(packet.ip.ttl, 1);
        assert_eq!(packet.ip.source, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(packet.ip.destination, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(packet.header.group, MCAST_GROUP);
        assert_eq!(packet.header.port, MCAST_PORT);
        assert_eq!(packet.header.seq_length, 4);
        assert_eq!(packet.header.index, 1);
    }

    #[test]
    fn test_roundtrip() {
        let packet = TourPacket::initial(seq(&[[10, 0, 0, 1], [10, 0, 0, 2], [10, 0, 0, 3]]));
        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), TourPacket::wire_len(3));

        let parsed = TourPacket::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, packet);
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn test_group_encoding() {
        let packet = TourPacket::initial(seq(&[[10, 0, 0, 1], [10, 0, 0, 2]]));
        let bytes = packet.to_bytes();
        assert_eq!(&bytes[20..24], &[0xEE, 0x5C, 0x53, 0x12]);
        assert_eq!(u16::from_be_bytes([bytes[24], bytes[25]]), MCAST_PORT);
    }

    #[test]
    fn test_retarget() {
        let mut packet = TourPacket::initial(seq(&[[10, 0, 0, 1], [10, 0, 0, 2], [10, 0, 0, 3]]));
        packet.header.index = 2;
        packet.retarget(Ipv4Addr::new(10, 0, 0, 2));

        assert_eq!(packet.ip.source, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(packet.ip.destination, Ipv4Addr::new(10, 0, 0, 3));
        // Checksum must be valid after the rewrite
        assert_eq!(crate::net::rfc1071_checksum(&packet.ip.to_bytes()), 0);
    }

    #[test]
    fn test_truncated_sequence_rejected() {
        let packet = TourPacket::initial(seq(&[[10, 0, 0, 1], [10, 0, 0, 2], [10, 0, 0, 3]]));
        let bytes = packet.to_bytes();
        assert!(TourPacket::from_bytes(&bytes[..bytes.len() - 2]).is_err());
    }
}
