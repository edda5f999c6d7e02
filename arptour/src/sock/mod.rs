//! Socket wrappers owned by the two daemons
//!
//! Thin, explicitly fallible wrappers over the raw sockets the protocol
//! stack needs: `AF_PACKET` for link-layer frames, raw IPv4 for the tour
//! protocol and ICMP, a UDP pair for the multicast rendezvous, and a
//! `poll(2)`-based readiness multiplexer driving both event loops.

pub mod mcast;
pub mod packet;
pub mod poll;
pub mod raw;
