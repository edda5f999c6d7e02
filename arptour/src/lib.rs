//! Source-routed multi-hop tour over a single broadcast segment.
//!
//! Two cooperating per-node daemons are built from this crate:
//! - `arpd`: a from-scratch ARP service speaking a custom-identified
//!   frame format over a packet socket and answering local clients over a
//!   Unix stream socket
//! - `tour`: the tour forwarder, which routes a custom IP packet through
//!   a pre-declared host sequence, pings each newly observed predecessor
//!   at the link layer, and coordinates the multicast end-of-tour
//!   handshake

pub mod arp;
pub mod error;
pub mod net;
pub mod sock;
pub mod tour;
pub mod util;

pub use error::{NetError, Result};
