//! Tour daemon: forwarder, ping workers, termination handshake
//!
//! The forwarder advances the route packet through the declared sequence,
//! asks the ARP service for each newly observed predecessor's hardware
//! address, and hands the pair to a ping worker. The last node triggers
//! the multicast identification handshake.

pub mod mcast;
pub mod ping;
pub mod service;

use std::net::Ipv4Addr;

use log::info;

use crate::{error::NetError, util, Result};

/// One node of the visit sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TourNode {
    pub hostname: String,
    pub ip: Ipv4Addr,
}

/// Collapse immediately repeated hostnames, with the source prepended.
///
/// `v1 v2 v2 v3` invoked on `v1` becomes `v1 v2 v3`; the comparison is
/// against the previously kept name, so `v2 v3 v2` is left alone.
pub fn simplify_sequence(source: &str, hosts: &[String]) -> Vec<String> {
    let mut kept = vec![source.to_string()];
    for host in hosts {
        if kept.last().map(String::as_str) != Some(host.as_str()) {
            kept.push(host.clone());
        }
    }
    kept
}

/// Build the resolved visit sequence for a source node.
///
/// Fails when a hostname does not resolve or when the simplified list
/// contains only the source itself.
pub fn build_sequence(source: &str, source_ip: Ipv4Addr, hosts: &[String]) -> Result<Vec<TourNode>> {
    let names = simplify_sequence(source, hosts);
    if names.len() == 1 {
        return Err(NetError::InvalidSequence);
    }

    let mut nodes = Vec::with_capacity(names.len());
    nodes.push(TourNode {
        hostname: names[0].clone(),
        ip: source_ip,
    });
    for name in &names[1..] {
        nodes.push(TourNode {
            hostname: name.clone(),
            ip: util::hostname_to_ip(name)?,
        });
    }

    info!(target: "tour", "node sequence ({}) from command line:", nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        info!(
            target: "tour",
            "  {:>10} - {}{}",
            node.hostname,
            node.ip,
            if i == 0 { " * source" } else { "" }
        );
    }

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simplify_collapses_consecutive() {
        assert_eq!(
            simplify_sequence("v1", &hosts(&["v2", "v2", "v3"])),
            hosts(&["v1", "v2", "v3"])
        );
    }

    #[test]
    fn test_simplify_keeps_revisits() {
        assert_eq!(
            simplify_sequence("v1", &hosts(&["v2", "v3", "v2", "v3"])),
            hosts(&["v1", "v2", "v3", "v2", "v3"])
        );
    }

    #[test]
    fn test_simplify_collapses_leading_self() {
        assert_eq!(
            simplify_sequence("v1", &hosts(&["v1", "v2"])),
            hosts(&["v1", "v2"])
        );
    }

    #[test]
    fn test_sequence_of_only_self_rejected() {
        let err = build_sequence("v1", Ipv4Addr::new(10, 0, 0, 1), &hosts(&["v1", "v1"]));
        assert!(matches!(err, Err(NetError::InvalidSequence)));
    }

    #[test]
    fn test_sequence_resolves_entries() {
        let nodes = build_sequence(
            "self",
            Ipv4Addr::new(10, 0, 0, 1),
            &hosts(&["localhost"]),
        )
        .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(nodes[1].ip, Ipv4Addr::new(127, 0, 0, 1));
    }
}
