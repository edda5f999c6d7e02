//! ARP cache
//!
//! Keyed solely on IPv4 address, at most one entry per key. An entry with
//! waiters is *incomplete*: its MAC may still be zero and exactly one ARP
//! REQUEST has been broadcast for it; the waiters are the client stream
//! connections to answer once the REPLY arrives. A *complete* entry has a
//! nonzero MAC and no waiters. There is no per-entry TTL.

use std::{collections::HashMap, net::Ipv4Addr, os::unix::net::UnixStream};

use log::info;

use crate::net::MacAddress;

/// One cache entry
#[derive(Debug)]
pub struct CacheEntry {
    /// Resolved hardware address (zero while incomplete)
    pub mac: MacAddress,
    /// Interface the mapping was last seen on
    pub ifindex: i32,
    /// Hardware type reported for that interface
    pub hatype: u16,
    /// Client connections awaiting resolution
    pub waiters: Vec<UnixStream>,
}

impl CacheEntry {
    /// Complete entries answer AREQs immediately.
    pub fn is_complete(&self) -> bool {
        !self.mac.is_zero() && self.waiters.is_empty()
    }
}

/// The cache, owned exclusively by the ARP service process
#[derive(Debug, Default)]
pub struct ArpCache {
    entries: HashMap<Ipv4Addr, CacheEntry>,
}

impl ArpCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ip: Ipv4Addr) -> Option<&CacheEntry> {
        self.entries.get(&ip)
    }

    pub fn get_mut(&mut self, ip: Ipv4Addr) -> Option<&mut CacheEntry> {
        self.entries.get_mut(&ip)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.entries.contains_key(&ip)
    }

    /// Insert or update an entry from an observed sender pair.
    ///
    /// Waiters attached to an existing entry are preserved; the caller
    /// drains them once the entry is usable.
    pub fn insert_or_update(
        &mut self,
        ip: Ipv4Addr,
        mac: MacAddress,
        ifindex: i32,
        hatype: u16,
    ) -> &mut CacheEntry {
        let verb = if self.entries.contains_key(&ip) {
            "update"
        } else {
            "insert"
        };
        let entry = self.entries.entry(ip).or_insert_with(|| CacheEntry {
            mac: MacAddress::ZERO,
            ifindex,
            hatype,
            waiters: Vec::new(),
        });
        entry.mac = mac;
        entry.ifindex = ifindex;
        entry.hatype = hatype;

        info!(target: "arp", "cache {verb}: <{ip}, {mac}, {ifindex}, {hatype}>");
        entry
    }

    /// Create an incomplete entry for an AREQ that missed the cache.
    ///
    /// The MAC stays zero until a REPLY arrives; `waiter` is answered (or
    /// dropped on disconnect) at that point.
    pub fn insert_incomplete(
        &mut self,
        ip: Ipv4Addr,
        ifindex: i32,
        hatype: u16,
        waiter: UnixStream,
    ) {
        let entry = self.entries.entry(ip).or_insert_with(|| CacheEntry {
            mac: MacAddress::ZERO,
            ifindex,
            hatype,
            waiters: Vec::new(),
        });
        entry.waiters.push(waiter);
    }

    pub fn remove(&mut self, ip: Ipv4Addr) -> Option<CacheEntry> {
        self.entries.remove(&ip)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Addresses of incomplete entries, i.e. those carrying waiters.
    pub fn pending_ips(&self) -> Vec<Ipv4Addr> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.waiters.is_empty())
            .map(|(ip, _)| *ip)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    const MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    #[test]
    fn test_single_entry_per_key() {
        let mut cache = ArpCache::new();
        cache.insert_or_update(ip(1), MAC, 2, 1);
        cache.insert_or_update(ip(1), MacAddress([1; 6]), 3, 1);

        assert_eq!(cache.len(), 1);
        let entry = cache.get(ip(1)).unwrap();
        assert_eq!(entry.mac, MacAddress([1; 6]));
        assert_eq!(entry.ifindex, 3);
    }

    #[test]
    fn test_complete_after_learn() {
        let mut cache = ArpCache::new();
        cache.insert_or_update(ip(1), MAC, 2, 1);
        assert!(cache.get(ip(1)).unwrap().is_complete());
    }

    #[test]
    fn test_incomplete_until_drained() {
        let mut cache = ArpCache::new();
        let (a, _b) = UnixStream::pair().unwrap();
        cache.insert_incomplete(ip(2), 2, 1, a);

        let entry = cache.get(ip(2)).unwrap();
        assert!(!entry.is_complete());
        assert!(entry.mac.is_zero());
        assert_eq!(cache.pending_ips(), vec![ip(2)]);
    }

    #[test]
    fn test_update_preserves_waiters() {
        let mut cache = ArpCache::new();
        let (a, _b) = UnixStream::pair().unwrap();
        cache.insert_incomplete(ip(2), 2, 1, a);
        cache.insert_or_update(ip(2), MAC, 2, 1);

        let entry = cache.get(ip(2)).unwrap();
        assert_eq!(entry.waiters.len(), 1);
        assert_eq!(entry.mac, MAC);
    }

    #[test]
    fn test_second_waiter_attaches() {
        let mut cache = ArpCache::new();
        let (a, _b) = UnixStream::pair().unwrap();
        let (c, _d) = UnixStream::pair().unwrap();
        cache.insert_incomplete(ip(2), 2, 1, a);
        cache.insert_incomplete(ip(2), 2, 1, c);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(ip(2)).unwrap().waiters.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut cache = ArpCache::new();
        cache.insert_or_update(ip(1), MAC, 2, 1);
        assert!(cache.remove(ip(1)).is_some());
        assert!(cache.is_empty());
    }
}
