//! Cached view of the storage network.

use crate::network::service_node::ServiceNode;
use crate::network::swarm;
use rand::seq::IteratorRandom;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Known storage nodes keyed by identity, plus the refresh schedule
#[derive(Debug, Clone)]
pub struct SwarmMap {
    nodes: BTreeMap<String, ServiceNode>,
    refresh_interval: Duration,
    next_refresh_at: Option<Instant>,
}

impl SwarmMap {
    /// Create an empty map refreshed every `refresh_interval`
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            nodes: BTreeMap::new(),
            refresh_interval,
            next_refresh_at: None,
        }
    }

    /// Replace the whole node set and schedule the next refresh from `now`
    pub fn replace(&mut self, nodes: impl IntoIterator<Item = ServiceNode>, now: Instant) {
        self.nodes = nodes.into_iter().map(|node| (node.key(), node)).collect();
        self.next_refresh_at = Some(now + self.refresh_interval);
    }

    /// Drop every node and the schedule
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.next_refresh_at = None;
    }

    /// Whether no node is known
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of known nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes in key order
    pub fn nodes(&self) -> impl Iterator<Item = &ServiceNode> {
        self.nodes.values()
    }

    /// Look up a node by key
    pub fn get(&self, key: &str) -> Option<&ServiceNode> {
        self.nodes.get(key)
    }

    /// Whether the node list is due for a refresh at `now`
    pub fn should_refresh(&self, now: Instant) -> bool {
        match self.next_refresh_at {
            Some(at) => now >= at,
            None => true,
        }
    }

    /// When the next refresh is due
    pub fn next_refresh_at(&self) -> Option<Instant> {
        self.next_refresh_at
    }

    /// A uniformly random known node
    pub fn random(&self) -> Option<ServiceNode> {
        self.nodes.values().choose(&mut rand::thread_rng()).cloned()
    }

    /// Nodes of the swarm responsible for `public_key`
    pub fn swarm_for(&self, public_key: &[u8]) -> Vec<ServiceNode> {
        swarm::select_swarm(self.nodes.values(), public_key)
    }

    /// A random member of the swarm responsible for `public_key`
    pub fn random_in_swarm(&self, public_key: &[u8]) -> Option<ServiceNode> {
        self.swarm_for(public_key)
            .into_iter()
            .choose(&mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(key: &str, swarm_id: u64) -> ServiceNode {
        ServiceNode {
            remote_ip: "10.0.0.1".to_string(),
            storage_port: 443,
            identity_key: key.to_string(),
            encryption_key: String::new(),
            swarm_id,
        }
    }

    #[test]
    fn test_empty_map_needs_refresh() {
        let map = SwarmMap::new(Duration::from_secs(120));
        assert!(map.is_empty());
        assert!(map.should_refresh(Instant::now()));
        assert!(map.random().is_none());
    }

    #[test]
    fn test_refresh_schedule() {
        let mut map = SwarmMap::new(Duration::from_secs(120));
        let start = Instant::now();
        map.replace(vec![node("aa", 1)], start);

        assert!(!map.should_refresh(start));
        assert!(!map.should_refresh(start + Duration::from_secs(119)));
        assert!(map.should_refresh(start + Duration::from_secs(120)));
        assert!(map.should_refresh(start + Duration::from_secs(500)));
    }

    #[test]
    fn test_replace_is_wholesale_and_deduplicates() {
        let mut map = SwarmMap::new(Duration::from_secs(120));
        let now = Instant::now();
        map.replace(vec![node("aa", 1), node("bb", 1)], now);
        map.replace(vec![node("cc", 2), node("cc", 2)], now);

        assert_eq!(map.len(), 1);
        assert!(map.get("aa").is_none());
        assert!(map.get("cc").is_some());
    }

    #[test]
    fn test_random_in_swarm() {
        let mut map = SwarmMap::new(Duration::from_secs(120));
        map.replace(
            vec![node("aa", 10), node("bb", 10), node("cc", 900)],
            Instant::now(),
        );

        let key = 11u64.to_be_bytes();
        for _ in 0..16 {
            let picked = map.random_in_swarm(&key).unwrap();
            assert_eq!(picked.swarm_id, 10);
        }
        assert_eq!(map.swarm_for(&key).len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut map = SwarmMap::new(Duration::from_secs(1));
        map.replace(vec![node("aa", 1)], Instant::now());
        map.clear();
        assert!(map.is_empty());
        assert!(map.next_refresh_at().is_none());
    }
}
