//! Consistent hash ring for picking the peer that owns a key
//!
//! Each real peer is placed on the ring `replicas` times, at
//! `hash(i ∥ peer)` for `i` in `0..replicas`. A key belongs to the first
//! position at or after `hash(key)`, wrapping around past the last one.

use std::collections::HashMap;

use ahash::RandomState;

/// Hash function mapping bytes onto the ring
pub type HashFn = fn(&[u8]) -> u32;

/// Virtual nodes per peer used by `HashRing::default`
pub const DEFAULT_REPLICAS: usize = 50;

/// Sorted ring of virtual-node positions
///
/// Not internally synchronized: mutation takes `&mut self`, so callers that
/// change the peer set at runtime must guard the ring themselves.
#[derive(Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    keys: Vec<u32>,
    ring_map: HashMap<u32, String, RandomState>,
    peers: Vec<String>,
}

impl HashRing {
    /// Create a ring using CRC-32C as the hash function
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, crc32c::crc32c)
    }

    /// Create a ring with a custom hash function
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            keys: Vec::new(),
            ring_map: HashMap::with_hasher(RandomState::new()),
            peers: Vec::new(),
        }
    }

    /// Add peers to the ring; peers already present are ignored
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for peer in peers {
            let peer = peer.into();
            if self.peers.contains(&peer) {
                continue;
            }

            for i in 0..self.replicas {
                let hash = (self.hash)(format!("{}{}", i, peer).as_bytes());
                // On a position collision the earlier owner keeps it.
                if let std::collections::hash_map::Entry::Vacant(slot) = self.ring_map.entry(hash) {
                    slot.insert(peer.clone());
                    self.keys.push(hash);
                }
            }
            self.peers.push(peer);
        }

        self.keys.sort_unstable();
    }

    /// Remove a peer and all of its virtual nodes
    pub fn remove(&mut self, peer: &str) {
        let Some(pos) = self.peers.iter().position(|p| p == peer) else {
            return;
        };
        self.peers.remove(pos);

        self.ring_map.retain(|_, owner| owner != peer);
        let ring_map = &self.ring_map;
        self.keys.retain(|hash| ring_map.contains_key(hash));
    }

    /// Peer owning `key`, or `None` when the ring is empty
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.keys.partition_point(|&pos| pos < hash);
        let position = self.keys[idx % self.keys.len()];

        self.ring_map.get(&position).map(String::as_str)
    }

    /// Number of real peers on the ring
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if no peers are registered
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Real peers in the order they were added
    pub fn peers(&self) -> &[String] {
        &self.peers
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}
