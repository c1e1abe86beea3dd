//! Peer capabilities and the ring-backed peer picker

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::ring::HashRing;

/// Fetches a group's value for a key from a remote peer
pub trait PeerGetter: Send + Sync {
    /// Return the bytes `group` holds for `key` on that peer
    fn get(&self, group: &str, key: &str) -> Result<Vec<u8>>;
}

/// Chooses the peer responsible for a key
pub trait PeerPicker: Send + Sync {
    /// Peer owning `key`, or `None` when this node owns it (or no peers exist)
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

type Connector = Box<dyn Fn(&str) -> Arc<dyn PeerGetter> + Send + Sync>;

struct Topology {
    ring: HashRing,
    getters: HashMap<String, Arc<dyn PeerGetter>, RandomState>,
}

/// `PeerPicker` placing keys on a consistent hash ring of peer addresses
///
/// The local node takes part in the ring but never gets a getter, so keys it
/// owns resolve to `None` and are loaded locally. Ring reads and topology
/// changes are serialized by a read/write lock.
pub struct RingPicker {
    self_id: String,
    replicas: usize,
    connect: Connector,
    topology: RwLock<Topology>,
}

impl RingPicker {
    /// Create a picker for the node identified by `self_id`
    ///
    /// `connect` builds the getter used to reach a remote peer id.
    pub fn new<F>(self_id: impl Into<String>, replicas: usize, connect: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn PeerGetter> + Send + Sync + 'static,
    {
        Self {
            self_id: self_id.into(),
            replicas,
            connect: Box::new(connect),
            topology: RwLock::new(Topology {
                ring: HashRing::new(replicas),
                getters: HashMap::with_hasher(RandomState::new()),
            }),
        }
    }

    /// Replace the peer set; `peers` should include this node's own id
    pub fn set<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ring = HashRing::new(self.replicas);
        let mut getters = HashMap::with_hasher(RandomState::new());

        for peer in peers {
            let peer = peer.into();
            if peer != self.self_id {
                getters.insert(peer.clone(), (self.connect)(&peer));
            }
            ring.add([peer]);
        }

        debug!(peers = ring.len(), "peer topology replaced");
        *self.topology.write() = Topology { ring, getters };
    }

    /// Drop one peer from the ring
    pub fn remove(&self, peer: &str) {
        let mut topology = self.topology.write();
        topology.ring.remove(peer);
        topology.getters.remove(peer);
    }

    /// Peer ids currently on the ring
    pub fn peers(&self) -> Vec<String> {
        self.topology.read().ring.peers().to_vec()
    }

    /// This node's own id
    pub fn self_id(&self) -> &str {
        &self.self_id
    }
}

impl PeerPicker for RingPicker {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let topology = self.topology.read();
        let peer = topology.ring.get(key)?;
        if peer == self.self_id {
            return None;
        }

        debug!(peer, key, "picked peer");
        topology.getters.get(peer).cloned()
    }
}
