//! Cache namespaces and the registry that owns them

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use ahash::RandomState;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::byteview::ByteView;
use crate::cache::CacheShard;
use crate::error::{BoxError, Error, Result};
use crate::flight::FlightGroup;
use crate::peers::{PeerGetter, PeerPicker};
use crate::stats::GroupStats;

/// Loads the source value for a key on a full cache miss
pub trait Loader: Send + Sync {
    /// Produce the bytes for `key`
    fn load(&self, key: &str) -> std::result::Result<Vec<u8>, BoxError>;
}

impl<F, E> Loader for F
where
    F: Fn(&str) -> std::result::Result<Vec<u8>, E> + Send + Sync,
    E: Into<BoxError>,
{
    fn load(&self, key: &str) -> std::result::Result<Vec<u8>, BoxError> {
        self(key).map_err(Into::into)
    }
}

/// A named cache namespace
///
/// Lookups check the local shard first. Misses are coalesced per key and
/// served by the owning peer when one is registered, falling back to the
/// local loader.
pub struct Group {
    name: String,
    loader: Box<dyn Loader>,
    main_cache: CacheShard,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    flights: FlightGroup<ByteView>,
    stats: GroupStats,
}

impl Group {
    /// Create a standalone group; most callers go through `Registry::create_group`
    pub fn new(name: impl Into<String>, capacity_bytes: usize, loader: impl Loader + 'static) -> Self {
        Self {
            name: name.into(),
            loader: Box::new(loader),
            main_cache: CacheShard::new(capacity_bytes),
            peers: OnceLock::new(),
            flights: FlightGroup::new(),
            stats: GroupStats::new(),
        }
    }

    /// Get the value for `key`
    ///
    /// # Errors
    /// * `Error::InvalidKey` - `key` is empty
    /// * `Error::Loader` - the local loader failed (after any peer fallback)
    pub fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::InvalidKey);
        }

        self.stats.record_get();
        if let Some(value) = self.main_cache.get(key) {
            self.stats.record_hit();
            debug!(group = %self.name, key, "cache hit");
            return Ok(value);
        }

        self.load(key)
    }

    /// Register the picker used to route keys to peers
    ///
    /// # Errors
    /// * `Error::DuplicateRegistration` - a picker is already registered
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers
            .set(peers)
            .map_err(|_| Error::DuplicateRegistration(self.name.clone()))
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lookup statistics
    pub fn stats(&self) -> &GroupStats {
        &self.stats
    }

    /// Number of entries in the local shard
    pub fn cache_len(&self) -> usize {
        self.main_cache.len()
    }

    /// Bytes held by the local shard
    pub fn cache_bytes(&self) -> usize {
        self.main_cache.used_bytes()
    }

    /// Entries evicted from the local shard
    pub fn cache_evictions(&self) -> u64 {
        self.main_cache.evictions()
    }

    /// Configured byte budget of the local shard
    pub fn capacity_bytes(&self) -> usize {
        self.main_cache.capacity_bytes()
    }

    fn load(&self, key: &str) -> Result<ByteView> {
        self.flights.execute(key, || {
            self.stats.record_load();

            if let Some(peer) = self.peers.get().and_then(|picker| picker.pick_peer(key)) {
                match self.get_from_peer(peer.as_ref(), key) {
                    Ok(value) => {
                        self.stats.record_peer_load();
                        return Ok(value);
                    }
                    Err(e) => {
                        self.stats.record_peer_error();
                        warn!(group = %self.name, key, error = %e, "failed to get from peer");
                    }
                }
            }

            self.get_locally(key)
        })
    }

    fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = match self.loader.load(key) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.record_local_load_error();
                return Err(Error::loader(e));
            }
        };

        self.stats.record_local_load();
        debug!(group = %self.name, key, len = bytes.len(), "loaded locally");

        let value = ByteView::copy_from(&bytes);
        self.main_cache.add(key, value.clone());
        Ok(value)
    }

    // Peer-served values stay out of the local shard; the owning peer caches them.
    fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        peer.get(&self.name, key).map(ByteView::from)
    }
}

/// Process-wide table of groups, keyed by name
#[derive(Default)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>, RandomState>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group and store it under `name`, replacing any previous one
    pub fn create_group(
        &self,
        name: impl Into<String>,
        capacity_bytes: usize,
        loader: impl Loader + 'static,
    ) -> Arc<Group> {
        let name = name.into();
        let group = Arc::new(Group::new(name.clone(), capacity_bytes, loader));

        let mut groups = self.groups.write();
        if groups.insert(name.clone(), Arc::clone(&group)).is_some() {
            debug!(group = %name, "group replaced");
        }

        group
    }

    /// Look up a group created earlier
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Names of all registered groups
    pub fn group_names(&self) -> Vec<String> {
        self.groups.read().keys().cloned().collect()
    }
}
