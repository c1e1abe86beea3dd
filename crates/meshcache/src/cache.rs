//! Mutex-guarded cache shard with a lazily built LRU store

use parking_lot::Mutex;

use crate::byteview::ByteView;
use crate::lru::LruCache;

/// Concurrency-safe wrapper around one group's LRU store
///
/// The store is only allocated on the first `add`, so groups that never
/// populate their cache (for example, ones that are always served by peers)
/// cost nothing.
pub struct CacheShard {
    lru: Mutex<Option<LruCache<ByteView>>>,
    capacity_bytes: usize,
}

impl CacheShard {
    /// Create an empty shard with the given byte budget (0 = unbounded)
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            lru: Mutex::new(None),
            capacity_bytes,
        }
    }

    /// Insert a value, building the store on first use
    pub fn add(&self, key: &str, value: ByteView) {
        let mut lru = self.lru.lock();
        lru.get_or_insert_with(|| LruCache::new(self.capacity_bytes))
            .put(key.to_string(), value);
    }

    /// Look up a value, refreshing its recency on hit
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let mut lru = self.lru.lock();
        lru.as_mut()?.get(key).cloned()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.lru.lock().as_ref().map_or(0, |lru| lru.len())
    }

    /// Check if the shard holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes used by cached keys and values
    pub fn used_bytes(&self) -> usize {
        self.lru.lock().as_ref().map_or(0, |lru| lru.used_bytes())
    }

    /// Entries evicted since the store was built
    pub fn evictions(&self) -> u64 {
        self.lru.lock().as_ref().map_or(0, |lru| lru.evictions())
    }

    /// Configured byte budget
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Whether the underlying store has been built yet
    #[cfg(test)]
    fn is_initialized(&self) -> bool {
        self.lru.lock().is_some()
    }
}
