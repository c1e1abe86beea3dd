//! LRU (Least Recently Used) store with a byte budget
//!
//! Uses an intrusive linked list over a slab for O(1) eviction. Not safe for
//! concurrent access; see `CacheShard` for the locked wrapper.

use std::collections::HashMap;

use ahash::RandomState;
use tracing::trace;

/// Values stored in an `LruCache` report how many bytes they occupy
pub trait ByteSize {
    /// Size of the value in bytes
    fn byte_size(&self) -> usize;
}

impl ByteSize for Vec<u8> {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for String {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

/// Callback invoked with each entry removed by eviction
pub type EvictionCallback<V> = Box<dyn FnMut(String, V) + Send>;

/// Node in the LRU doubly-linked list
struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// LRU cache bounded by the total size of its keys and values
///
/// A capacity of 0 disables eviction.
pub struct LruCache<V> {
    map: HashMap<String, usize, RandomState>,
    nodes: Vec<Option<Node<V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    used_bytes: usize,
    capacity_bytes: usize,
    evictions: u64,
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V: ByteSize> LruCache<V> {
    /// Create a new LRU cache holding at most `capacity_bytes`
    pub fn new(capacity_bytes: usize) -> Self {
        Self::with_on_evicted(capacity_bytes, None)
    }

    /// Create a new LRU cache that reports evicted entries to `on_evicted`
    pub fn with_on_evicted(capacity_bytes: usize, on_evicted: Option<EvictionCallback<V>>) -> Self {
        Self {
            map: HashMap::with_hasher(RandomState::new()),
            nodes: Vec::new(),
            head: None,
            tail: None,
            free_list: Vec::new(),
            used_bytes: 0,
            capacity_bytes,
            evictions: 0,
            on_evicted,
        }
    }

    /// Get a value from the cache, marking it most recently used
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Insert or replace a value, then evict until within budget
    pub fn put(&mut self, key: String, value: V) {
        let value_size = value.byte_size();

        if let Some(&idx) = self.map.get(&key) {
            if let Some(node) = &mut self.nodes[idx] {
                self.used_bytes = self.used_bytes + value_size - node.value.byte_size();
                node.value = value;
            }
            self.move_to_front(idx);
        } else {
            let idx = self.alloc_node();
            self.used_bytes += key.len() + value_size;
            self.nodes[idx] = Some(Node {
                key: key.clone(),
                value,
                prev: None,
                next: self.head,
            });

            if let Some(head_idx) = self.head {
                if let Some(head) = &mut self.nodes[head_idx] {
                    head.prev = Some(idx);
                }
            }

            self.head = Some(idx);
            if self.tail.is_none() {
                self.tail = Some(idx);
            }

            self.map.insert(key, idx);
        }

        while self.capacity_bytes != 0 && self.used_bytes > self.capacity_bytes && self.tail.is_some() {
            self.remove_oldest();
        }
    }

    /// Evict the least recently used entry, if any
    pub fn remove_oldest(&mut self) {
        let Some(tail_idx) = self.tail else {
            return;
        };
        let Some((key, value)) = self.take(tail_idx) else {
            return;
        };

        self.evictions += 1;
        trace!(key = %key, used_bytes = self.used_bytes, "evicted");
        if let Some(on_evicted) = self.on_evicted.as_mut() {
            on_evicted(key, value);
        }
    }

    /// Remove a key from the cache without invoking the eviction callback
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let idx = *self.map.get(key)?;
        self.take(idx).map(|(_, value)| value)
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Bytes used by keys and values currently stored
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Configured byte budget (0 = unbounded)
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Number of entries evicted so far
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
        self.used_bytes = 0;
    }

    fn take(&mut self, idx: usize) -> Option<(String, V)> {
        self.unlink(idx);
        let node = self.nodes[idx].take()?;
        self.free_node(idx);
        self.map.remove(&node.key);
        self.used_bytes -= node.key.len() + node.value.byte_size();
        Some((node.key, node.value))
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }

        self.unlink(idx);

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = self.head;
        }

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match &self.nodes[idx] {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn free_node(&mut self, idx: usize) {
        self.free_list.push(idx);
    }

    /// Keys from most to least recently used
    #[cfg(test)]
    fn keys_by_recency(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = self.nodes[idx].as_ref().expect("linked node");
            keys.push(node.key.clone());
            cursor = node.next;
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn bytes(n: usize) -> Vec<u8> {
        vec![b'v'; n]
    }

    #[test]
    fn test_lru_basic() {
        let mut cache = LruCache::new(0);

        cache.put("key1".to_string(), b"1234".to_vec());

        assert_eq!(cache.get("key1"), Some(&b"1234".to_vec()));
        assert_eq!(cache.get("key2"), None);
        assert_eq!(cache.used_bytes(), 8);
    }

    #[test]
    fn test_lru_byte_budget_eviction() {
        let mut cache = LruCache::new(10);

        cache.put("k1".to_string(), bytes(4));
        cache.put("k2".to_string(), bytes(4)); // 12 bytes > 10, evicts k1

        assert_eq!(cache.get("k1"), None);
        assert!(cache.get("k2").is_some());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_bytes(), 6);
        assert_eq!(cache.evictions(), 1);
    }

    #[test]
    fn test_lru_get_refreshes_recency() {
        let (k1, k2, k3) = ("key1", "key2", "k3");
        let capacity = k1.len() + k2.len() + 2 * 6;
        let mut cache = LruCache::new(capacity);

        cache.put(k1.to_string(), bytes(6));
        cache.put(k2.to_string(), bytes(6));
        cache.get(k1); // key2 is now the oldest
        cache.put(k3.to_string(), bytes(6));

        assert!(cache.get(k1).is_some());
        assert_eq!(cache.get(k2), None);
        assert!(cache.get(k3).is_some());
    }

    #[test]
    fn test_lru_update_adjusts_size() {
        let mut cache = LruCache::new(0);

        cache.put("a".to_string(), bytes(10));
        cache.put("b".to_string(), bytes(1));
        cache.put("a".to_string(), bytes(3));

        assert_eq!(cache.used_bytes(), 1 + 3 + 1 + 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys_by_recency(), vec!["a", "b"]);
    }

    #[test]
    fn test_lru_update_can_trigger_eviction() {
        let mut cache = LruCache::new(8);

        cache.put("a".to_string(), bytes(2));
        cache.put("b".to_string(), bytes(2));
        cache.put("a".to_string(), bytes(5)); // 6 + 3 > 8, evicts b

        assert_eq!(cache.keys_by_recency(), vec!["a"]);
        assert_eq!(cache.used_bytes(), 6);
    }

    #[test]
    fn test_lru_oversized_entry_evicts_itself() {
        let mut cache = LruCache::new(4);

        cache.put("a".to_string(), bytes(1));
        cache.put("big".to_string(), bytes(8));

        assert!(cache.is_empty());
        assert_eq!(cache.used_bytes(), 0);
        assert_eq!(cache.evictions(), 2);
    }

    #[test]
    fn test_lru_zero_capacity_is_unbounded() {
        let mut cache = LruCache::new(0);

        for i in 0..1000 {
            cache.put(format!("key{}", i), bytes(64));
        }

        assert_eq!(cache.len(), 1000);
        assert_eq!(cache.evictions(), 0);
    }

    #[test]
    fn test_lru_eviction_callback() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let callback: EvictionCallback<String> = Box::new(move |key, value| {
            sink.lock().unwrap().push((key, value));
        });
        let mut cache = LruCache::with_on_evicted(10, Some(callback));

        cache.put("key1".to_string(), "123456".to_string());
        cache.put("k2".to_string(), "k2".to_string());
        cache.put("k3".to_string(), "k3".to_string());
        cache.put("k4".to_string(), "k4".to_string());

        let evicted = evicted.lock().unwrap();
        assert_eq!(
            *evicted,
            vec![
                ("key1".to_string(), "123456".to_string()),
                ("k2".to_string(), "k2".to_string()),
            ]
        );
    }

    #[test]
    fn test_lru_remove_oldest_on_empty() {
        let mut cache: LruCache<Vec<u8>> = LruCache::new(10);
        cache.remove_oldest();
        assert!(cache.is_empty());
        assert_eq!(cache.evictions(), 0);
    }

    #[test]
    fn test_lru_remove() {
        let mut cache = LruCache::new(0);

        cache.put("a".to_string(), bytes(1));
        cache.put("b".to_string(), bytes(2));
        cache.put("c".to_string(), bytes(3));

        assert_eq!(cache.remove("b"), Some(bytes(2)));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.used_bytes(), 2 + 4);
        assert_eq!(cache.keys_by_recency(), vec!["c", "a"]);
        assert_eq!(cache.evictions(), 0);
    }

    #[test]
    fn test_lru_clear() {
        let mut cache = LruCache::new(0);

        cache.put("a".to_string(), bytes(1));
        cache.put("b".to_string(), bytes(2));
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.used_bytes(), 0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Put(u8, usize),
            Get(u8),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..12, 0usize..16).prop_map(|(k, n)| Op::Put(k, n)),
                (0u8..12).prop_map(Op::Get),
            ]
        }

        fn live_bytes(cache: &LruCache<Vec<u8>>) -> usize {
            cache
                .nodes
                .iter()
                .flatten()
                .map(|node| node.key.len() + node.value.len())
                .sum()
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn used_bytes_tracks_live_entries(
                capacity in 0usize..64,
                ops in prop::collection::vec(op_strategy(), 1..200),
            ) {
                let mut cache = LruCache::new(capacity);

                for op in ops {
                    match op {
                        Op::Put(k, n) => cache.put(format!("key{}", k), vec![0u8; n]),
                        Op::Get(k) => {
                            cache.get(&format!("key{}", k));
                        }
                    }

                    prop_assert_eq!(cache.used_bytes(), live_bytes(&cache));
                    prop_assert_eq!(cache.keys_by_recency().len(), cache.len());
                    if capacity > 0 {
                        prop_assert!(cache.used_bytes() <= capacity);
                    }
                }
            }

            #[test]
            fn accessed_key_is_most_recent(
                keys in prop::collection::vec(0u8..8, 1..20),
                pick in any::<prop::sample::Index>(),
            ) {
                let mut cache = LruCache::new(0);
                for k in &keys {
                    cache.put(format!("key{}", k), vec![1u8; 3]);
                }

                let target = format!("key{}", keys[pick.index(keys.len())]);
                prop_assert!(cache.get(&target).is_some());
                prop_assert_eq!(&cache.keys_by_recency()[0], &target);
            }
        }
    }
}
