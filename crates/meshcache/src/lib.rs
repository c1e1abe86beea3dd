//! # meshcache
//!
//! Namespaced read-through cache that can shard its keyspace across peers.
//!
//! ## Architecture
//! - **ByteView**: immutable cached value, copied on the way out
//! - **LruCache**: byte-budgeted LRU over a slab-backed linked list (AHash index)
//! - **CacheShard**: mutex-guarded, lazily built LRU store
//! - **HashRing**: consistent hashing with virtual nodes for peer selection
//! - **FlightGroup**: single-flight coalescing of concurrent misses
//! - **Group / Registry**: the lookup path tying it all together
//!
//! ## Lookup path
//! shard hit → done; miss → one coalesced load per key, served by the owning
//! peer if there is one, else by the local loader (which also fills the shard).
//!
//! ```
//! use meshcache::{BoxError, Registry};
//!
//! let registry = Registry::new();
//! let group = registry.create_group("scores", 2 << 10, |key: &str| {
//!     match key {
//!         "Tom" => Ok(b"630".to_vec()),
//!         _ => Err(BoxError::from(format!("{} not exist", key))),
//!     }
//! });
//!
//! assert_eq!(group.get("Tom").unwrap().as_str(), "630");
//! assert!(registry.get_group("scores").is_some());
//! ```

#![warn(missing_docs)]

mod byteview;
mod cache;
mod error;
mod flight;
mod group;
mod lru;
mod peers;
mod ring;
mod stats;

pub use byteview::ByteView;
pub use cache::CacheShard;
pub use error::{BoxError, Error, Result};
pub use flight::FlightGroup;
pub use group::{Group, Loader, Registry};
pub use lru::{ByteSize, EvictionCallback, LruCache};
pub use peers::{PeerGetter, PeerPicker, RingPicker};
pub use ring::{HashFn, HashRing, DEFAULT_REPLICAS};
pub use stats::GroupStats;
