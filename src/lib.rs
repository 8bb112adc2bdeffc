//! # pcache
//!
//! A namespaced, typed cache client that works the same over any key-value
//! store backend.
//!
//! ## Features
//!
//! - **Typed values**: every value is stored with a flag recording its type,
//!   so an `i64` comes back as an `i64` and never as text
//! - **Safe values**: optimistic concurrency with compare-and-swap snapshots
//! - **Locks**: a non-blocking [`KeyLock`] and a retrying [`Lock`], both built
//!   only from store primitives
//! - **Batch reads**: [`CacheManager::get_all`] sorts keys into typed hits
//!   and misses in one round trip
//! - **Backends**: an in-process [`MemoryStore`] with TTL and LRU eviction,
//!   and a [`RemoteStore`] talking to `pcache-server`
//!
//! ## Quick Start
//!
//! ```rust
//! use pcache::{CacheConfig, CacheManager, MemoryStore};
//! use std::time::Duration;
//!
//! let config = CacheConfig::new()
//!     .namespace("users")
//!     .default_ttl(Duration::from_secs(300))
//!     .build();
//!
//! let cache = CacheManager::new(MemoryStore::default(), config);
//!
//! cache.put("123", "Alice").unwrap();
//! if let Some(name) = cache.get::<String>("123") {
//!     println!("Found: {}", name);
//! }
//!
//! // Update only if nobody else changed it in between.
//! let snapshot = cache.get_safe_value("123").unwrap();
//! assert!(cache.safe_put("123", &snapshot, "Alicia").unwrap());
//! ```
//!
//! ## Thread Safety
//!
//! The manager is safe to share across threads. Cloning a `CacheManager`
//! creates a new handle to the same store:
//!
//! ```rust
//! use pcache::{CacheConfig, CacheManager, MemoryStore};
//! use std::thread;
//!
//! let cache = CacheManager::new(MemoryStore::default(), CacheConfig::default());
//!
//! let handles: Vec<_> = (0..4).map(|i| {
//!     let cache = cache.clone();
//!     thread::spawn(move || {
//!         cache.increment("counter", i).unwrap();
//!     })
//! }).collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(cache.get::<i64>("counter"), Some(6));
//! ```

pub mod batch;
pub mod cached;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod lock;
pub mod manager;
pub mod namespace;
pub mod safe_value;
pub mod stats;
pub mod store;
pub mod value;

pub use batch::{MatchResult, MissedHitsProvider};
pub use cached::{cached, CacheTime, KeyTemplate, DEFAULT_CACHE_TIME};
pub use codec::Flag;
pub use config::{CacheConfig, StoreConfig};
pub use envelope::Envelope;
pub use error::{CacheError, CacheResult, StoreError, StoreResult};
pub use lock::{KeyLock, Lock};
pub use manager::CacheManager;
pub use namespace::{CacheKey, NamespaceProvider, StaticNamespace};
pub use safe_value::SafeValue;
pub use stats::{CacheStats, StatsSnapshot};
pub use store::Store;
pub use value::{FromValue, Object, ToValue, Value};

// Backends
pub(crate) mod entry;
pub mod remote;
pub mod storage;

pub use remote::RemoteStore;
pub use storage::MemoryStore;

// Wire protocol and server, used by the binaries
pub mod cli;
pub mod command;
pub mod connection;
pub mod frame;
pub mod server;

pub use cli::{Cli, ClientCommand, ServerArgs};
pub use command::Command;
pub use frame::{Frame, FrameError};
