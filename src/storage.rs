//! In-process store backend.
//!
//! Entries live in an `IndexMap` whose order doubles as the LRU order: reads
//! move an entry to the back, eviction pops from the front. Every [`Store`]
//! operation runs under a single lock acquisition, which is what makes the
//! conditional writes atomic.

use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::config::StoreConfig;
use crate::entry::Entry;
use crate::envelope;
use crate::error::{StoreError, StoreResult};
use crate::stats::{CacheStats, StatsSnapshot};
use crate::store::Store;

type Entries = IndexMap<String, Entry>;

/// A thread-safe, memcache-like store kept in process memory.
///
/// ```
/// use pcache::{CacheManager, CacheConfig, MemoryStore};
///
/// let cache = CacheManager::new(MemoryStore::default(), CacheConfig::default());
/// cache.put("greeting", "hello").unwrap();
/// assert_eq!(cache.get::<String>("greeting").as_deref(), Some("hello"));
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    /// The actual storage, protected by a read-write lock.
    entries: RwLock<Entries>,

    config: StoreConfig,

    stats: Arc<CacheStats>,
}

impl MemoryStore {
    /// Create a new store with the given configuration.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            config,
            stats: Arc::new(CacheStats::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.read_lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining TTL of a live entry. `Some(None)` means it never expires.
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let entries = self.read_lock().ok()?;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(Entry::remaining_ttl)
    }

    /// Keys currently stored, in LRU order (least recently used first).
    pub fn keys(&self) -> Vec<String> {
        self.read_lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.write_lock() {
            entries.clear();
            self.stats.set_size(0);
        }
    }

    /// Shared handle to the live counters.
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Remove all expired entries. Returns how many were removed.
    ///
    /// The server calls this periodically; lazy expiration on access works
    /// without it.
    pub fn cleanup_expired(&self) -> usize {
        let Ok(mut entries) = self.write_lock() else {
            return 0;
        };

        let initial_len = entries.len();
        let now = Instant::now();

        entries.retain(|_, entry| {
            let expired = entry.is_expired_at(now);
            if expired {
                self.stats.record_expiration();
            }
            !expired
        });

        self.stats.set_size(entries.len() as u64);
        initial_len - entries.len()
    }

    fn read_lock(&self) -> StoreResult<RwLockReadGuard<'_, Entries>> {
        self.entries
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write_lock(&self) -> StoreResult<RwLockWriteGuard<'_, Entries>> {
        self.entries
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Look up a live entry, dropping it first if it has expired.
    fn live<'a>(&self, entries: &'a mut Entries, key: &str) -> Option<&'a mut Entry> {
        let expired = entries.get(key)?.is_expired();
        if expired {
            entries.shift_remove(key);
            self.stats.record_expiration();
            self.stats.set_size(entries.len() as u64);
            return None;
        }
        entries.get_mut(key)
    }

    /// Read a live entry and mark it most recently used.
    fn read_and_touch(&self, entries: &mut Entries, key: &str) -> Option<Bytes> {
        let value = match self.live(entries, key) {
            Some(entry) => entry.value.clone(),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if let Some(idx) = entries.get_index_of(key) {
            let last = entries.len() - 1;
            entries.move_index(idx, last);
        }
        self.stats.record_hit();
        Some(value)
    }

    /// Insert or replace, evicting the LRU entry when a new key would
    /// exceed the capacity.
    fn insert(&self, entries: &mut Entries, key: String, entry: Entry) {
        if let Some(max_capacity) = self.config.max_capacity {
            if !entries.contains_key(&key) {
                while entries.len() >= max_capacity {
                    if entries.shift_remove_index(0).is_none() {
                        break;
                    }
                    self.stats.record_eviction();
                }
            }
        }

        // Re-inserting moves the key to the most recently used end.
        entries.shift_remove(&key);
        entries.insert(key, entry);
        self.stats.record_set();
        self.stats.set_size(entries.len() as u64);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let mut entries = self.write_lock()?;
        Ok(self.read_and_touch(&mut entries, key))
    }

    fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<()> {
        let mut entries = self.write_lock()?;
        self.insert(&mut entries, key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    fn set_many(&self, items: Vec<(String, Bytes)>, ttl: Option<Duration>) -> StoreResult<()> {
        let mut entries = self.write_lock()?;
        for (key, value) in items {
            self.insert(&mut entries, key, Entry::new(value, ttl));
        }
        Ok(())
    }

    fn multi_get(&self, keys: &[String]) -> StoreResult<HashMap<String, Bytes>> {
        let mut entries = self.write_lock()?;
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.read_and_touch(&mut entries, key) {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.write_lock()?;
        let existed = entries.shift_remove(key).is_some();
        if existed {
            self.stats.record_delete();
            self.stats.set_size(entries.len() as u64);
        }
        Ok(existed)
    }

    fn set_if_absent(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<bool> {
        let mut entries = self.write_lock()?;
        if self.live(&mut entries, key).is_some() {
            return Ok(false);
        }
        self.insert(&mut entries, key.to_string(), Entry::new(value, ttl));
        Ok(true)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        value: Bytes,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let mut entries = self.write_lock()?;
        let swapped = match self.live(&mut entries, key) {
            Some(entry) if entry.holds(expected) => {
                *entry = Entry::new(value, ttl);
                true
            }
            _ => false,
        };
        self.stats.record_cas(swapped);
        if swapped {
            self.stats.record_set();
        }
        Ok(swapped)
    }

    fn increment(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut entries = self.write_lock()?;
        match self.live(&mut entries, key) {
            Some(entry) => {
                let (next, raw) = envelope::increment(key, Some(entry.value().as_ref()), delta)?;
                *entry = entry.with_value_keeping_expiry(raw);
                Ok(next)
            }
            None => {
                let (next, raw) = envelope::increment(key, None, delta)?;
                self.insert(&mut entries, key.to_string(), Entry::new(raw, None));
                Ok(next)
            }
        }
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.write_lock()?;
        Ok(self.live(&mut entries, key).is_some())
    }

    fn flush_namespace(&self, namespace: &str) -> StoreResult<()> {
        let prefix = format!("{}:", namespace);
        let mut entries = self.write_lock()?;
        entries.retain(|key, _| !key.starts_with(&prefix));
        self.stats.set_size(entries.len() as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[test]
    fn test_basic_set_get() {
        let store = MemoryStore::default();

        store.set("key1", bytes("value1"), None).unwrap();
        assert_eq!(store.get("key1").unwrap(), Some(bytes("value1")));
        assert_eq!(store.get("nonexistent").unwrap(), None);
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::default();

        store.set("key1", bytes("value1"), None).unwrap();
        assert!(store.delete("key1").unwrap());
        assert!(!store.exists("key1").unwrap());
        assert!(!store.delete("key1").unwrap());
    }

    #[test]
    fn test_overwrite() {
        let store = MemoryStore::default();

        store.set("key1", bytes("value1"), None).unwrap();
        store.set("key1", bytes("value2"), None).unwrap();

        assert_eq!(store.get("key1").unwrap(), Some(bytes("value2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_lru_eviction_order() {
        let store = MemoryStore::new(StoreConfig::new().max_capacity(3).build());

        store.set("key1", bytes("value1"), None).unwrap();
        store.set("key2", bytes("value2"), None).unwrap();
        store.set("key3", bytes("value3"), None).unwrap();

        // Access key1, making it recently used
        let _ = store.get("key1").unwrap();

        store.set("key4", bytes("value4"), None).unwrap();

        assert!(store.exists("key1").unwrap());
        assert!(!store.exists("key2").unwrap());
        assert!(store.exists("key3").unwrap());
        assert!(store.exists("key4").unwrap());
        assert_eq!(store.stats().evictions(), 1);
    }

    #[test]
    fn test_ttl_expiration() {
        let store = MemoryStore::default();

        store
            .set("key1", bytes("value1"), Some(Duration::from_millis(1)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(10));

        assert!(store.get("key1").unwrap().is_none());
        assert_eq!(store.stats().expirations(), 1);
    }

    #[test]
    fn test_set_if_absent() {
        let store = MemoryStore::default();

        assert!(store.set_if_absent("lock", bytes("1"), None).unwrap());
        assert!(!store.set_if_absent("lock", bytes("2"), None).unwrap());
        assert_eq!(store.get("lock").unwrap(), Some(bytes("1")));
    }

    #[test]
    fn test_set_if_absent_replaces_expired_entry() {
        let store = MemoryStore::default();

        store
            .set("lock", bytes("1"), Some(Duration::from_millis(1)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(10));

        assert!(store.set_if_absent("lock", bytes("2"), None).unwrap());
    }

    #[test]
    fn test_compare_and_swap() {
        let store = MemoryStore::default();
        store.set("k", bytes("old"), None).unwrap();

        assert!(!store.compare_and_swap("k", b"other", bytes("new"), None).unwrap());
        assert!(store.compare_and_swap("k", b"old", bytes("new"), None).unwrap());
        assert!(!store.compare_and_swap("k", b"old", bytes("newer"), None).unwrap());
        assert_eq!(store.get("k").unwrap(), Some(bytes("new")));

        let stats = store.stats_snapshot();
        assert_eq!(stats.cas_successes, 1);
        assert_eq!(stats.cas_failures, 2);
    }

    #[test]
    fn test_compare_and_swap_on_absent_key_does_not_write() {
        let store = MemoryStore::default();

        assert!(!store.compare_and_swap("k", b"old", bytes("new"), None).unwrap());
        assert!(!store.exists("k").unwrap());
    }

    #[test]
    fn test_compare_and_swap_sets_new_ttl() {
        let store = MemoryStore::default();
        store.set("k", bytes("old"), None).unwrap();

        store
            .compare_and_swap("k", b"old", bytes("new"), Some(Duration::from_secs(10)))
            .unwrap();

        let ttl = store.ttl("k").unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(10));
    }

    #[test]
    fn test_multi_get_is_partial() {
        let store = MemoryStore::default();
        store.set("a", bytes("1"), None).unwrap();

        let found = store
            .multi_get(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.get("a"), Some(&bytes("1")));
    }

    #[test]
    fn test_increment_keeps_expiry() {
        let store = MemoryStore::default();
        assert_eq!(store.increment("n", 5).unwrap(), 5);
        assert_eq!(store.ttl("n"), Some(None));

        assert_eq!(store.increment("n", 2).unwrap(), 7);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_increment_rejects_garbage() {
        let store = MemoryStore::default();
        store.set("n", bytes("not an envelope"), None).unwrap();
        assert!(matches!(store.increment("n", 1), Err(StoreError::NotAnInteger(_))));
    }

    #[test]
    fn test_flush_namespace_is_scoped() {
        let store = MemoryStore::default();
        store.set("a:1", bytes("x"), None).unwrap();
        store.set("a:2", bytes("x"), None).unwrap();
        store.set("ab:1", bytes("x"), None).unwrap();
        store.set("b:1", bytes("x"), None).unwrap();

        store.flush_namespace("a").unwrap();

        assert_eq!(store.keys(), vec!["ab:1".to_string(), "b:1".to_string()]);
        assert_eq!(store.stats().size(), 2);
    }

    #[test]
    fn test_flush_namespace_covers_nested_namespaces() {
        let store = MemoryStore::default();
        store.set("a:k", bytes("x"), None).unwrap();
        store.set("a:b:k", bytes("x"), None).unwrap();

        store.flush_namespace("a:b").unwrap();
        assert_eq!(store.keys(), vec!["a:k".to_string()]);

        store.set("a:b:k", bytes("x"), None).unwrap();
        store.flush_namespace("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_cleanup_expired() {
        let store = MemoryStore::default();
        store
            .set("short", bytes("x"), Some(Duration::from_millis(1)))
            .unwrap();
        store.set("long", bytes("x"), None).unwrap();
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
