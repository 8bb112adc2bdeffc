//! The store adapter contract.
//!
//! A [`Store`] is the only thing that touches the backing key-value service.
//! Keys arrive fully namespaced; values are opaque envelope bytes. The
//! [`CacheManager`](crate::CacheManager) picks one implementation at
//! construction time:
//!
//! - [`MemoryStore`](crate::MemoryStore): in-process, memcache-like.
//! - [`RemoteStore`](crate::RemoteStore): a pooled client for `pcache-server`.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreResult;

/// Primitive operations every backend must provide.
///
/// Implementations must be safe for concurrent use. `compare_and_swap`,
/// `set_if_absent` and `increment` must each be atomic at the store: a single
/// conditional operation, never a read followed by a separate write.
///
/// A `ttl` of `None` stores without expiry.
pub trait Store: Send + Sync + fmt::Debug {
    /// Read the raw bytes at `key`.
    fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Write `value` at `key` unconditionally.
    fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<()>;

    /// Write several keys with a shared TTL.
    ///
    /// The default writes them one by one; backends with a bulk primitive
    /// should override it.
    fn set_many(&self, entries: Vec<(String, Bytes)>, ttl: Option<Duration>) -> StoreResult<()> {
        for (key, value) in entries {
            self.set(&key, value, ttl)?;
        }
        Ok(())
    }

    /// Read several keys at once. Keys without a value are simply absent
    /// from the returned map.
    fn multi_get(&self, keys: &[String]) -> StoreResult<HashMap<String, Bytes>>;

    /// Delete `key`. Returns whether something was removed.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Write `value` only if `key` holds nothing. Returns whether it wrote.
    fn set_if_absent(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<bool>;

    /// Replace the value at `key` with `value` only if it currently equals
    /// `expected` byte for byte. An absent key never matches and is left
    /// absent. Returns whether the swap happened.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        value: Bytes,
        ttl: Option<Duration>,
    ) -> StoreResult<bool>;

    /// Atomically add `delta` to the integer envelope at `key` and return the
    /// new value. An absent key is initialised to `delta`.
    fn increment(&self, key: &str, delta: i64) -> StoreResult<i64>;

    /// Whether `key` currently holds a value.
    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Remove every key that belongs to `namespace`, i.e. starts with
    /// `namespace:`.
    ///
    /// Namespaces nest: flushing `a` also removes the keys of `a:b`, while
    /// flushing `a:b` leaves `a` alone.
    ///
    /// Backends without native namespace scoping may clear the whole store
    /// instead; such a backend must say so in its own documentation. Both
    /// bundled backends scope the flush.
    fn flush_namespace(&self, namespace: &str) -> StoreResult<()>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<()> {
        (**self).set(key, value, ttl)
    }

    fn set_many(&self, entries: Vec<(String, Bytes)>, ttl: Option<Duration>) -> StoreResult<()> {
        (**self).set_many(entries, ttl)
    }

    fn multi_get(&self, keys: &[String]) -> StoreResult<HashMap<String, Bytes>> {
        (**self).multi_get(keys)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        (**self).delete(key)
    }

    fn set_if_absent(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<bool> {
        (**self).set_if_absent(key, value, ttl)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        value: Bytes,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        (**self).compare_and_swap(key, expected, value, ttl)
    }

    fn increment(&self, key: &str, delta: i64) -> StoreResult<i64> {
        (**self).increment(key, delta)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        (**self).exists(key)
    }

    fn flush_namespace(&self, namespace: &str) -> StoreResult<()> {
        (**self).flush_namespace(namespace)
    }
}
