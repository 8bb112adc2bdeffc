//! Optimistic concurrency on single keys.
//!
//! A [`SafeValue`] remembers the exact bytes it was read from. A later
//! [`CacheManager::safe_put`] only writes if the key still holds those bytes,
//! which is checked by one compare-and-swap at the store. Two writers racing
//! from the same snapshot cannot both win.

use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::non_zero;
use crate::envelope::Envelope;
use crate::error::CacheResult;
use crate::manager::{convert, decode_entry, CacheManager};
use crate::value::{FromValue, ToValue, Value};

/// A snapshot of a cached value plus the raw bytes it was decoded from.
///
/// Snapshots do not own the key; holding one blocks nobody.
#[derive(Debug, Clone, PartialEq)]
pub struct SafeValue {
    value: Value,
    raw: Bytes,
}

impl SafeValue {
    /// The value observed when the snapshot was taken.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// The observed value converted to `T`, or `None` on a type mismatch.
    pub fn get<T: FromValue>(&self) -> Option<T> {
        T::from_value(self.value.clone())
    }

    pub(crate) fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl CacheManager {
    /// Take a snapshot of the value at `key` for a later [`safe_put`].
    ///
    /// Returns `None` when the key is absent or unreadable, or the store
    /// fails.
    ///
    /// [`safe_put`]: CacheManager::safe_put
    pub fn get_safe_value(&self, key: &str) -> Option<SafeValue> {
        let key = self.full_key(key);
        let raw = match self.store().get(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %key, error = %err, "safe value read failed, treating as miss");
                return None;
            }
        };
        let value = decode_entry(&key, &raw)?;
        Some(SafeValue { value, raw })
    }

    /// Read a snapshot and convert it in one go.
    pub fn get_safe<T: FromValue>(&self, key: &str) -> Option<(T, SafeValue)> {
        let snapshot = self.get_safe_value(key)?;
        let value = convert(&self.full_key(key), snapshot.value.clone())?;
        Some((value, snapshot))
    }

    /// Replace the value at `key` with `value` if it still holds what
    /// `snapshot` observed. Uses the safe-put TTL from the configuration.
    ///
    /// Returns `false` without writing when the value changed, or when the
    /// key has since disappeared.
    ///
    /// ```
    /// use pcache::{CacheConfig, CacheManager, MemoryStore};
    ///
    /// let cache = CacheManager::new(MemoryStore::default(), CacheConfig::default());
    /// cache.put("balance", 100_i64).unwrap();
    ///
    /// let first = cache.get_safe_value("balance").unwrap();
    /// let second = cache.get_safe_value("balance").unwrap();
    ///
    /// assert!(cache.safe_put("balance", &first, 90_i64).unwrap());
    /// assert!(!cache.safe_put("balance", &second, 80_i64).unwrap());
    /// assert_eq!(cache.get::<i64>("balance"), Some(90));
    /// ```
    pub fn safe_put<V: ToValue>(
        &self,
        key: &str,
        snapshot: &SafeValue,
        value: V,
    ) -> CacheResult<bool> {
        self.compare_and_put(key, snapshot, &value, self.config().get_safe_put_ttl())
    }

    /// Like [`safe_put`](CacheManager::safe_put) with an explicit TTL. A zero
    /// TTL stores without expiry.
    pub fn safe_put_with_ttl<V: ToValue>(
        &self,
        key: &str,
        snapshot: &SafeValue,
        value: V,
        ttl: impl Into<Duration>,
    ) -> CacheResult<bool> {
        self.compare_and_put(key, snapshot, &value, non_zero(ttl.into()))
    }

    pub(crate) fn compare_and_put<V: ToValue + ?Sized>(
        &self,
        key: &str,
        snapshot: &SafeValue,
        value: &V,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let key = self.full_key(key);
        let raw = Envelope::encode(value)?.to_bytes();
        let swapped = self
            .store()
            .compare_and_swap(key.as_str(), snapshot.raw(), raw, ttl)?;
        debug!(key = %key, swapped, "cache safe_put");
        Ok(swapped)
    }
}
