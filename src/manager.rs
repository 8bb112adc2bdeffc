//! The main cache interface.
//!
//! [`CacheManager`] is what callers talk to. It prefixes keys with the current
//! namespace, turns values into envelopes and hands raw bytes to the
//! configured [`Store`]. It holds no mutable state of its own, so clones are
//! cheap handles to the same store.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{non_zero, CacheConfig};
use crate::envelope::Envelope;
use crate::error::CacheResult;
use crate::namespace::{CacheKey, NamespaceProvider, StaticNamespace};
use crate::store::Store;
use crate::value::{FromValue, ToValue, Value};

/// A namespaced, typed cache over any [`Store`] backend.
///
/// Read operations never fail: a store error, an unreadable entry or a value
/// of another type all come back as a miss. Write operations report errors.
///
/// # Example
/// ```
/// use pcache::{CacheConfig, CacheManager, MemoryStore};
/// use std::time::Duration;
///
/// let config = CacheConfig::new().namespace("users").build();
/// let cache = CacheManager::new(MemoryStore::default(), config);
///
/// cache.put("123", "Alice").unwrap();
/// assert_eq!(cache.get::<String>("123").as_deref(), Some("Alice"));
///
/// // Stored as i64, so it does not read back as text.
/// cache.put_with_ttl("visits", 7_i64, Duration::from_secs(60)).unwrap();
/// assert_eq!(cache.get::<i64>("visits"), Some(7));
/// assert_eq!(cache.get::<String>("visits"), None);
/// ```
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn Store>,
    namespace: Arc<dyn NamespaceProvider>,
    config: CacheConfig,
}

impl CacheManager {
    /// Create a manager over `store`.
    pub fn new(store: impl Store + 'static, config: CacheConfig) -> Self {
        Self::from_shared(Arc::new(store), config)
    }

    /// Create a manager over a store that is shared with other owners.
    pub fn from_shared(store: Arc<dyn Store>, config: CacheConfig) -> Self {
        let namespace = Arc::new(StaticNamespace::new(config.get_namespace()));
        Self {
            store,
            namespace,
            config,
        }
    }

    /// Resolve the namespace through `provider` instead of the configured one.
    ///
    /// ```
    /// use pcache::{CacheConfig, CacheManager, MemoryStore};
    ///
    /// let cache = CacheManager::new(MemoryStore::default(), CacheConfig::default())
    ///     .with_namespace_provider(|| "tenant-7".to_string());
    /// assert_eq!(cache.namespace(), "tenant-7");
    /// ```
    pub fn with_namespace_provider(mut self, provider: impl NamespaceProvider + 'static) -> Self {
        self.namespace = Arc::new(provider);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The namespace applied to keys right now.
    pub fn namespace(&self) -> String {
        self.namespace.namespace()
    }

    /// The key as it is written to the store.
    pub fn full_key(&self, key: &str) -> CacheKey {
        CacheKey::new(&self.namespace(), key)
    }

    /// Store `value` under `key` with the default TTL.
    pub fn put<V: ToValue>(&self, key: &str, value: V) -> CacheResult<()> {
        self.write(key, &value, self.config.default_ttl)
    }

    /// Store `value` under `key`, expiring after `ttl`.
    ///
    /// A zero `ttl` stores the value without expiry.
    pub fn put_with_ttl<V: ToValue>(
        &self,
        key: &str,
        value: V,
        ttl: impl Into<Duration>,
    ) -> CacheResult<()> {
        self.write(key, &value, non_zero(ttl.into()))
    }

    /// Store several values with one TTL.
    ///
    /// Every value is encoded before anything is written, so a value that
    /// cannot be serialized aborts the whole batch.
    pub fn put_all<I, K, V>(&self, entries: I, ttl: impl Into<Duration>) -> CacheResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToValue,
    {
        let items = entries
            .into_iter()
            .map(|(key, value)| {
                let raw = Envelope::encode(&value)?.to_bytes();
                Ok((self.full_key(key.as_ref()).into_string(), raw))
            })
            .collect::<CacheResult<Vec<_>>>()?;

        debug!(count = items.len(), "cache put_all");
        self.store.set_many(items, non_zero(ttl.into()))?;
        Ok(())
    }

    /// Store `value` only if `key` holds nothing. Returns whether it wrote.
    pub fn put_if_absent<V: ToValue>(
        &self,
        key: &str,
        value: V,
        ttl: impl Into<Duration>,
    ) -> CacheResult<bool> {
        let key = self.full_key(key);
        let raw = Envelope::encode(&value)?.to_bytes();
        let written = self
            .store
            .set_if_absent(key.as_str(), raw, non_zero(ttl.into()))?;
        debug!(key = %key, written, "cache put_if_absent");
        Ok(written)
    }

    /// Read the value at `key` as a `T`.
    ///
    /// Returns `None` when the key is absent, the stored bytes cannot be read,
    /// the value has another type, or the store fails.
    pub fn get<T: FromValue>(&self, key: &str) -> Option<T> {
        let key = self.full_key(key);
        let raw = match self.store.get(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "cache miss");
                return None;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };

        let value = decode_entry(&key, &raw)?;
        convert(&key, value)
    }

    /// Remove `key`. Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> CacheResult<()> {
        let key = self.full_key(key);
        let removed = self.store.delete(key.as_str())?;
        debug!(key = %key, removed, "cache remove");
        Ok(())
    }

    /// Atomically add `delta` to the integer at `key` and return the result.
    ///
    /// An absent key starts at `delta`.
    pub fn increment(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let key = self.full_key(key);
        let value = self.store.increment(key.as_str(), delta)?;
        debug!(key = %key, delta, value, "cache increment");
        Ok(value)
    }

    /// Whether `key` holds a value. A failing store reads as `false`.
    pub fn contains(&self, key: &str) -> bool {
        let key = self.full_key(key);
        match self.store.exists(key.as_str()) {
            Ok(found) => found,
            Err(err) => {
                warn!(key = %key, error = %err, "cache exists check failed");
                false
            }
        }
    }

    /// Remove every entry in the current namespace.
    ///
    /// Entries of namespaces nested under this one (`ns:inner`) go too.
    pub fn flush_cache(&self) -> CacheResult<()> {
        let namespace = self.namespace();
        self.store.flush_namespace(&namespace)?;
        debug!(namespace = %namespace, "cache flushed");
        Ok(())
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    fn write<V: ToValue + ?Sized>(
        &self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let key = self.full_key(key);
        let raw = Envelope::encode(value)?.to_bytes();
        self.store.set(key.as_str(), raw, ttl)?;
        debug!(key = %key, ttl = ?ttl, "cache put");
        Ok(())
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("namespace", &self.namespace())
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}

/// Parse and decode raw store bytes. Unreadable entries are logged and
/// reported as `None`.
pub(crate) fn decode_entry(key: &CacheKey, raw: &Bytes) -> Option<Value> {
    let Some(envelope) = Envelope::parse_from(raw) else {
        warn!(key = %key, len = raw.len(), "unparseable cache entry");
        return None;
    };
    match envelope.decode() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key = %key, error = %err, "undecodable cache entry");
            None
        }
    }
}

/// Convert a decoded value into the requested type, logging mismatches.
pub(crate) fn convert<T: FromValue>(key: &CacheKey, value: Value) -> Option<T> {
    let kind = value.kind();
    let converted = T::from_value(value);
    if converted.is_none() {
        debug!(
            key = %key,
            stored = kind,
            requested = std::any::type_name::<T>(),
            "cache type mismatch"
        );
    }
    converted
}
