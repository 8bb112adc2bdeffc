//! Configuration for the cache manager and the in-memory store.
//!
//! Both configs use the builder pattern; zero durations and zero capacities
//! mean "disabled" rather than "zero".

use std::time::Duration;

/// Default TTL applied by [`CacheManager::put`](crate::CacheManager::put).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3000);

/// Default TTL applied by [`CacheManager::safe_put`](crate::CacheManager::safe_put).
pub const DEFAULT_SAFE_PUT_TTL: Duration = Duration::from_secs(90_000);

/// Sleep between two attempts of the blocking [`Lock`](crate::Lock).
pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Configuration for a [`CacheManager`](crate::CacheManager).
///
/// ```
/// use pcache::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::new()
///     .namespace("tenant-42")
///     .default_ttl(Duration::from_secs(300))
///     .build();
/// assert_eq!(config.get_namespace(), "tenant-42");
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Prefix applied to every key as `namespace:key`.
    pub(crate) namespace: String,

    /// TTL for `put` without an explicit TTL. `None` means no expiry.
    pub(crate) default_ttl: Option<Duration>,

    /// TTL for `safe_put` without an explicit TTL. `None` means no expiry.
    pub(crate) safe_put_ttl: Option<Duration>,

    /// Sleep between two attempts of the blocking lock.
    pub(crate) lock_poll_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_ttl: Some(DEFAULT_TTL),
            safe_put_ttl: Some(DEFAULT_SAFE_PUT_TTL),
            lock_poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the namespace prefixed to every key.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the TTL used by `put`. `Duration::ZERO` stores without expiry.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = non_zero(ttl);
        self
    }

    /// Set the TTL used by `safe_put`. `Duration::ZERO` stores without expiry.
    pub fn safe_put_ttl(mut self, ttl: Duration) -> Self {
        self.safe_put_ttl = non_zero(ttl);
        self
    }

    /// Set the sleep between blocking lock attempts.
    pub fn lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Self {
        self
    }

    pub fn get_namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get_default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    pub fn get_safe_put_ttl(&self) -> Option<Duration> {
        self.safe_put_ttl
    }

    pub fn get_lock_poll_interval(&self) -> Duration {
        self.lock_poll_interval
    }
}

/// Configuration for a [`MemoryStore`](crate::MemoryStore).
///
/// ```
/// use pcache::StoreConfig;
///
/// let config = StoreConfig::new().max_capacity(10_000).build();
/// assert_eq!(config.get_max_capacity(), Some(10_000));
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of entries; the least recently used one is evicted
    /// when a new key would exceed it. `None` means unlimited.
    pub(crate) max_capacity: Option<usize>,

    /// Interval of the server's background sweep of expired entries.
    /// `None` disables the sweep (lazy expiration only).
    pub(crate) cleanup_interval: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: None,
            cleanup_interval: Some(Duration::from_secs(60)),
        }
    }
}

impl StoreConfig {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum capacity. Use 0 for unlimited.
    pub fn max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = if capacity == 0 { None } else { Some(capacity) };
        self
    }

    /// Set the background cleanup interval. `Duration::ZERO` disables it.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = non_zero(interval);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Self {
        self
    }

    pub fn get_max_capacity(&self) -> Option<usize> {
        self.max_capacity
    }

    pub fn get_cleanup_interval(&self) -> Option<Duration> {
        self.cleanup_interval
    }
}

/// Zero durations turn a setting off.
pub(crate) fn non_zero(duration: Duration) -> Option<Duration> {
    if duration.is_zero() {
        None
    } else {
        Some(duration)
    }
}
