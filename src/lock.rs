//! Mutual exclusion built from store primitives.
//!
//! Two flavours exist. [`KeyLock`] is a single non-blocking attempt backed by
//! set-if-absent. [`Lock`] retries a two-step acquisition (claim the key, then
//! compare-and-swap the claim) until it owns the key or runs out of attempts.
//!
//! Ownership is weak: releasing deletes the key regardless of who holds it,
//! and an expired lock can be taken by someone else while the first holder is
//! still working. Keep critical sections shorter than the lock's expiry.

use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::error::{CacheError, CacheResult};
use crate::manager::CacheManager;

/// Value written by the first step of an acquisition.
const CLAIMED: i32 = 1;

/// Value swapped in by the second step; seeing it means the lock is owned.
const OWNED: i32 = 2;

impl CacheManager {
    /// Make one attempt at taking the lock on `key`.
    ///
    /// Claims the key with set-if-absent, then takes a snapshot of the claim
    /// and swaps it for the owned marker. Only the caller whose swap succeeds
    /// owns the lock. `ttl` of `None` means the lock never expires.
    pub fn try_lock(&self, key: &str, ttl: Option<Duration>) -> CacheResult<bool> {
        let full_key = self.full_key(key);
        let claim = Envelope::encode(&CLAIMED)?.to_bytes();
        if !self.store().set_if_absent(full_key.as_str(), claim, ttl)? {
            debug!(key = %full_key, "lock already held");
            return Ok(false);
        }

        let Some(snapshot) = self.get_safe_value(key) else {
            return Ok(false);
        };
        let owned = self.compare_and_put(key, &snapshot, &OWNED, ttl)?;
        debug!(key = %full_key, owned, "lock attempt");
        Ok(owned)
    }
}

/// A non-blocking lock: one set-if-absent with an expiry.
///
/// ```
/// use pcache::{CacheConfig, CacheManager, KeyLock, MemoryStore};
///
/// let cache = CacheManager::new(MemoryStore::default(), CacheConfig::default());
/// let lock = KeyLock::new(cache);
///
/// assert!(lock.lock("report", 10_000).unwrap());
/// assert!(!lock.lock("report", 10_000).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct KeyLock {
    manager: CacheManager,
}

impl KeyLock {
    pub fn new(manager: CacheManager) -> Self {
        Self { manager }
    }

    /// Try to take the lock on `key` for `duration_ms` milliseconds.
    ///
    /// Returns `true` only if this call created the lock. A zero duration
    /// never expires; a negative one is rejected.
    pub fn lock(&self, key: &str, duration_ms: i64) -> CacheResult<bool> {
        let millis = u64::try_from(duration_ms).map_err(|_| {
            CacheError::InvalidArgument(format!(
                "lock duration must not be negative, got {} ms",
                duration_ms
            ))
        })?;

        self.manager
            .put_if_absent(key, true, Duration::from_millis(millis))
    }

    /// Release the lock on `key`, whoever holds it.
    pub fn unlock(&self, key: &str) -> CacheResult<()> {
        self.manager.remove(key)
    }
}

/// A blocking lock that retries until it owns the key.
///
/// ```
/// use pcache::{CacheConfig, CacheManager, Lock, MemoryStore};
///
/// let cache = CacheManager::new(MemoryStore::default(), CacheConfig::default());
/// let lock = Lock::new(cache);
///
/// lock.lock("nightly-job", 3).unwrap();
/// // ... critical section ...
/// lock.release_lock("nightly-job").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Lock {
    manager: CacheManager,
    poll_interval: Duration,
}

impl Lock {
    /// Create a lock polling at the manager's configured interval.
    pub fn new(manager: CacheManager) -> Self {
        let poll_interval = manager.config().get_lock_poll_interval();
        Self {
            manager,
            poll_interval,
        }
    }

    /// Override the sleep between attempts.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Block until the lock on `key` is owned, making at most
    /// `max(retry_count, 1)` attempts.
    ///
    /// The lock expires after `attempts * poll_interval`, so a crashed holder
    /// cannot block others for longer than one full wait. Fails with
    /// [`CacheError::LockTimeout`] when every attempt found the lock taken.
    pub fn lock(&self, key: &str, retry_count: u32) -> CacheResult<()> {
        let attempts = retry_count.max(1);
        let expiry = self.poll_interval.saturating_mul(attempts);
        let ttl = if expiry.is_zero() { None } else { Some(expiry) };

        for attempt in 1..=attempts {
            if self.manager.try_lock(key, ttl)? {
                debug!(key, attempt, "lock acquired");
                return Ok(());
            }
            if attempt < attempts {
                thread::sleep(self.poll_interval);
            }
        }

        warn!(key, attempts, "lock timeout");
        Err(CacheError::LockTimeout {
            key: key.to_string(),
            attempts,
        })
    }

    /// Release the lock on `key` immediately.
    ///
    /// This deletes the key without checking who holds it.
    pub fn release_lock(&self, key: &str) -> CacheResult<()> {
        self.manager.remove(key)?;
        debug!(key, "lock released");
        Ok(())
    }

    /// Block the calling thread for `delay`, then release the lock on `key`.
    pub fn release_lock_after(&self, key: &str, delay: Duration) -> CacheResult<()> {
        thread::sleep(delay);
        self.release_lock(key)
    }
}
