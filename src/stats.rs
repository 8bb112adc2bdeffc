//! Operation counters for [`MemoryStore`](crate::MemoryStore).
//!
//! All counters are atomic so they can be bumped from any thread without
//! taking the store lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for store operations.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Reads that found a live entry (single and multi-get).
    hits: AtomicU64,

    /// Reads that found nothing or an expired entry.
    misses: AtomicU64,

    /// Entries evicted due to the capacity limit.
    evictions: AtomicU64,

    /// Entries removed because their TTL ran out.
    expirations: AtomicU64,

    /// Current number of entries in the store.
    size: AtomicU64,

    /// Unconditional and conditional writes that stored a value.
    sets: AtomicU64,

    /// Deletes that removed an entry.
    deletes: AtomicU64,

    /// Compare-and-swap calls that replaced the value.
    cas_successes: AtomicU64,

    /// Compare-and-swap calls rejected because the value changed or vanished.
    cas_failures: AtomicU64,
}

impl CacheStats {
    /// Create a new stats instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a compare-and-swap.
    pub fn record_cas(&self, swapped: bool) {
        if swapped {
            self.cas_successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cas_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Set the size to a specific value.
    pub fn set_size(&self, size: u64) {
        self.size.store(size, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    pub fn cas_successes(&self) -> u64 {
        self.cas_successes.load(Ordering::Relaxed)
    }

    pub fn cas_failures(&self) -> u64 {
        self.cas_failures.load(Ordering::Relaxed)
    }

    /// Calculate the hit rate as a percentage (0.0 to 100.0).
    /// Returns 0.0 if no reads have been performed.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    /// Create a snapshot of the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            expirations: self.expirations(),
            size: self.size(),
            sets: self.sets(),
            deletes: self.deletes(),
            cas_successes: self.cas_successes(),
            cas_failures: self.cas_failures(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// A point-in-time snapshot of store statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: u64,
    pub sets: u64,
    pub deletes: u64,
    pub cas_successes: u64,
    pub cas_failures: u64,
    pub hit_rate: f64,
}

/// The `key:value` line the server sends back for `STATS`.
impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits:{} misses:{} size:{} sets:{} deletes:{} evictions:{} expirations:{} cas_ok:{} cas_failed:{} hit_rate:{:.1}%",
            self.hits,
            self.misses,
            self.size,
            self.sets,
            self.deletes,
            self.evictions,
            self.expirations,
            self.cas_successes,
            self.cas_failures,
            self.hit_rate
        )
    }
}
