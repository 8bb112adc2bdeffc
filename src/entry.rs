//! A stored item inside [`MemoryStore`](crate::MemoryStore).

use bytes::Bytes;
use std::time::{Duration, Instant};

/// A single stored item: the raw envelope bytes plus expiry.
///
/// Recency lives in the store's map order, not in the entry.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The stored bytes, compared verbatim by compare-and-swap.
    pub(crate) value: Bytes,

    /// When this entry expires. `None` means no expiration.
    pub(crate) expires_at: Option<Instant>,
}

impl Entry {
    /// Create an entry that lives for `ttl`, or forever when `ttl` is `None`.
    ///
    /// A TTL too large to represent as an `Instant` never expires.
    pub fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    /// Replace the value, keeping the current expiry.
    pub fn with_value_keeping_expiry(&self, value: Bytes) -> Self {
        Self {
            value,
            expires_at: self.expires_at,
        }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Check if this entry has expired at a given time.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Byte-for-byte comparison with an expected value.
    pub fn holds(&self, expected: &[u8]) -> bool {
        self.value.as_ref() == expected
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Time left before expiry, `None` for entries that never expire.
    pub fn remaining_ttl(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}
