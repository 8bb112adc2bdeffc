//! Batch reads.
//!
//! A batch read fetches many keys with one multi-get and sorts every input key
//! into either a typed hit or a missed key. Absent, unreadable and
//! wrongly-typed entries are all misses; callers can hand the misses to a
//! [`MissedHitsProvider`] to fill the gaps.

use tracing::{debug, warn};

use crate::manager::{convert, decode_entry, CacheManager};
use crate::namespace::CacheKey;
use crate::value::FromValue;

/// The outcome of a batch read.
///
/// Every input key ends up either as one entry of `hits` or in
/// `missed_keys`. Hits keep the input order but not their keys.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<T> {
    hits: Vec<T>,
    missed_keys: Vec<String>,
}

impl<T> MatchResult<T> {
    pub fn hits(&self) -> &[T] {
        &self.hits
    }

    /// Logical keys (without namespace or prefix) that were not hits.
    pub fn missed_keys(&self) -> &[String] {
        &self.missed_keys
    }

    pub fn has_missed_keys(&self) -> bool {
        !self.missed_keys.is_empty()
    }

    pub fn into_parts(self) -> (Vec<T>, Vec<String>) {
        (self.hits, self.missed_keys)
    }
}

/// Computes values for keys a batch read missed.
pub trait MissedHitsProvider<T> {
    /// Produce values for `missed_keys`.
    fn resolve(&self, missed_keys: &[String]) -> Vec<T>;
}

impl<T, F> MissedHitsProvider<T> for F
where
    F: Fn(&[String]) -> Vec<T>,
{
    fn resolve(&self, missed_keys: &[String]) -> Vec<T> {
        self(missed_keys)
    }
}

impl CacheManager {
    /// Read `keys` in one round trip.
    ///
    /// ```
    /// use pcache::{CacheConfig, CacheManager, MemoryStore};
    ///
    /// let cache = CacheManager::new(MemoryStore::default(), CacheConfig::default());
    /// cache.put("a", 1_i64).unwrap();
    /// cache.put("b", "two").unwrap();
    ///
    /// let result = cache.get_all::<i64>(&["a", "b", "c"]);
    /// assert_eq!(result.hits(), &[1]);
    /// assert_eq!(result.missed_keys(), &["b".to_string(), "c".to_string()]);
    /// ```
    pub fn get_all<T: FromValue>(&self, keys: &[impl AsRef<str>]) -> MatchResult<T> {
        self.get_all_with_prefix("", keys)
    }

    /// Read `keys` with `prefix` prepended to each of them.
    ///
    /// Missed keys are reported without the prefix.
    pub fn get_all_with_prefix<T: FromValue>(
        &self,
        prefix: &str,
        keys: &[impl AsRef<str>],
    ) -> MatchResult<T> {
        let full_keys: Vec<CacheKey> = keys
            .iter()
            .map(|key| self.full_key(&format!("{}{}", prefix, key.as_ref())))
            .collect();
        let lookup: Vec<String> = full_keys.iter().map(|k| k.as_str().to_string()).collect();

        let found = match self.store().multi_get(&lookup) {
            Ok(found) => found,
            Err(err) => {
                warn!(count = keys.len(), error = %err, "batch read failed, treating all as missed");
                Default::default()
            }
        };

        let mut hits = Vec::with_capacity(found.len());
        let mut missed_keys = Vec::new();
        for (key, full_key) in keys.iter().zip(&full_keys) {
            let hit = found
                .get(full_key.as_str())
                .and_then(|raw| decode_entry(full_key, raw))
                .and_then(|value| convert::<T>(full_key, value));
            match hit {
                Some(value) => hits.push(value),
                None => missed_keys.push(key.as_ref().to_string()),
            }
        }

        debug!(
            requested = keys.len(),
            hits = hits.len(),
            missed = missed_keys.len(),
            "cache get_all"
        );
        MatchResult { hits, missed_keys }
    }

    /// Read `keys`, then ask `provider` for the ones that were missed.
    ///
    /// Returns the cached hits followed by whatever the provider produced.
    /// The provider is not called when every key was a hit.
    pub fn get_all_or_else<T, P>(&self, keys: &[impl AsRef<str>], provider: P) -> Vec<T>
    where
        T: FromValue,
        P: MissedHitsProvider<T>,
    {
        let (mut hits, missed_keys) = self.get_all::<T>(keys).into_parts();
        if !missed_keys.is_empty() {
            hits.extend(provider.resolve(&missed_keys));
        }
        hits
    }
}
