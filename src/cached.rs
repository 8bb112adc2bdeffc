//! Read-through caching of function calls.
//!
//! [`cached`] wraps a function so that its results are looked up in, and
//! written to, a [`CacheManager`]. Keys usually come from a [`KeyTemplate`]
//! such as `"user::id"` rendered with the call's arguments.

use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::manager::CacheManager;
use crate::value::{FromValue, ToValue};

/// Common expiry presets for cached calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTime {
    TwoSeconds,
    TenSeconds,
    OneMinute,
    FiveMinutes,
    TenMinutes,
    HalfHour,
    OneHour,
    EightHours,
}

/// Expiry used when a cached call does not choose one.
pub const DEFAULT_CACHE_TIME: CacheTime = CacheTime::OneMinute;

impl CacheTime {
    const ALL: [CacheTime; 8] = [
        CacheTime::TwoSeconds,
        CacheTime::TenSeconds,
        CacheTime::OneMinute,
        CacheTime::FiveMinutes,
        CacheTime::TenMinutes,
        CacheTime::HalfHour,
        CacheTime::OneHour,
        CacheTime::EightHours,
    ];

    pub fn seconds(self) -> u64 {
        match self {
            CacheTime::TwoSeconds => 2,
            CacheTime::TenSeconds => 10,
            CacheTime::OneMinute => 60,
            CacheTime::FiveMinutes => 5 * 60,
            CacheTime::TenMinutes => 10 * 60,
            CacheTime::HalfHour => 30 * 60,
            CacheTime::OneHour => 60 * 60,
            CacheTime::EightHours => 8 * 60 * 60,
        }
    }

    /// The preset lasting exactly `seconds`, if there is one.
    pub fn from_seconds(seconds: u64) -> Option<CacheTime> {
        Self::ALL.into_iter().find(|time| time.seconds() == seconds)
    }
}

impl Default for CacheTime {
    fn default() -> Self {
        DEFAULT_CACHE_TIME
    }
}

impl From<CacheTime> for Duration {
    fn from(time: CacheTime) -> Duration {
        Duration::from_secs(time.seconds())
    }
}

/// A cache key pattern with `:name` placeholders.
///
/// ```
/// use pcache::KeyTemplate;
///
/// let template = KeyTemplate::new("orders::customer::page");
/// let key = template.render(&[("customer", &42), ("page", &"3")]).unwrap();
/// assert_eq!(key, "orders:42:3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    pattern: String,
}

impl KeyTemplate {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Substitute every `:name` placeholder with the matching parameter.
    ///
    /// A parameter that has no placeholder in the template is rejected with
    /// [`CacheError::InvalidArgument`].
    pub fn render(&self, params: &[(&str, &dyn fmt::Display)]) -> CacheResult<String> {
        let mut key = self.pattern.clone();
        for (name, value) in params {
            let placeholder = format!(":{}", name);
            let rendered = replace_placeholder(&key, &placeholder, &value.to_string());
            match rendered {
                Some(next) => key = next,
                None => {
                    return Err(CacheError::InvalidArgument(format!(
                        "parameter '{}' has no placeholder in key template '{}'",
                        name, self.pattern
                    )))
                }
            }
        }
        Ok(key)
    }
}

/// Replace each whole-word occurrence of `placeholder`. A placeholder only
/// matches when the next character cannot continue a parameter name, so
/// `:id` does not match inside `:idx`.
fn replace_placeholder(template: &str, placeholder: &str, value: &str) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut found = false;

    while let Some(pos) = rest.find(placeholder) {
        let after = &rest[pos + placeholder.len()..];
        let continues_name = after
            .chars()
            .next()
            .map_or(false, |c| c.is_alphanumeric() || c == '_');

        out.push_str(&rest[..pos]);
        if continues_name {
            out.push_str(placeholder);
        } else {
            out.push_str(value);
            found = true;
        }
        rest = after;
    }
    out.push_str(rest);

    found.then_some(out)
}

/// Wrap `call` with read-through caching.
///
/// The returned closure derives a key from its argument with `key_fn`, returns
/// the cached value on a hit, and otherwise runs `call` and caches the result
/// for `ttl`. Null results are not cached. A failed cache write is logged and
/// the computed value is still returned.
///
/// ```
/// use pcache::{cached, CacheConfig, CacheManager, CacheTime, KeyTemplate, MemoryStore};
/// use std::cell::Cell;
///
/// let cache = CacheManager::new(MemoryStore::default(), CacheConfig::default());
/// let calls = Cell::new(0);
/// let template = KeyTemplate::new("square::n");
///
/// let square = cached(
///     cache,
///     CacheTime::OneMinute,
///     |n: &i64| template.render(&[("n", n)]),
///     |n: &i64| {
///         calls.set(calls.get() + 1);
///         n * n
///     },
/// );
///
/// assert_eq!(square(&4).unwrap(), 16);
/// assert_eq!(square(&4).unwrap(), 16);
/// assert_eq!(calls.get(), 1);
/// ```
pub fn cached<A, T, K, F>(
    manager: CacheManager,
    ttl: impl Into<Duration>,
    key_fn: K,
    call: F,
) -> impl Fn(&A) -> CacheResult<T>
where
    A: ?Sized,
    T: ToValue + FromValue,
    K: Fn(&A) -> CacheResult<String>,
    F: Fn(&A) -> T,
{
    let ttl = ttl.into();
    move |arg: &A| {
        let key = key_fn(arg)?;
        if let Some(hit) = manager.get::<T>(&key) {
            debug!(key = %key, "cached call hit");
            return Ok(hit);
        }

        let value = call(arg);
        match value.to_value() {
            Ok(v) if v.is_null() => {}
            Ok(_) => {
                if let Err(err) = manager.put_with_ttl(&key, &value, ttl) {
                    warn!(key = %key, error = %err, "failed to cache call result");
                }
            }
            Err(err) => warn!(key = %key, error = %err, "call result is not cacheable"),
        }
        Ok(value)
    }
}
