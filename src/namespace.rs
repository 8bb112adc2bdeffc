//! Key namespacing.
//!
//! Every key the manager hands to a store is `namespace:key`. The namespace is
//! looked up through a [`NamespaceProvider`] on each operation, so one manager
//! can follow a per-request tenant.

use std::fmt;

/// A fully qualified store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Join `namespace` and `key` as `namespace:key`.
    pub fn new(namespace: &str, key: &str) -> Self {
        let mut full = String::with_capacity(namespace.len() + 1 + key.len());
        full.push_str(namespace);
        full.push(':');
        full.push_str(key);
        CacheKey(full)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of the namespace applied to keys.
///
/// A namespace containing `:` nests under the part before it, so a flush of
/// the outer namespace also clears it.
pub trait NamespaceProvider: Send + Sync {
    /// The namespace for the current operation.
    fn namespace(&self) -> String;
}

/// A namespace fixed at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticNamespace(String);

impl StaticNamespace {
    pub fn new(namespace: impl Into<String>) -> Self {
        StaticNamespace(namespace.into())
    }
}

impl NamespaceProvider for StaticNamespace {
    fn namespace(&self) -> String {
        self.0.clone()
    }
}

impl<F> NamespaceProvider for F
where
    F: Fn() -> String + Send + Sync,
{
    fn namespace(&self) -> String {
        self()
    }
}
