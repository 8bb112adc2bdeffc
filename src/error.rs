//! Error types for the cache client.
//!
//! Two layers of errors exist: [`StoreError`] is what a store backend reports
//! (I/O, protocol, server-side failures), and [`CacheError`] is what the
//! [`CacheManager`](crate::CacheManager) and the lock primitives surface to
//! callers. Read paths never return either; they log and report a miss.

use std::io;

use thiserror::Error;

/// Failures reported by a [`Store`](crate::Store) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred talking to the backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer sent something that does not follow the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server executed the request and answered with an error.
    #[error("server error: {0}")]
    Server(String),

    /// `increment` hit a value that is not an integer of a known width.
    #[error("value at '{0}' is not an integer or would overflow")]
    NotAnInteger(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The backend cannot serve requests (poisoned lock, closed pool).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The value cannot be encoded for storage.
    #[error("value cannot be cached as it is not serializable: {0}")]
    NotSerializable(String),

    /// Stored bytes cannot be decoded with the flag written next to them.
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    /// An argument was rejected before the operation was attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A blocking lock exhausted its retry budget.
    #[error("lock timeout on '{key}' after {attempts} attempts")]
    LockTimeout { key: String, attempts: u32 },

    /// The store backend failed a write-path operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A specialized Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// A specialized Result type for store backends.
pub type StoreResult<T> = Result<T, StoreError>;
