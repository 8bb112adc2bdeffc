//! Command-line interface definitions.
//!
//! This module defines the arguments of `pcache-client` and `pcache-server`
//! using clap.

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_NAMESPACE;

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Cache client.
///
/// A CLI tool for reading and writing a namespace of a running
/// `pcache-server`. Values are stored as UTF-8 text.
#[derive(Parser, Debug)]
#[command(name = "pcache-client")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Server host.
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Server port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Namespace prefixed to every key.
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// The command to execute.
    #[clap(subcommand)]
    pub command: ClientCommand,
}

impl Cli {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Available client commands.
#[derive(Subcommand, Debug)]
pub enum ClientCommand {
    /// Get a value by key.
    ///
    /// Prints the text stored at the key, or a not-found message.
    Get {
        /// The key to look up.
        key: String,
    },

    /// Store a value.
    Put {
        /// The key to store the value under.
        key: String,
        /// The value to store.
        value: String,
        /// Expiry in seconds. 0 stores without expiry; omitted uses the
        /// default TTL.
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// Remove a key.
    Remove {
        /// The key to remove.
        key: String,
    },

    /// Atomically add to an integer value.
    Incr {
        key: String,
        /// Amount to add; may be negative.
        #[arg(default_value_t = 1, allow_hyphen_values = true)]
        delta: i64,
    },

    /// Check whether a key holds a value.
    Contains { key: String },

    /// Try to take a non-blocking lock on a key.
    Lock {
        key: String,
        /// Lock expiry in milliseconds. 0 never expires.
        #[arg(long, default_value_t = 10_000)]
        duration_ms: i64,
    },

    /// Remove every key in the namespace.
    Flush,

    /// Ping the server.
    ///
    /// Checks if the server is running and responsive.
    Ping,

    /// Get server statistics.
    ///
    /// Shows hits, misses, size, CAS outcomes and hit rate.
    Stats,
}

/// Cache server.
///
/// Serves an in-memory store over TCP.
#[derive(Parser, Debug)]
#[command(name = "pcache-server")]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// Address to bind.
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to bind.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum number of entries. 0 means unlimited.
    #[arg(long, default_value_t = 10_000)]
    pub max_capacity: usize,

    /// Seconds between sweeps of expired entries. 0 disables the sweep.
    #[arg(long, default_value_t = 60)]
    pub cleanup_interval_secs: u64,
}

impl ServerArgs {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
