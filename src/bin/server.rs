//! Cache store server.
//!
//! This binary serves an in-memory store to `pcache-client` and any other
//! `RemoteStore` over TCP.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pcache::{server, MemoryStore, ServerArgs, StoreConfig};

/// Entry point for the cache server.
#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = ServerArgs::parse();

    let store_config = StoreConfig::new()
        .max_capacity(args.max_capacity)
        .cleanup_interval(Duration::from_secs(args.cleanup_interval_secs))
        .build();
    let store = Arc::new(MemoryStore::new(store_config));

    let addr = args.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        %addr,
        max_capacity = ?store.config().get_max_capacity(),
        cleanup_interval = ?store.config().get_cleanup_interval(),
        "cache server listening"
    );

    server::run(listener, Arc::clone(&store), signal::ctrl_c()).await?;

    info!(stats = %store.stats_snapshot(), "final stats");
    Ok(())
}
