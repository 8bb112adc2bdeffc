//! The TCP front end of `pcache-server`.
//!
//! Each accepted connection gets its own task that reads request frames,
//! applies them to the shared [`MemoryStore`] and writes one reply per
//! request. Store operations are synchronous and short, so they run directly
//! on the connection task.

use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::connection::Connection;
use crate::error::StoreError;
use crate::frame::Frame;
use crate::storage::MemoryStore;
use crate::store::Store;

/// Serve `store` on `listener` until `shutdown` completes.
///
/// When the store is configured with a cleanup interval, a background task
/// sweeps expired entries on that interval.
pub async fn run(
    listener: TcpListener,
    store: Arc<MemoryStore>,
    shutdown: impl Future,
) -> io::Result<()> {
    let sweeper = store.config().get_cleanup_interval().map(|interval| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.cleanup_expired();
                if removed > 0 {
                    debug!(removed, "swept expired entries");
                }
            }
        })
    });

    tokio::pin!(shutdown);
    let result = loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    debug!(%peer, "connection accepted");
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(Connection::new(socket), store).await {
                            warn!(%peer, error = %err, "connection error");
                        }
                    });
                }
                Err(err) => error!(error = %err, "failed to accept connection"),
            },
            _ = &mut shutdown => {
                info!("shutting down");
                break Ok(());
            }
        }
    };

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    result
}

async fn handle_connection(mut connection: Connection, store: Arc<MemoryStore>) -> Result<(), StoreError> {
    while let Some(frame) = connection.read_frame().await? {
        let reply = match Command::from_frame(frame) {
            Ok(command) => {
                debug!(command = command.name(), "request");
                apply(command, &store)
            }
            Err(err) => Frame::Error(format!("ERR {}", err)),
        };
        connection.write_frame(&reply).await?;
    }
    Ok(())
}

/// Execute one command against the store and build its reply.
pub fn apply(command: Command, store: &MemoryStore) -> Frame {
    let reply = match command {
        Command::Ping => Ok(Frame::Simple("PONG".to_string())),
        Command::Get { key } => store
            .get(&key)
            .map(|value| value.map_or(Frame::Null, Frame::Bulk)),
        Command::Set { key, value, ttl } => store.set(&key, value, ttl).map(|()| ok()),
        Command::MSet { entries, ttl } => store.set_many(entries, ttl).map(|()| ok()),
        Command::SetNx { key, value, ttl } => store.set_if_absent(&key, value, ttl).map(flag),
        Command::Cas {
            key,
            expected,
            value,
            ttl,
        } => store
            .compare_and_swap(&key, &expected, value, ttl)
            .map(flag),
        Command::MGet { keys } => store.multi_get(&keys).map(|found| {
            let items = keys
                .iter()
                .map(|key| found.get(key).cloned().map_or(Frame::Null, Frame::Bulk))
                .collect();
            Frame::Array(items)
        }),
        Command::Del { key } => store.delete(&key).map(flag),
        Command::Incr { key, delta } => store.increment(&key, delta).map(Frame::Integer),
        Command::Exists { key } => store.exists(&key).map(flag),
        Command::Flush { namespace } => store.flush_namespace(&namespace).map(|()| ok()),
        Command::Stats => Ok(Frame::bulk(store.stats_snapshot().to_string())),
    };

    reply.unwrap_or_else(|err| Frame::Error(format!("ERR {}", err)))
}

fn ok() -> Frame {
    Frame::Simple("OK".to_string())
}

fn flag(value: bool) -> Frame {
    Frame::Integer(i64::from(value))
}
