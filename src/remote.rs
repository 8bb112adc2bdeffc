//! A [`Store`] backed by a running `pcache-server`.
//!
//! The store exposes a blocking API on top of a small private tokio runtime.
//! Connections are kept in a pool and reused; one that fails mid-request is
//! dropped rather than returned. Conditional operations execute atomically on
//! the server, so several `RemoteStore`s (or processes) can share one server.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tokio::time;
use tracing::debug;

use crate::command::Command;
use crate::connection::Connection;
use crate::error::{StoreError, StoreResult};
use crate::frame::Frame;
use crate::store::Store;

/// Default time allowed for one request/response round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle connections kept for reuse.
const MAX_IDLE_CONNECTIONS: usize = 16;

/// Blocking client for `pcache-server`.
///
/// Safe to share across threads. Must not be used from inside an async
/// runtime, since every call blocks on the store's own runtime.
#[derive(Debug)]
pub struct RemoteStore {
    addr: String,
    runtime: Runtime,
    pool: Mutex<Vec<Connection>>,
    timeout: Duration,
}

impl RemoteStore {
    /// Connect to the server at `addr` (`host:port`) and check it answers.
    pub fn connect(addr: impl Into<String>) -> StoreResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("pcache-remote")
            .enable_all()
            .build()?;

        let store = RemoteStore {
            addr: addr.into(),
            runtime,
            pool: Mutex::new(Vec::new()),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        };
        store.ping()?;
        debug!(addr = %store.addr, "connected to store server");
        Ok(store)
    }

    /// Set the time allowed for each request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Health check.
    pub fn ping(&self) -> StoreResult<()> {
        match self.request(Command::Ping)? {
            Frame::Simple(reply) if reply == "PONG" => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// The server's statistics line.
    pub fn stats(&self) -> StoreResult<String> {
        match self.request(Command::Stats)? {
            Frame::Bulk(line) => String::from_utf8(line.to_vec())
                .map_err(|_| StoreError::Protocol("stats reply is not UTF-8".to_string())),
            other => Err(unexpected(other)),
        }
    }

    /// Send one command and wait for its reply.
    fn request(&self, command: Command) -> StoreResult<Frame> {
        let name = command.name();
        let frame = command.into_frame();
        let pooled = self.checkout()?;
        let timeout = self.timeout;
        let addr = self.addr.as_str();

        let exchange = async {
            let mut connection = match pooled {
                Some(connection) => connection,
                None => Connection::new(TcpStream::connect(addr).await?),
            };
            connection.write_frame(&frame).await?;
            let reply = connection.read_frame().await?.ok_or_else(|| {
                StoreError::Protocol("connection closed by server".to_string())
            })?;
            Ok::<_, StoreError>((connection, reply))
        };

        let (connection, reply) = self
            .runtime
            .block_on(async { time::timeout(timeout, exchange).await })
            .map_err(|_| StoreError::Timeout(timeout))??;
        self.checkin(connection);

        match reply {
            Frame::Error(message) => {
                debug!(command = name, error = %message, "server returned an error");
                Err(StoreError::Server(message))
            }
            reply => Ok(reply),
        }
    }

    fn checkout(&self) -> StoreResult<Option<Connection>> {
        let mut pool = self
            .pool
            .lock()
            .map_err(|_| StoreError::Unavailable("connection pool lock poisoned".to_string()))?;
        Ok(pool.pop())
    }

    fn checkin(&self, connection: Connection) {
        if let Ok(mut pool) = self.pool.lock() {
            if pool.len() < MAX_IDLE_CONNECTIONS {
                pool.push(connection);
            }
        }
    }
}

impl Store for RemoteStore {
    fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        match self.request(Command::Get {
            key: key.to_string(),
        })? {
            Frame::Bulk(value) => Ok(Some(value)),
            Frame::Null => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<()> {
        let reply = self.request(Command::Set {
            key: key.to_string(),
            value,
            ttl,
        })?;
        expect_ok(reply)
    }

    fn set_many(&self, entries: Vec<(String, Bytes)>, ttl: Option<Duration>) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        expect_ok(self.request(Command::MSet { entries, ttl })?)
    }

    fn multi_get(&self, keys: &[String]) -> StoreResult<HashMap<String, Bytes>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let items = match self.request(Command::MGet {
            keys: keys.to_vec(),
        })? {
            Frame::Array(items) => items,
            other => return Err(unexpected(other)),
        };
        if items.len() != keys.len() {
            return Err(StoreError::Protocol(format!(
                "MGET returned {} values for {} keys",
                items.len(),
                keys.len()
            )));
        }

        let mut found = HashMap::with_capacity(keys.len());
        for (key, item) in keys.iter().zip(items) {
            match item {
                Frame::Bulk(value) => {
                    found.insert(key.clone(), value);
                }
                Frame::Null => {}
                other => return Err(unexpected(other)),
            }
        }
        Ok(found)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        expect_flag(self.request(Command::Del {
            key: key.to_string(),
        })?)
    }

    fn set_if_absent(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<bool> {
        expect_flag(self.request(Command::SetNx {
            key: key.to_string(),
            value,
            ttl,
        })?)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        value: Bytes,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        expect_flag(self.request(Command::Cas {
            key: key.to_string(),
            expected: Bytes::copy_from_slice(expected),
            value,
            ttl,
        })?)
    }

    fn increment(&self, key: &str, delta: i64) -> StoreResult<i64> {
        match self.request(Command::Incr {
            key: key.to_string(),
            delta,
        })? {
            Frame::Integer(value) => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        expect_flag(self.request(Command::Exists {
            key: key.to_string(),
        })?)
    }

    fn flush_namespace(&self, namespace: &str) -> StoreResult<()> {
        expect_ok(self.request(Command::Flush {
            namespace: namespace.to_string(),
        })?)
    }
}

fn unexpected(reply: Frame) -> StoreError {
    StoreError::Protocol(format!("unexpected reply: {:?}", reply))
}

fn expect_ok(reply: Frame) -> StoreResult<()> {
    match reply {
        Frame::Simple(text) if text == "OK" => Ok(()),
        other => Err(unexpected(other)),
    }
}

fn expect_flag(reply: Frame) -> StoreResult<bool> {
    match reply {
        Frame::Integer(0) => Ok(false),
        Frame::Integer(1) => Ok(true),
        other => Err(unexpected(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_helpers() {
        assert!(expect_ok(Frame::Simple("OK".into())).is_ok());
        assert!(expect_ok(Frame::Integer(1)).is_err());
        assert!(expect_flag(Frame::Integer(1)).unwrap());
        assert!(!expect_flag(Frame::Integer(0)).unwrap());
        assert!(expect_flag(Frame::Integer(2)).is_err());
    }

    #[test]
    fn test_connect_to_closed_port_fails() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let err = RemoteStore::connect(format!("127.0.0.1:{}", port)).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
