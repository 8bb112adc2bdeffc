//! Command types for the store protocol.
//!
//! A request is an array of bulk strings whose first element names the
//! command. TTLs travel as milliseconds, with `0` meaning no expiry.

use bytes::Bytes;
use std::fmt;
use std::time::Duration;
use std::vec;

use crate::error::{StoreError, StoreResult};
use crate::frame::Frame;

/// Requests understood by `pcache-server`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Health check.
    Ping,
    Get {
        key: String,
    },
    Set {
        key: String,
        value: Bytes,
        ttl: Option<Duration>,
    },
    /// Write several keys with one TTL.
    MSet {
        entries: Vec<(String, Bytes)>,
        ttl: Option<Duration>,
    },
    /// Write only if the key is absent.
    SetNx {
        key: String,
        value: Bytes,
        ttl: Option<Duration>,
    },
    /// Replace the value only if it equals `expected`.
    Cas {
        key: String,
        expected: Bytes,
        value: Bytes,
        ttl: Option<Duration>,
    },
    MGet {
        keys: Vec<String>,
    },
    Del {
        key: String,
    },
    Incr {
        key: String,
        delta: i64,
    },
    Exists {
        key: String,
    },
    /// Remove every key of a namespace.
    Flush {
        namespace: String,
    },
    /// Server statistics.
    Stats,
}

impl Command {
    /// The wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::MSet { .. } => "MSET",
            Command::SetNx { .. } => "SETNX",
            Command::Cas { .. } => "CAS",
            Command::MGet { .. } => "MGET",
            Command::Del { .. } => "DEL",
            Command::Incr { .. } => "INCR",
            Command::Exists { .. } => "EXISTS",
            Command::Flush { .. } => "FLUSH",
            Command::Stats => "STATS",
        }
    }

    /// Parse a command from a request frame.
    ///
    /// Command names are case-insensitive.
    pub fn from_frame(frame: Frame) -> StoreResult<Command> {
        let Frame::Array(items) = frame else {
            return Err(protocol("request must be an array"));
        };
        let mut args = Args {
            items: items.into_iter(),
        };

        let name = args.next_string()?.to_uppercase();
        let command = match name.as_str() {
            "PING" => Command::Ping,
            "GET" => Command::Get {
                key: args.next_string()?,
            },
            "SET" => Command::Set {
                key: args.next_string()?,
                value: args.next_bytes()?,
                ttl: args.next_ttl()?,
            },
            "MSET" => {
                let ttl = args.next_ttl()?;
                let mut entries = Vec::new();
                while args.has_more() {
                    entries.push((args.next_string()?, args.next_bytes()?));
                }
                Command::MSet { entries, ttl }
            }
            "SETNX" => Command::SetNx {
                key: args.next_string()?,
                value: args.next_bytes()?,
                ttl: args.next_ttl()?,
            },
            "CAS" => Command::Cas {
                key: args.next_string()?,
                expected: args.next_bytes()?,
                value: args.next_bytes()?,
                ttl: args.next_ttl()?,
            },
            "MGET" => {
                let mut keys = Vec::new();
                while args.has_more() {
                    keys.push(args.next_string()?);
                }
                Command::MGet { keys }
            }
            "DEL" | "DELETE" => Command::Del {
                key: args.next_string()?,
            },
            "INCR" => Command::Incr {
                key: args.next_string()?,
                delta: args.next_int()?,
            },
            "EXISTS" => Command::Exists {
                key: args.next_string()?,
            },
            "FLUSH" => Command::Flush {
                namespace: args.next_string()?,
            },
            "STATS" | "INFO" => Command::Stats,
            _ => return Err(protocol(&format!("unknown command '{}'", name))),
        };

        if args.has_more() {
            return Err(protocol(&format!("too many arguments for '{}'", name)));
        }
        Ok(command)
    }

    /// Build the request frame for this command.
    pub fn into_frame(self) -> Frame {
        let name = self.name();
        let mut items = vec![Frame::bulk(name)];
        match self {
            Command::Ping | Command::Stats => {}
            Command::Get { key }
            | Command::Del { key }
            | Command::Exists { key }
            | Command::Flush { namespace: key } => items.push(Frame::bulk(key)),
            Command::Set { key, value, ttl } | Command::SetNx { key, value, ttl } => {
                items.push(Frame::bulk(key));
                items.push(Frame::Bulk(value));
                items.push(ttl_frame(ttl));
            }
            Command::MSet { entries, ttl } => {
                items.push(ttl_frame(ttl));
                for (key, value) in entries {
                    items.push(Frame::bulk(key));
                    items.push(Frame::Bulk(value));
                }
            }
            Command::Cas {
                key,
                expected,
                value,
                ttl,
            } => {
                items.push(Frame::bulk(key));
                items.push(Frame::Bulk(expected));
                items.push(Frame::Bulk(value));
                items.push(ttl_frame(ttl));
            }
            Command::MGet { keys } => items.extend(keys.into_iter().map(Frame::bulk)),
            Command::Incr { key, delta } => {
                items.push(Frame::bulk(key));
                items.push(Frame::bulk(delta.to_string()));
            }
        }
        Frame::Array(items)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn protocol(message: &str) -> StoreError {
    StoreError::Protocol(message.to_string())
}

fn ttl_frame(ttl: Option<Duration>) -> Frame {
    let millis = ttl.map_or(0, |ttl| ttl.as_millis().clamp(1, i64::MAX as u128));
    Frame::bulk(millis.to_string())
}

/// Cursor over the arguments of a request.
struct Args {
    items: vec::IntoIter<Frame>,
}

impl Args {
    fn has_more(&self) -> bool {
        self.items.len() > 0
    }

    fn next_bytes(&mut self) -> StoreResult<Bytes> {
        match self.items.next() {
            Some(Frame::Bulk(data)) => Ok(data),
            Some(Frame::Simple(text)) => Ok(Bytes::from(text)),
            Some(other) => Err(protocol(&format!("expected bulk string, got {:?}", other))),
            None => Err(protocol("missing argument")),
        }
    }

    fn next_string(&mut self) -> StoreResult<String> {
        let data = self.next_bytes()?;
        String::from_utf8(data.to_vec()).map_err(|_| protocol("argument is not valid UTF-8"))
    }

    fn next_int(&mut self) -> StoreResult<i64> {
        match self.items.next() {
            Some(Frame::Integer(n)) => Ok(n),
            Some(Frame::Bulk(data)) => std::str::from_utf8(&data)
                .ok()
                .and_then(|text| text.parse().ok())
                .ok_or_else(|| protocol("argument is not an integer")),
            Some(other) => Err(protocol(&format!("expected integer, got {:?}", other))),
            None => Err(protocol("missing argument")),
        }
    }

    fn next_ttl(&mut self) -> StoreResult<Option<Duration>> {
        let millis = self.next_int()?;
        match u64::try_from(millis) {
            Ok(0) => Ok(None),
            Ok(millis) => Ok(Some(Duration::from_millis(millis))),
            Err(_) => Err(protocol("ttl must not be negative")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(parts: &[&str]) -> Frame {
        Frame::Array(parts.iter().map(Frame::bulk).collect())
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Command::from_frame(request(&["ping"])).unwrap(), Command::Ping);
        assert_eq!(
            Command::from_frame(request(&["GeT", "k"])).unwrap(),
            Command::Get { key: "k".into() }
        );
        assert_eq!(
            Command::from_frame(request(&["del", "k"])).unwrap(),
            Command::Del { key: "k".into() }
        );
    }

    #[test]
    fn test_parse_set_with_ttl() {
        let command = Command::from_frame(request(&["SET", "k", "v", "1500"])).unwrap();
        assert_eq!(
            command,
            Command::Set {
                key: "k".into(),
                value: Bytes::from_static(b"v"),
                ttl: Some(Duration::from_millis(1500)),
            }
        );
    }

    #[test]
    fn test_zero_ttl_means_none() {
        let command = Command::from_frame(request(&["SETNX", "k", "v", "0"])).unwrap();
        assert!(matches!(command, Command::SetNx { ttl: None, .. }));
    }

    #[test]
    fn test_unknown_command() {
        let err = Command::from_frame(request(&["FROB"])).unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)));
    }

    #[test]
    fn test_missing_and_extra_arguments() {
        assert!(Command::from_frame(request(&["GET"])).is_err());
        assert!(Command::from_frame(request(&["GET", "a", "b"])).is_err());
        assert!(Command::from_frame(request(&["INCR", "a", "x"])).is_err());
        assert!(Command::from_frame(request(&["SET", "k", "v", "-5"])).is_err());
        assert!(Command::from_frame(Frame::Simple("PING".into())).is_err());
    }

    #[test]
    fn test_round_trip_through_frames() {
        let commands = vec![
            Command::Ping,
            Command::Stats,
            Command::Get { key: "k".into() },
            Command::MSet {
                entries: vec![
                    ("a".into(), Bytes::from_static(b"\x011")),
                    ("b".into(), Bytes::from_static(b"\x012")),
                ],
                ttl: Some(Duration::from_secs(3)),
            },
            Command::Cas {
                key: "k".into(),
                expected: Bytes::from_static(b"\x03\r\n"),
                value: Bytes::new(),
                ttl: None,
            },
            Command::MGet {
                keys: vec!["a".into(), "b".into()],
            },
            Command::Incr {
                key: "n".into(),
                delta: -4,
            },
            Command::Flush {
                namespace: "tenant".into(),
            },
        ];

        for command in commands {
            let parsed = Command::from_frame(command.clone().into_frame()).unwrap();
            assert_eq!(parsed, command);
        }
    }

    #[test]
    fn test_sub_millisecond_ttl_is_not_dropped() {
        let frame = Command::Set {
            key: "k".into(),
            value: Bytes::new(),
            ttl: Some(Duration::from_micros(10)),
        }
        .into_frame();

        let parsed = Command::from_frame(frame).unwrap();
        assert!(matches!(parsed, Command::Set { ttl: Some(_), .. }));
    }

    #[test]
    fn test_huge_ttl_is_clamped() {
        let frame = Command::Set {
            key: "k".into(),
            value: Bytes::new(),
            ttl: Some(Duration::MAX),
        }
        .into_frame();

        let parsed = Command::from_frame(frame).unwrap();
        match parsed {
            Command::Set { ttl: Some(ttl), .. } => {
                assert_eq!(ttl, Duration::from_millis(i64::MAX as u64))
            }
            other => panic!("Expected Set with ttl, got {:?}", other),
        }
    }
}
