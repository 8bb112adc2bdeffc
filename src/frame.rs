//! Wire frames exchanged between `pcache-server` and [`RemoteStore`].
//!
//! The format is line-oriented with length-prefixed binary blobs:
//!
//! ```text
//! +OK\r\n              simple string
//! -ERR message\r\n     error
//! :42\r\n              integer
//! $5\r\nhello\r\n      bulk bytes
//! $-1\r\n              null
//! *2\r\n<frame><frame> array
//! ```
//!
//! [`RemoteStore`]: crate::RemoteStore

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::io::Cursor;
use thiserror::Error;

/// Largest bulk payload accepted from a peer.
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Longest CRLF-terminated line accepted from a peer.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Deepest array nesting accepted from a peer. Requests are flat arrays.
pub const MAX_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Not enough data has been buffered to parse a whole frame.
    #[error("incomplete frame")]
    Incomplete,

    /// The bytes do not form a valid frame.
    #[error("invalid frame: {0}")]
    Invalid(String),
}

impl Frame {
    /// A bulk frame holding a copy of `text`.
    pub fn bulk(text: impl AsRef<[u8]>) -> Frame {
        Frame::Bulk(Bytes::copy_from_slice(text.as_ref()))
    }

    /// Parse one frame from the front of `src`, advancing it past the frame.
    ///
    /// Returns [`FrameError::Incomplete`] when `src` ends before the frame
    /// does; the caller should read more data and try again from the start.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, FrameError> {
        Frame::parse_nested(src, 0)
    }

    fn parse_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Frame, FrameError> {
        match get_u8(src)? {
            b'+' => Ok(Frame::Simple(get_text(src)?)),
            b'-' => Ok(Frame::Error(get_text(src)?)),
            b':' => Ok(Frame::Integer(get_integer(src)?)),
            b'$' => {
                let len = get_integer(src)?;
                if len == -1 {
                    return Ok(Frame::Null);
                }
                let len = usize::try_from(len)
                    .ok()
                    .filter(|len| *len <= MAX_BULK_LEN)
                    .ok_or_else(|| FrameError::Invalid(format!("bad bulk length {}", len)))?;

                if src.remaining() < len + 2 {
                    return Err(FrameError::Incomplete);
                }
                let start = src.position() as usize;
                let data = Bytes::copy_from_slice(&src.get_ref()[start..start + len]);
                src.advance(len);
                if get_u8(src)? != b'\r' || get_u8(src)? != b'\n' {
                    return Err(FrameError::Invalid("bulk not terminated by CRLF".into()));
                }
                Ok(Frame::Bulk(data))
            }
            b'*' => {
                if depth >= MAX_DEPTH {
                    return Err(FrameError::Invalid(format!(
                        "arrays nested deeper than {}",
                        MAX_DEPTH
                    )));
                }
                let count = get_integer(src)?;
                let count = usize::try_from(count)
                    .map_err(|_| FrameError::Invalid(format!("bad array length {}", count)))?;
                // Every element takes at least three bytes, so a count larger
                // than what is buffered is only ever incomplete.
                let mut items = Vec::with_capacity(count.min(src.remaining() / 3));
                for _ in 0..count {
                    items.push(Frame::parse_nested(src, depth + 1)?);
                }
                Ok(Frame::Array(items))
            }
            other => Err(FrameError::Invalid(format!(
                "unknown frame type byte {:#04x}",
                other
            ))),
        }
    }

    /// Append the wire form of this frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(text) => {
                dst.put_u8(b'+');
                dst.put_slice(text.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Error(text) => {
                dst.put_u8(b'-');
                dst.put_slice(text.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Integer(n) => {
                dst.put_u8(b':');
                dst.put_slice(n.to_string().as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Bulk(data) => {
                dst.put_u8(b'$');
                dst.put_slice(data.len().to_string().as_bytes());
                dst.put_slice(b"\r\n");
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Frame::Null => dst.put_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                dst.put_u8(b'*');
                dst.put_slice(items.len().to_string().as_bytes());
                dst.put_slice(b"\r\n");
                for item in items {
                    item.encode(dst);
                }
            }
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(text) => f.write_str(text),
            Frame::Error(text) => write!(f, "error: {}", text),
            Frame::Integer(n) => write!(f, "{}", n),
            Frame::Bulk(data) => match std::str::from_utf8(data) {
                Ok(text) => f.write_str(text),
                Err(_) => write!(f, "(binary data: {} bytes)", data.len()),
            },
            Frame::Null => f.write_str("(nil)"),
            Frame::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, FrameError> {
    if !src.has_remaining() {
        return Err(FrameError::Incomplete);
    }
    Ok(src.get_u8())
}

/// Read up to the next CRLF and advance past it.
///
/// Only the first `MAX_LINE_LEN + 2` bytes are searched; a line that does not
/// end within them is invalid rather than incomplete.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], FrameError> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();
    let window = &buf[start..buf.len().min(start + MAX_LINE_LEN + 2)];
    match window.windows(2).position(|w| w == b"\r\n") {
        Some(end) => {
            src.set_position((start + end + 2) as u64);
            Ok(&buf[start..start + end])
        }
        None if window.len() >= MAX_LINE_LEN + 2 => Err(FrameError::Invalid(format!(
            "line longer than {} bytes",
            MAX_LINE_LEN
        ))),
        None => Err(FrameError::Incomplete),
    }
}

fn get_text(src: &mut Cursor<&[u8]>) -> Result<String, FrameError> {
    let line = get_line(src)?;
    String::from_utf8(line.to_vec()).map_err(|_| FrameError::Invalid("non-UTF-8 line".into()))
}

fn get_integer(src: &mut Cursor<&[u8]>) -> Result<i64, FrameError> {
    let line = get_line(src)?;
    std::str::from_utf8(line)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| FrameError::Invalid("malformed integer".into()))
}
