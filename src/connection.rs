//! Framed reads and writes over a TCP stream.

use bytes::{Buf, BytesMut};
use std::io::Cursor;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use crate::error::{StoreError, StoreResult};
use crate::frame::{Frame, FrameError};

/// A TCP stream that sends and receives whole [`Frame`]s.
///
/// Incoming bytes are buffered until a complete frame is available, so a
/// frame split across several TCP reads is handled transparently.
#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(socket: TcpStream) -> Connection {
        Connection {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read the next frame.
    ///
    /// Returns `None` when the peer closed the connection cleanly between
    /// frames. Closing in the middle of a frame is an error.
    pub async fn read_frame(&mut self) -> StoreResult<Option<Frame>> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(StoreError::Protocol(
                    "connection reset by peer mid-frame".to_string(),
                ));
            }
        }
    }

    fn parse_frame(&mut self) -> StoreResult<Option<Frame>> {
        let mut cursor = Cursor::new(&self.buffer[..]);
        match Frame::parse(&mut cursor) {
            Ok(frame) => {
                let len = cursor.position() as usize;
                self.buffer.advance(len);
                Ok(Some(frame))
            }
            Err(FrameError::Incomplete) => Ok(None),
            Err(FrameError::Invalid(message)) => Err(StoreError::Protocol(message)),
        }
    }

    /// Write a frame and flush it to the socket.
    pub async fn write_frame(&mut self, frame: &Frame) -> StoreResult<()> {
        let mut out = BytesMut::new();
        frame.encode(&mut out);
        self.stream.write_all(&out).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
