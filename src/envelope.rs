//! The self-describing unit written to the store.
//!
//! Wire format: `[flag: 1 byte][payload: rest]`. The transport delimits the
//! whole thing, so no length prefix is needed.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{self, Flag};
use crate::error::{CacheResult, StoreError, StoreResult};
use crate::value::{ToValue, Value};

/// A payload together with the flag describing its encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    flag: Flag,
    payload: Bytes,
}

impl Envelope {
    /// Wrap an already encoded payload.
    pub fn new(flag: Flag, payload: Bytes) -> Self {
        Self { flag, payload }
    }

    /// Encode `value` with the codec and wrap the result.
    pub fn encode<V: ToValue + ?Sized>(value: &V) -> CacheResult<Self> {
        let (payload, flag) = codec::encode(value)?;
        Ok(Self { flag, payload })
    }

    /// Decode the payload using the flag stored alongside it.
    pub fn decode(&self) -> CacheResult<Value> {
        codec::decode(&self.payload, self.flag)
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Serialize into the wire format.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.payload.len());
        buf.put_u8(self.flag.code());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse the wire format.
    ///
    /// Returns `None` for bytes that were not produced by [`to_bytes`]:
    /// empty input or an unknown flag code. Callers treat that as a miss.
    ///
    /// [`to_bytes`]: Envelope::to_bytes
    pub fn parse_from(raw: &[u8]) -> Option<Self> {
        let (&code, payload) = raw.split_first()?;
        let flag = Flag::from_code(code)?;
        Some(Self {
            flag,
            payload: Bytes::copy_from_slice(payload),
        })
    }
}

/// Apply an atomic increment to the raw bytes currently stored at `key`.
///
/// Store backends call this while holding whatever makes the read-modify-write
/// atomic for them. An absent key starts at `delta` as an `Int64`; existing
/// integers keep their flag and must not overflow its width.
pub(crate) fn increment(key: &str, current: Option<&[u8]>, delta: i64) -> StoreResult<(i64, Bytes)> {
    let not_an_integer = || StoreError::NotAnInteger(key.to_string());

    let Some(raw) = current else {
        let envelope = Envelope::new(Flag::Int64, Bytes::from(delta.to_string()));
        return Ok((delta, envelope.to_bytes()));
    };

    let envelope = Envelope::parse_from(raw).ok_or_else(not_an_integer)?;
    let flag = envelope.flag();
    if !flag.is_integer() {
        return Err(not_an_integer());
    }

    let current: i64 = codec::parse_decimal(envelope.payload()).map_err(|_| not_an_integer())?;
    let next = current.checked_add(delta).ok_or_else(not_an_integer)?;
    let in_range = match flag {
        Flag::Int32 => i32::try_from(next).is_ok(),
        Flag::Byte => i8::try_from(next).is_ok(),
        _ => true,
    };
    if !in_range {
        return Err(not_an_integer());
    }

    let updated = Envelope::new(flag, Bytes::from(next.to_string()));
    Ok((next, updated.to_bytes()))
}
