//! Typed codec: [`Value`] to tagged bytes and back.
//!
//! The flag written next to a payload is the only thing `decode` looks at to
//! choose a decoding strategy; it never sniffs the bytes.

use bytes::Bytes;

use crate::error::{CacheError, CacheResult};
use crate::value::{ToValue, Value};

/// Identifies how a payload was encoded.
///
/// The discriminants are the stable wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Flag {
    Bytes = 0,
    Utf8Text = 1,
    GenericObject = 2,
    Int32 = 3,
    Int64 = 4,
    Boolean = 5,
    Byte = 6,
}

impl Flag {
    /// The stable wire code of this flag.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a flag by its wire code.
    pub fn from_code(code: u8) -> Option<Flag> {
        match code {
            0 => Some(Flag::Bytes),
            1 => Some(Flag::Utf8Text),
            2 => Some(Flag::GenericObject),
            3 => Some(Flag::Int32),
            4 => Some(Flag::Int64),
            5 => Some(Flag::Boolean),
            6 => Some(Flag::Byte),
            _ => None,
        }
    }

    /// Returns `true` for the flags `increment` can operate on.
    pub fn is_integer(self) -> bool {
        matches!(self, Flag::Int32 | Flag::Int64 | Flag::Byte)
    }
}

const TRUE_BYTE: u8 = b'1';
const FALSE_BYTE: u8 = b'0';

/// Encode anything convertible to a [`Value`].
pub fn encode<V: ToValue + ?Sized>(value: &V) -> CacheResult<(Bytes, Flag)> {
    encode_value(&value.to_value()?)
}

/// Encode a [`Value`] into its payload and flag.
pub fn encode_value(value: &Value) -> CacheResult<(Bytes, Flag)> {
    let encoded = match value {
        Value::Bytes(bytes) => (bytes.clone(), Flag::Bytes),
        Value::Boolean(b) => {
            let byte = if *b { TRUE_BYTE } else { FALSE_BYTE };
            (Bytes::copy_from_slice(&[byte]), Flag::Boolean)
        }
        Value::Text(text) => (Bytes::copy_from_slice(text.as_bytes()), Flag::Utf8Text),
        Value::Int32(n) => (Bytes::from(n.to_string()), Flag::Int32),
        Value::Int64(n) => (Bytes::from(n.to_string()), Flag::Int64),
        Value::Byte(n) => (Bytes::from(n.to_string()), Flag::Byte),
        Value::Null => (Bytes::new(), Flag::GenericObject),
        Value::Object(tree) => {
            let payload =
                serde_json::to_vec(tree).map_err(|e| CacheError::NotSerializable(e.to_string()))?;
            (Bytes::from(payload), Flag::GenericObject)
        }
    };
    Ok(encoded)
}

/// Decode a payload using the flag that was written with it.
pub fn decode(payload: &[u8], flag: Flag) -> CacheResult<Value> {
    match flag {
        Flag::Bytes => Ok(Value::Bytes(Bytes::copy_from_slice(payload))),
        Flag::Utf8Text => std::str::from_utf8(payload)
            .map(|s| Value::Text(s.to_owned()))
            .map_err(|e| CacheError::CorruptPayload(format!("invalid UTF-8 text: {}", e))),
        Flag::Int32 => parse_decimal(payload).map(Value::Int32),
        Flag::Int64 => parse_decimal(payload).map(Value::Int64),
        Flag::Byte => parse_decimal(payload).map(Value::Byte),
        Flag::Boolean => match payload {
            [TRUE_BYTE] => Ok(Value::Boolean(true)),
            [FALSE_BYTE] => Ok(Value::Boolean(false)),
            _ => Err(CacheError::CorruptPayload(
                "cannot decode boolean: bad contents".to_string(),
            )),
        },
        Flag::GenericObject if payload.is_empty() => Ok(Value::Null),
        Flag::GenericObject => serde_json::from_slice(payload)
            .map(Value::Object)
            .map_err(|e| CacheError::CorruptPayload(format!("cannot read object: {}", e))),
    }
}

/// Parse ASCII decimal digits into an integer of the flag's width.
pub(crate) fn parse_decimal<T: std::str::FromStr>(payload: &[u8]) -> CacheResult<T> {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| CacheError::CorruptPayload("cannot decode number: bad contents".to_string()))
}
