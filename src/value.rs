//! The dynamic value model and the conversions in and out of it.
//!
//! Everything that goes through the cache is first turned into a [`Value`].
//! The variant picked decides the [`Flag`](crate::codec::Flag) written next to
//! the payload, so the type survives the trip through the store. Reading back
//! is an exact match: a value stored as `i64` is not readable as `i32`, and a
//! mismatch is reported as `None` (a miss), never as an error.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CacheError, CacheResult};

/// A decoded cache value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Raw bytes, stored as-is.
    Bytes(Bytes),
    /// UTF-8 text.
    Text(String),
    /// A 32-bit integer.
    Int32(i32),
    /// A 64-bit integer.
    Int64(i64),
    /// A boolean.
    Boolean(bool),
    /// An 8-bit integer.
    Byte(i8),
    /// Any other serializable value, as a structured tree.
    Object(serde_json::Value),
    /// The absence of a value.
    Null,
}

impl Value {
    /// Build a generic object value from anything serde can serialize.
    ///
    /// Fails with [`CacheError::NotSerializable`] when serialization fails,
    /// e.g. for maps whose keys are not strings.
    pub fn object<T: Serialize + ?Sized>(value: &T) -> CacheResult<Value> {
        serde_json::to_value(value)
            .map(Value::Object)
            .map_err(|e| CacheError::NotSerializable(e.to_string()))
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A short name of the variant, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Boolean(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Object(_) => "object",
            Value::Null => "null",
        }
    }
}

/// Conversion of a Rust value into a cacheable [`Value`].
pub trait ToValue {
    /// Convert `self` into a [`Value`].
    fn to_value(&self) -> CacheResult<Value>;
}

/// Conversion of a decoded [`Value`] back into a Rust type.
///
/// Returning `None` means the stored value has a different type.
pub trait FromValue: Sized {
    /// Try to convert `value` into `Self`.
    fn from_value(value: Value) -> Option<Self>;
}

/// Wrapper that caches any serde type as a generic object.
///
/// ```
/// use pcache::{Object, ToValue, FromValue, Value};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Person { name: String, age: u32 }
///
/// let value = Object(Person { name: "Stanimir".into(), age: 20 }).to_value().unwrap();
/// assert!(matches!(value, Value::Object(_)));
///
/// let Object(person) = Object::<Person>::from_value(value).unwrap();
/// assert_eq!(person.age, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Object<T>(pub T);

impl<T> Object<T> {
    /// Unwrap the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize> ToValue for Object<T> {
    fn to_value(&self) -> CacheResult<Value> {
        Value::object(&self.0)
    }
}

impl<T: DeserializeOwned> FromValue for Object<T> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(tree) => serde_json::from_value(tree).ok().map(Object),
            _ => None,
        }
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> CacheResult<Value> {
        (**self).to_value()
    }
}

impl ToValue for Value {
    fn to_value(&self) -> CacheResult<Value> {
        Ok(self.clone())
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl ToValue for [u8] {
    fn to_value(&self) -> CacheResult<Value> {
        Ok(Value::Bytes(Bytes::copy_from_slice(self)))
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> CacheResult<Value> {
        Ok(Value::Bytes(Bytes::copy_from_slice(self)))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bytes(bytes) => Some(bytes.to_vec()),
            _ => None,
        }
    }
}

impl ToValue for Bytes {
    fn to_value(&self) -> CacheResult<Value> {
        Ok(Value::Bytes(self.clone()))
    }
}

impl FromValue for Bytes {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl ToValue for str {
    fn to_value(&self) -> CacheResult<Value> {
        Ok(Value::Text(self.to_owned()))
    }
}

impl ToValue for String {
    fn to_value(&self) -> CacheResult<Value> {
        Ok(Value::Text(self.clone()))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

// Scalars map one-to-one onto a variant.
macro_rules! scalar_value {
    ($ty:ty, $variant:ident) => {
        impl ToValue for $ty {
            fn to_value(&self) -> CacheResult<Value> {
                Ok(Value::$variant(*self))
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

scalar_value!(bool, Boolean);
scalar_value!(i32, Int32);
scalar_value!(i64, Int64);
scalar_value!(i8, Byte);

/// Characters have no flag of their own; they travel as a generic object
/// holding a one-character string.
impl ToValue for char {
    fn to_value(&self) -> CacheResult<Value> {
        Ok(Value::Object(serde_json::Value::String(self.to_string())))
    }
}

impl FromValue for char {
    fn from_value(value: Value) -> Option<Self> {
        let Value::Object(serde_json::Value::String(s)) = value else {
            return None;
        };
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> CacheResult<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}
