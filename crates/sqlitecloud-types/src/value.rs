//! Wire value representation.

use bytes::Bytes;

use crate::error::TypeError;

/// Wire type tag for a scalar value.
///
/// Tags are small positive integers with stable ordering on the wire;
/// they appear both in array/row-set cell headers and in parameter
/// binding metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ValueType {
    /// 64-bit signed integer.
    Integer = 1,
    /// 64-bit IEEE 754 floating point.
    Float = 2,
    /// UTF-8 text.
    Text = 3,
    /// Raw binary payload.
    Blob = 4,
    /// NULL, carrying no payload.
    Null = 5,
}

impl ValueType {
    /// Map a raw wire tag to a known value type.
    ///
    /// Returns `None` for tags outside the closed set; callers must treat
    /// that as a decode failure, never as a silent default.
    #[must_use]
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Self::Integer),
            2 => Some(Self::Float),
            3 => Some(Self::Text),
            4 => Some(Self::Blob),
            5 => Some(Self::Null),
            _ => None,
        }
    }

    /// The raw wire tag for this value type.
    #[must_use]
    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// A scalar value exchanged with SQLite Cloud.
///
/// `Value` is used both for outbound command parameters and for decoded
/// scalar results, array elements and row-set cells. Values are immutable
/// once constructed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// 64-bit signed integer (INTEGER).
    Integer(i64),
    /// 64-bit floating point (FLOAT).
    Double(f64),
    /// UTF-8 string (TEXT).
    String(String),
    /// Binary payload (BLOB).
    Blob(Bytes),
    /// NULL value.
    #[default]
    Null,
}

/// Byte width of a fixed-width scalar payload on the wire.
const SCALAR_WIDTH: usize = 8;

impl Value {
    /// The wire type tag for this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Integer(_) => ValueType::Integer,
            Self::Double(_) => ValueType::Float,
            Self::String(_) => ValueType::Text,
            Self::Blob(_) => ValueType::Blob,
            Self::Null => ValueType::Null,
        }
    }

    /// The wire type name as a string.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "INTEGER",
            Self::Double(_) => "FLOAT",
            Self::String(_) => "TEXT",
            Self::Blob(_) => "BLOB",
            Self::Null => "NULL",
        }
    }

    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as an i64, if it is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an f64, if it is a double.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as bytes, if it is a blob.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(v) => Some(v),
            _ => None,
        }
    }

    /// Encode the value into its wrapped byte form for outbound binding.
    ///
    /// Integers are 8-byte host-endian, doubles are their 8-byte IEEE 754
    /// bit pattern, strings are their UTF-8 bytes, blobs are a zero-copy
    /// view of the payload and NULL carries no bytes.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Integer(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Self::Double(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Self::String(v) => Bytes::copy_from_slice(v.as_bytes()),
            Self::Blob(v) => v.clone(),
            Self::Null => Bytes::new(),
        }
    }

    /// Decode a value of a known wire type from its wrapped byte form.
    ///
    /// This is the inverse of [`Value::encode`] for every value type.
    pub fn decode(value_type: ValueType, payload: Bytes) -> Result<Self, TypeError> {
        match value_type {
            ValueType::Integer => {
                let bytes = fixed_width(&payload)?;
                Ok(Self::Integer(i64::from_ne_bytes(bytes)))
            }
            ValueType::Float => {
                let bytes = fixed_width(&payload)?;
                Ok(Self::Double(f64::from_ne_bytes(bytes)))
            }
            ValueType::Text => {
                let text = String::from_utf8(payload.to_vec())
                    .map_err(|e| TypeError::InvalidEncoding(e.to_string()))?;
                Ok(Self::String(text))
            }
            ValueType::Blob => Ok(Self::Blob(payload)),
            ValueType::Null => Ok(Self::Null),
        }
    }
}

fn fixed_width(payload: &[u8]) -> Result<[u8; SCALAR_WIDTH], TypeError> {
    payload
        .try_into()
        .map_err(|_| TypeError::ScalarLength {
            expected: SCALAR_WIDTH,
            actual: payload.len(),
        })
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Blob(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(Bytes::from(v))
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}
