//! Trait for converting decoded wire values to Rust types.

use bytes::Bytes;

use crate::error::TypeError;
use crate::value::Value;

/// Trait for types that can be extracted from a decoded [`Value`].
///
/// Implemented for the Rust types this protocol's value model maps onto,
/// enabling type-safe extraction from scalar results and row-set cells.
pub trait FromValue: Sized {
    /// Convert from a decoded value to this type.
    fn from_value(value: &Value) -> Result<Self, TypeError>;

    /// Convert from an optional value.
    ///
    /// Returns `None` if the value is NULL.
    fn from_value_nullable(value: &Value) -> Result<Option<Self>, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_value(value).map(Some)
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Integer(v) => Ok(*v),
            Value::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::TypeMismatch {
                expected: "i64",
                actual: value.type_name().to_owned(),
            }),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Double(v) => Ok(*v),
            Value::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::TypeMismatch {
                expected: "f64",
                actual: value.type_name().to_owned(),
            }),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Integer(v) => Ok(*v != 0),
            Value::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::TypeMismatch {
                expected: "bool",
                actual: value.type_name().to_owned(),
            }),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::String(v) => Ok(v.clone()),
            Value::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::TypeMismatch {
                expected: "String",
                actual: value.type_name().to_owned(),
            }),
        }
    }
}

impl FromValue for Bytes {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Blob(v) => Ok(v.clone()),
            Value::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::TypeMismatch {
                expected: "Bytes",
                actual: value.type_name().to_owned(),
            }),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        Bytes::from_value(value).map(|b| b.to_vec())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        T::from_value_nullable(value)
    }
}
