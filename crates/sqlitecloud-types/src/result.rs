//! Decoded command result representation.

use crate::rowset::Rowset;
use crate::value::Value;

/// Wire type tag identifying the shape of a command result.
///
/// Like [`crate::ValueType`], these are stable small integers assigned by
/// the protocol. `Rowset` doubles as the "row available" outcome of a
/// prepared-statement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResultTag {
    /// Command succeeded with no payload.
    Ok = 0,
    /// Command failed; error details live in the connection error state.
    Error = 1,
    /// Scalar string payload.
    String = 2,
    /// Scalar integer payload.
    Integer = 3,
    /// Scalar floating-point payload.
    Float = 4,
    /// Tabular payload: column names plus typed cells.
    Rowset = 5,
    /// Ordered sequence of typed values.
    Array = 6,
    /// Scalar NULL.
    Null = 7,
    /// Raw JSON text payload.
    Json = 8,
    /// Scalar binary payload.
    Blob = 9,
}

impl ResultTag {
    /// Map a raw wire tag to a known result tag.
    ///
    /// Returns `None` for tags outside the closed set.
    #[must_use]
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Ok),
            1 => Some(Self::Error),
            2 => Some(Self::String),
            3 => Some(Self::Integer),
            4 => Some(Self::Float),
            5 => Some(Self::Rowset),
            6 => Some(Self::Array),
            7 => Some(Self::Null),
            8 => Some(Self::Json),
            9 => Some(Self::Blob),
            _ => None,
        }
    }

    /// The raw wire tag for this result tag.
    #[must_use]
    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// A fully decoded command result.
///
/// Exactly one variant is populated per decode; the driver never returns a
/// partially decoded result.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// The command succeeded and produced no payload.
    Success,
    /// Raw JSON text, not parsed further by the driver.
    Json(String),
    /// A single scalar value (including NULL).
    Value(Value),
    /// An ordered sequence of scalar values.
    Array(Vec<Value>),
    /// A tabular result.
    Rowset(Rowset),
}

impl CommandResult {
    /// Check if this is the payload-less success result.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Get the scalar value, if this result is one.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Get the JSON text, if this result is one.
    #[must_use]
    pub fn as_json(&self) -> Option<&str> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Get the array elements, if this result is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Get the row set, if this result is one.
    #[must_use]
    pub fn as_rowset(&self) -> Option<&Rowset> {
        match self {
            Self::Rowset(v) => Some(v),
            _ => None,
        }
    }

    /// Consume the result and return the row set, if it is one.
    #[must_use]
    pub fn into_rowset(self) -> Option<Rowset> {
        match self {
            Self::Rowset(v) => Some(v),
            _ => None,
        }
    }
}
