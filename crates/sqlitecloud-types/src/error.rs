//! Type conversion error types.

use thiserror::Error;

/// Errors that can occur while converting wire payloads or typed values.
#[derive(Debug, Error)]
pub enum TypeError {
    /// Value is null when non-null was expected.
    #[error("unexpected null value")]
    UnexpectedNull,

    /// Type mismatch during conversion.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        actual: String,
    },

    /// Invalid encoding in string data.
    #[error("invalid string encoding: {0}")]
    InvalidEncoding(String),

    /// A fixed-width scalar payload had the wrong length.
    #[error("scalar payload is {actual} bytes, expected {expected}")]
    ScalarLength {
        /// Bytes expected for the scalar.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// A row set row does not match the column count.
    #[error("row {row} has {actual} values, expected {expected}")]
    RowArity {
        /// Row index (0-based).
        row: usize,
        /// Expected value count (the column count).
        expected: usize,
        /// Actual value count.
        actual: usize,
    },

    /// A requested cell does not exist.
    #[error("no value at row {row}, column {column}")]
    NoSuchCell {
        /// Row index (0-based).
        row: usize,
        /// Column index (0-based).
        column: usize,
    },

    /// A requested column name does not exist.
    #[error("unknown column: {0}")]
    UnknownColumn(String),
}
