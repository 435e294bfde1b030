//! # sqlitecloud-types
//!
//! SQLite Cloud wire value and result model.
//!
//! This crate provides the typed representation of values and results
//! exchanged with a SQLite Cloud server, together with the conversions
//! between wire payloads and Rust types.
//!
//! ## Type Mappings
//!
//! | Wire type | Rust type |
//! |-----------|-----------|
//! | `INTEGER` | `i64` |
//! | `FLOAT` | `f64` |
//! | `TEXT` | `String` |
//! | `BLOB` | `bytes::Bytes` |
//! | `NULL` | `Value::Null` |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod from_value;
pub mod result;
pub mod rowset;
pub mod value;

pub use error::TypeError;
pub use from_value::FromValue;
pub use result::{CommandResult, ResultTag};
pub use rowset::Rowset;
pub use value::{Value, ValueType};
