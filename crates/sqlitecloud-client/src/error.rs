//! Client error types.
//!
//! Errors are grouped into the kinds a caller can meaningfully react to:
//! connection-level failures, execution/decode failures, server-side SQL
//! errors, blob task failures and prepared-statement failures. Every public
//! driver operation either returns a fully-populated success value or fails
//! with exactly one of these kinds.

use thiserror::Error;

/// Errors that can occur during driver operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level connect/auth/network failure, or an operation
    /// attempted without an active connection.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The command succeeded at the transport but produced an unsupported
    /// or unexpected result shape.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Server-side SQL error.
    #[error(transparent)]
    Sqlite(#[from] SqliteError),

    /// Blob upload/download failure.
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Prepared-statement compile/bind/step error.
    #[error("virtual machine error: {0}")]
    VirtualMachine(#[from] VmError),

    /// Sentinel returned when the connection error state is queried but no
    /// error is pending. This is never a real failure; seeing it surfaced
    /// indicates a bug in error-checking order.
    #[error("no error is pending")]
    Unhandled,
}

impl Error {
    /// Check if this is the "not connected" precondition failure.
    #[must_use]
    pub fn is_invalid_connection(&self) -> bool {
        matches!(self, Self::Connection(ConnectionError::InvalidConnection))
    }

    /// Check if this is a connection-level error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this is a server-side SQL error.
    #[must_use]
    pub fn is_sqlite(&self) -> bool {
        matches!(self, Self::Sqlite(_))
    }

    /// Check if this is a blob task error.
    #[must_use]
    pub fn is_task(&self) -> bool {
        matches!(self, Self::Task(_))
    }
}

/// Connection-level failures.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// An operation other than `connect` was attempted on a driver with no
    /// active connection.
    #[error("invalid connection")]
    InvalidConnection,

    /// A connection string could not be parsed.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The transport reported a connect/auth/network failure.
    #[error("connection failed (code {code:?}): {message}")]
    Failed {
        /// Transport error code, when one was reported.
        code: Option<i32>,
        /// Transport error message.
        message: String,
    },
}

/// Decode and result-shape failures.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A result, array element or row-set cell carried a wire type tag
    /// outside the supported set.
    #[error("unsupported result type tag {tag}")]
    UnsupportedResultType {
        /// The unrecognized raw tag.
        tag: u32,
    },

    /// The command produced a result of an unexpected shape.
    #[error("unexpected result shape: {0}")]
    UnexpectedResult(String),
}

/// Server-side SQL error with the extended detail the protocol carries.
#[derive(Debug, Error)]
#[error("sqlite error {code} (extended {extended_code}) at offset {offset}: {message}")]
pub struct SqliteError {
    /// Primary SQLite result code.
    pub code: i32,
    /// Error message text.
    pub message: String,
    /// Extended SQLite result code.
    pub extended_code: i32,
    /// Byte offset into the statement text, or -1 when not applicable.
    pub offset: i32,
}

/// Blob upload/download failures.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The blob handle for the batch could not be created.
    #[error("failed to create blob handler: {message}")]
    HandlerCreation {
        /// Transport-reported reason.
        message: String,
    },

    /// A row id in the batch does not exist in the target table.
    #[error("invalid number of rows for blob operation")]
    InvalidNumberOfRows,

    /// The transport reported a short or failed blob read.
    #[error("error reading blob at offset {offset}")]
    BlobRead {
        /// Byte offset of the failed chunk.
        offset: usize,
    },

    /// The transport reported a short or failed blob write.
    #[error("error writing blob at offset {offset}")]
    BlobWrite {
        /// Byte offset of the failed chunk.
        offset: usize,
    },

    /// A caller-supplied file source or sink failed.
    #[error("blob source/sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Prepared-statement failures.
#[derive(Debug, Error)]
pub enum VmError {
    /// The query could not be compiled.
    #[error("failed to compile query: {message}")]
    Compile {
        /// Transport-reported reason.
        message: String,
    },

    /// A parameter could not be bound, including out-of-range indexes.
    #[error("failed to bind parameter {index}: {message}")]
    Bind {
        /// 1-based parameter index.
        index: u32,
        /// Virtual-machine error message.
        message: String,
    },

    /// A step failed.
    #[error("step failed (code {code:?}): {message}")]
    Step {
        /// Virtual-machine error code, when one was reported.
        code: Option<i32>,
        /// Virtual-machine error message.
        message: String,
    },

    /// The virtual machine could not be finalized.
    #[error("failed to finalize virtual machine: {message}")]
    Close {
        /// Transport-reported reason.
        message: String,
    },
}

impl From<crate::transport::TransportError> for Error {
    fn from(e: crate::transport::TransportError) -> Self {
        Self::Connection(ConnectionError::Failed {
            code: Some(e.code),
            message: e.message,
        })
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, Error>;
