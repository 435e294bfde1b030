//! Transport capability interface.
//!
//! The driver does not speak the wire protocol itself; it consumes a
//! [`Transport`] implementation that owns connection management, framing
//! and (de)serialization, and exposes results, blobs and prepared
//! statements through opaque handle tokens. This keeps the driver's
//! protocol/result model testable against in-memory transports and keeps
//! TLS and socket concerns out of this crate entirely.
//!
//! ## Handle contract
//!
//! Handles are opaque tokens minted by the transport. They are only
//! meaningful to the transport that issued them, and the driver guarantees
//! single-writer access (§ concurrency model in `client`): no two
//! operations on one connection ever interleave transport calls. A
//! [`ResultHandle`] stays valid until [`Transport::free_result`], which the
//! driver calls exactly once per decoded result.
//!
//! ## Error contract
//!
//! Hard I/O failures surface as [`TransportError`]. Server-reported errors
//! surface as `ERROR`-tagged results plus the connection error-state
//! accessors, which the driver queries immediately after the failing call,
//! before any other transport call can overwrite that state.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use sqlitecloud_types::Value;

use crate::config::Config;

/// Opaque token for an open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(u64);

/// Opaque token for an undecoded command result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultHandle(u64);

/// Opaque token for an open blob handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobHandle(u64);

/// Opaque token for a compiled virtual machine (prepared statement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VmHandle(u64);

macro_rules! impl_handle {
    ($name:ident) => {
        impl $name {
            /// Mint a handle from a transport-chosen raw token.
            #[must_use]
            pub fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw token this handle wraps.
            #[must_use]
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

impl_handle!(ConnectionHandle);
impl_handle!(ResultHandle);
impl_handle!(BlobHandle);
impl_handle!(VmHandle);

/// A hard transport failure (socket, framing, timeout).
#[derive(Debug, Clone, Error)]
#[error("transport error {code}: {message}")]
pub struct TransportError {
    /// Transport-assigned error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

impl TransportError {
    /// Build a transport error from a code and message.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Callback invoked by the transport for every pub/sub notification,
/// carrying the notification's raw JSON text.
///
/// Invoked on whatever thread the transport delivers notifications from;
/// implementations must not assume the driver's execution context.
pub type NotificationCallback = Box<dyn Fn(String) + Send + Sync>;

/// The capability interface the driver consumes.
///
/// Accessor methods (result/blob/vm reads, error state) are infallible by
/// contract: the driver only calls them with handles it has been issued
/// and not yet released.
#[async_trait]
pub trait Transport: Send {
    // --- connection lifecycle ---

    /// Open a connection described by `config`.
    async fn connect(&mut self, config: &Config) -> Result<ConnectionHandle, TransportError>;

    /// Close a connection. Infallible; the connection is gone either way.
    async fn disconnect(&mut self, conn: ConnectionHandle);

    /// The server-assigned client UUID for an active connection.
    fn client_uuid(&mut self, conn: ConnectionHandle) -> Option<String>;

    // --- command execution ---

    /// Execute a parameterized command and return the undecoded result.
    async fn execute(
        &mut self,
        conn: ConnectionHandle,
        query: &str,
        parameters: &[Value],
    ) -> Result<ResultHandle, TransportError>;

    // --- result accessors ---

    /// Raw wire tag of a result.
    fn result_type(&mut self, result: ResultHandle) -> u32;
    /// Scalar integer payload.
    fn result_int64(&mut self, result: ResultHandle) -> i64;
    /// Scalar floating-point payload.
    fn result_double(&mut self, result: ResultHandle) -> f64;
    /// Scalar text (or JSON) payload.
    fn result_string(&mut self, result: ResultHandle) -> String;
    /// Scalar binary payload.
    fn result_buffer(&mut self, result: ResultHandle) -> Bytes;

    /// Element count of an array result.
    fn array_count(&mut self, result: ResultHandle) -> u32;
    /// Raw wire tag of an array element.
    fn array_value_type(&mut self, result: ResultHandle, index: u32) -> u32;
    /// Integer array element.
    fn array_int64(&mut self, result: ResultHandle, index: u32) -> i64;
    /// Floating-point array element.
    fn array_double(&mut self, result: ResultHandle, index: u32) -> f64;
    /// Text array element.
    fn array_string(&mut self, result: ResultHandle, index: u32) -> String;
    /// Binary array element.
    fn array_buffer(&mut self, result: ResultHandle, index: u32) -> Bytes;

    /// Row count of a row-set result.
    fn rowset_row_count(&mut self, result: ResultHandle) -> u32;
    /// Column count of a row-set result.
    fn rowset_column_count(&mut self, result: ResultHandle) -> u32;
    /// Column name in wire order.
    fn rowset_column_name(&mut self, result: ResultHandle, column: u32) -> String;
    /// Raw wire tag of a row-set cell.
    fn rowset_value_type(&mut self, result: ResultHandle, row: u32, column: u32) -> u32;
    /// Integer row-set cell.
    fn rowset_int64(&mut self, result: ResultHandle, row: u32, column: u32) -> i64;
    /// Floating-point row-set cell.
    fn rowset_double(&mut self, result: ResultHandle, row: u32, column: u32) -> f64;
    /// Text row-set cell.
    fn rowset_string(&mut self, result: ResultHandle, row: u32, column: u32) -> String;
    /// Binary row-set cell.
    fn rowset_buffer(&mut self, result: ResultHandle, row: u32, column: u32) -> Bytes;

    /// Release a result. Must be called exactly once per issued handle.
    fn free_result(&mut self, result: ResultHandle);

    // --- blob I/O ---

    /// Open a blob handle onto one row of a blob column.
    async fn open_blob(
        &mut self,
        conn: ConnectionHandle,
        schema: Option<&str>,
        table: &str,
        column: &str,
        row_id: i64,
        read_write: bool,
    ) -> Result<BlobHandle, TransportError>;

    /// Repoint an open blob handle at a different row.
    ///
    /// Returns `Ok(false)` when the requested row does not exist (the
    /// underlying reopen reported a no-op).
    async fn reopen_blob(
        &mut self,
        blob: BlobHandle,
        row_id: i64,
    ) -> Result<bool, TransportError>;

    /// Close a blob handle.
    async fn close_blob(&mut self, blob: BlobHandle) -> Result<(), TransportError>;

    /// Total byte size of the blob field the handle currently points at.
    fn blob_size(&mut self, blob: BlobHandle) -> usize;

    /// Read up to `buf.len()` bytes starting at `offset`; returns the
    /// number of bytes read.
    async fn read_blob(
        &mut self,
        blob: BlobHandle,
        buf: &mut [u8],
        offset: usize,
    ) -> Result<usize, TransportError>;

    /// Write `data` starting at `offset`; returns the number of bytes
    /// written.
    async fn write_blob(
        &mut self,
        blob: BlobHandle,
        data: &[u8],
        offset: usize,
    ) -> Result<usize, TransportError>;

    // --- prepared statements ---

    /// Compile a query into a virtual machine.
    async fn vm_compile(
        &mut self,
        conn: ConnectionHandle,
        query: &str,
    ) -> Result<VmHandle, TransportError>;

    /// Bind an integer parameter (1-based index). `false` means the bind
    /// was rejected; details are in the VM error accessors.
    fn vm_bind_int64(&mut self, vm: VmHandle, index: u32, value: i64) -> bool;
    /// Bind a floating-point parameter.
    fn vm_bind_double(&mut self, vm: VmHandle, index: u32, value: f64) -> bool;
    /// Bind a text parameter.
    fn vm_bind_text(&mut self, vm: VmHandle, index: u32, value: &str) -> bool;
    /// Bind a binary parameter.
    fn vm_bind_blob(&mut self, vm: VmHandle, index: u32, value: &[u8]) -> bool;
    /// Bind a zero-filled blob of the given length.
    fn vm_bind_zeroblob(&mut self, vm: VmHandle, index: u32, length: usize) -> bool;
    /// Bind NULL.
    fn vm_bind_null(&mut self, vm: VmHandle, index: u32) -> bool;

    /// Advance the virtual machine; returns the raw result tag of the
    /// step outcome (row-set tag when a row is available, OK when done).
    async fn vm_step(&mut self, vm: VmHandle) -> Result<u32, TransportError>;

    /// Column count of the current row.
    fn vm_column_count(&mut self, vm: VmHandle) -> u32;
    /// Raw wire tag of a column in the current row.
    fn vm_column_type(&mut self, vm: VmHandle, index: u32) -> u32;
    /// Integer column of the current row.
    fn vm_column_int64(&mut self, vm: VmHandle, index: u32) -> i64;
    /// Floating-point column of the current row.
    fn vm_column_double(&mut self, vm: VmHandle, index: u32) -> f64;
    /// Text column of the current row.
    fn vm_column_text(&mut self, vm: VmHandle, index: u32) -> String;
    /// Binary column of the current row.
    fn vm_column_blob(&mut self, vm: VmHandle, index: u32) -> Bytes;

    /// Row id of the last inserted row.
    fn vm_last_row_id(&mut self, vm: VmHandle) -> i64;
    /// Rows changed by the last step.
    fn vm_changes(&mut self, vm: VmHandle) -> i64;
    /// Total rows changed since the connection opened.
    fn vm_total_changes(&mut self, vm: VmHandle) -> i64;
    /// Number of bindable parameters in the compiled query.
    fn vm_bind_parameter_count(&mut self, vm: VmHandle) -> u32;

    /// Finalize the virtual machine.
    async fn vm_close(&mut self, vm: VmHandle) -> Result<(), TransportError>;

    /// Virtual-machine error code, when one is pending.
    fn vm_error_code(&mut self, vm: VmHandle) -> Option<i32>;
    /// Virtual-machine error message, when one is pending.
    fn vm_error_message(&mut self, vm: VmHandle) -> Option<String>;

    // --- pub/sub ---

    /// Install the notification callback for a connection.
    fn set_pubsub_callback(&mut self, conn: ConnectionHandle, callback: NotificationCallback);

    /// Switch the connection into pub/sub-only mode.
    async fn set_pubsub_only(
        &mut self,
        conn: ConnectionHandle,
    ) -> Result<ResultHandle, TransportError>;

    // --- connection error state ---

    /// Check whether an error is pending on the connection.
    fn is_error(&mut self, conn: ConnectionHandle) -> bool;
    /// Check whether the pending error is a server-side SQL error.
    fn is_sqlite_error(&mut self, conn: ConnectionHandle) -> bool;
    /// Pending error code.
    fn error_code(&mut self, conn: ConnectionHandle) -> Option<i32>;
    /// Pending error message.
    fn error_message(&mut self, conn: ConnectionHandle) -> Option<String>;
    /// Pending extended SQL error code.
    fn extended_error_code(&mut self, conn: ConnectionHandle) -> Option<i32>;
    /// Pending statement byte offset for SQL errors.
    fn error_offset(&mut self, conn: ConnectionHandle) -> Option<i32>;
}
