//! Incremental BLOB transfer engine.
//!
//! This module streams blob column values between the server and
//! caller-supplied byte sources/sinks without holding more than one chunk
//! in memory at a time (beyond in-memory destinations the caller asked
//! for). A batch operates on one column across many rows: the handle is
//! opened once for the first row and *reopened* onto each subsequent row
//! id, since handle creation is expensive while repointing is not.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sqlitecloud_client::{BlobInfo, BlobStructure, BlobSink, BlobSource};
//!
//! // Download two image blobs into memory.
//! let structure = BlobStructure::new(BlobInfo::new("photos", "image"))
//!     .row(1, BlobSink::Memory)
//!     .row(2, BlobSink::Memory);
//! let images = client.download_blob(structure, None).await?;
//!
//! // Upload a file, growing the field if it is too small.
//! let structure = BlobStructure::new(BlobInfo::new("photos", "image"))
//!     .row(1, BlobSource::File("portrait.jpg".into()))
//!     .auto_grow(true);
//! client.upload_blob(structure, Some(Box::new(|p| println!("{p:.0}%", p * 100.0)))).await?;
//! ```
//!
//! ## Chunk sizing
//!
//! Values above the size threshold are split into a fixed number of parts
//! (`total / 20` by default), so chunk size grows with the value rather
//! than staying constant; values at or below the threshold move in one
//! chunk. The policy is pluggable per batch, and a chunk is always clamped
//! to the bytes remaining.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::command::Command;
use crate::decode;
use crate::error::{Error, Result, TaskError};
use crate::transport::{BlobHandle, ConnectionHandle, Transport};

/// Default size threshold above which values are chunked: 1 MiB.
pub const DEFAULT_SIZE_THRESHOLD: usize = 1024 * 1024;

/// Default number of parts a chunked value is divided into.
pub const DEFAULT_CHUNK_PARTS: usize = 20;

/// Pluggable chunk-size policy: total value size -> chunk size.
pub type ChunkSizeFn = Arc<dyn Fn(usize) -> usize + Send + Sync>;

/// Batch-level progress callback, invoked with a fraction in `[0, 1]`.
pub type ProgressCallback = Box<dyn FnMut(f64) + Send>;

/// Identifies a blob-typed column, like
/// `SELECT column FROM table WHERE rowid = ?` would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    /// Optional schema qualifier.
    pub schema: Option<String>,
    /// Table name.
    pub table: String,
    /// Column name.
    pub column: String,
}

impl BlobInfo {
    /// Identify a column in the main schema.
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
            column: column.into(),
        }
    }

    /// Add a schema qualifier.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// Byte source for an upload row.
#[derive(Debug, Clone)]
pub enum BlobSource {
    /// Payload held in memory.
    Memory(Bytes),
    /// Payload read from a file.
    File(PathBuf),
}

/// Byte sink for a download row.
#[derive(Debug, Clone)]
pub enum BlobSink {
    /// Collect the value into memory.
    Memory,
    /// Stream the value into a file.
    File(PathBuf),
}

/// Where a downloaded row's bytes ended up.
#[derive(Debug, Clone)]
pub enum BlobData {
    /// The value, for in-memory sinks.
    Memory(Bytes),
    /// The file the value was written to.
    File(PathBuf),
}

impl BlobData {
    /// Get the bytes, for in-memory results.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Memory(bytes) => Some(bytes),
            Self::File(_) => None,
        }
    }
}

/// One row of a blob batch.
#[derive(Debug, Clone)]
pub struct BlobRow<P> {
    /// Row id the blob handle is (re)opened onto.
    pub row_id: i64,
    /// Direction-specific source or sink.
    pub payload: P,
}

/// A blob batch description, consumed by one transfer call.
///
/// Built per operation and not reused: the engine consumes it, and
/// per-row handle reopening is internal.
pub struct BlobStructure<P> {
    pub(crate) info: BlobInfo,
    pub(crate) rows: Vec<BlobRow<P>>,
    pub(crate) size_threshold: usize,
    pub(crate) auto_grow: bool,
    pub(crate) chunk_size_fn: Option<ChunkSizeFn>,
}

/// Batch description for downloads.
pub type BlobReadStructure = BlobStructure<BlobSink>;

/// Batch description for uploads.
pub type BlobWriteStructure = BlobStructure<BlobSource>;

impl<P> BlobStructure<P> {
    /// Start a batch description for a column.
    #[must_use]
    pub fn new(info: BlobInfo) -> Self {
        Self {
            info,
            rows: Vec::new(),
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            auto_grow: true,
            chunk_size_fn: None,
        }
    }

    /// Append a row to the batch.
    #[must_use]
    pub fn row(mut self, row_id: i64, payload: P) -> Self {
        self.rows.push(BlobRow { row_id, payload });
        self
    }

    /// Override the chunking size threshold.
    #[must_use]
    pub fn size_threshold(mut self, bytes: usize) -> Self {
        self.size_threshold = bytes;
        self
    }

    /// Enable or disable automatic field growth on upload.
    #[must_use]
    pub fn auto_grow(mut self, enabled: bool) -> Self {
        self.auto_grow = enabled;
        self
    }

    /// Install a custom chunk-size policy.
    ///
    /// The returned chunk size is clamped so it never exceeds the bytes
    /// remaining in the value.
    #[must_use]
    pub fn chunk_size_fn(mut self, f: impl Fn(usize) -> usize + Send + Sync + 'static) -> Self {
        self.chunk_size_fn = Some(Arc::new(f));
        self
    }

    /// The column this batch targets.
    #[must_use]
    pub fn info(&self) -> &BlobInfo {
        &self.info
    }

    /// The rows in this batch, in processing order.
    #[must_use]
    pub fn rows(&self) -> &[BlobRow<P>] {
        &self.rows
    }

    pub(crate) fn chunk_size(&self, total: usize) -> usize {
        effective_chunk_size(total, self.size_threshold, &self.chunk_size_fn)
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for BlobStructure<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStructure")
            .field("info", &self.info)
            .field("rows", &self.rows)
            .field("size_threshold", &self.size_threshold)
            .field("auto_grow", &self.auto_grow)
            .field("custom_chunk_size", &self.chunk_size_fn.is_some())
            .finish()
    }
}

fn effective_chunk_size(
    total: usize,
    size_threshold: usize,
    custom: &Option<ChunkSizeFn>,
) -> usize {
    let size = match custom {
        Some(f) => f(total),
        None => {
            if total > size_threshold {
                total / DEFAULT_CHUNK_PARTS
            } else {
                total
            }
        }
    };
    size.clamp(1, total.max(1))
}

fn report_progress(
    progress: &mut Option<ProgressCallback>,
    row_index: usize,
    total_rows: usize,
    row_fraction: f64,
) {
    if let Some(callback) = progress.as_mut() {
        callback((row_fraction + row_index as f64) / total_rows as f64);
    }
}

/// Download a batch of blob values.
pub(crate) async fn download<T: Transport + ?Sized>(
    transport: &mut T,
    conn: ConnectionHandle,
    structure: BlobReadStructure,
    progress: &mut Option<ProgressCallback>,
) -> Result<Vec<BlobData>> {
    let BlobStructure {
        info,
        rows,
        size_threshold,
        auto_grow: _,
        chunk_size_fn,
    } = structure;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let handle = transport
        .open_blob(
            conn,
            info.schema.as_deref(),
            &info.table,
            &info.column,
            rows[0].row_id,
            false,
        )
        .await
        .map_err(|e| TaskError::HandlerCreation {
            message: e.to_string(),
        })?;

    let total_rows = rows.len();
    let mut results = Vec::with_capacity(total_rows);
    let mut outcome: Result<()> = Ok(());

    for (index, row) in rows.into_iter().enumerate() {
        if index > 0 {
            match transport.reopen_blob(handle, row.row_id).await {
                Ok(true) => {}
                Ok(false) => {
                    outcome = Err(TaskError::InvalidNumberOfRows.into());
                    break;
                }
                Err(e) => {
                    outcome = Err(e.into());
                    break;
                }
            }
        }
        match download_row(
            transport,
            handle,
            row,
            index,
            total_rows,
            size_threshold,
            &chunk_size_fn,
            progress,
        )
        .await
        {
            Ok(data) => results.push(data),
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    close_handle(transport, handle).await;
    outcome.map(|()| results)
}

#[allow(clippy::too_many_arguments)]
async fn download_row<T: Transport + ?Sized>(
    transport: &mut T,
    handle: BlobHandle,
    row: BlobRow<BlobSink>,
    row_index: usize,
    total_rows: usize,
    size_threshold: usize,
    chunk_size_fn: &Option<ChunkSizeFn>,
    progress: &mut Option<ProgressCallback>,
) -> Result<BlobData> {
    let total = transport.blob_size(handle);
    let mut sink = SinkWriter::open(row.payload).await?;

    if total == 0 {
        report_progress(progress, row_index, total_rows, 1.0);
        return sink.finish().await;
    }

    let chunk = effective_chunk_size(total, size_threshold, chunk_size_fn);
    let mut buffer = vec![0u8; chunk];
    let mut position = 0usize;

    while position < total {
        let want = chunk.min(total - position);
        let got = transport
            .read_blob(handle, &mut buffer[..want], position)
            .await
            .map_err(|_| TaskError::BlobRead { offset: position })?;
        if got == 0 || got > want {
            return Err(TaskError::BlobRead { offset: position }.into());
        }
        sink.write(&buffer[..got]).await?;
        position += got;
        report_progress(
            progress,
            row_index,
            total_rows,
            position as f64 / total as f64,
        );
    }

    sink.finish().await
}

/// Upload a batch of blob values.
pub(crate) async fn upload<T: Transport + ?Sized>(
    transport: &mut T,
    conn: ConnectionHandle,
    structure: BlobWriteStructure,
    progress: &mut Option<ProgressCallback>,
) -> Result<()> {
    let BlobStructure {
        info,
        rows,
        size_threshold,
        auto_grow,
        chunk_size_fn,
    } = structure;

    if rows.is_empty() {
        return Ok(());
    }

    let handle = transport
        .open_blob(
            conn,
            info.schema.as_deref(),
            &info.table,
            &info.column,
            rows[0].row_id,
            true,
        )
        .await
        .map_err(|e| TaskError::HandlerCreation {
            message: e.to_string(),
        })?;

    let total_rows = rows.len();
    let mut outcome: Result<()> = Ok(());

    for (index, row) in rows.into_iter().enumerate() {
        if index > 0 {
            match transport.reopen_blob(handle, row.row_id).await {
                Ok(true) => {}
                Ok(false) => {
                    outcome = Err(TaskError::InvalidNumberOfRows.into());
                    break;
                }
                Err(e) => {
                    outcome = Err(e.into());
                    break;
                }
            }
        }
        if let Err(e) = upload_row(
            transport,
            conn,
            handle,
            &info,
            row,
            index,
            total_rows,
            auto_grow,
            size_threshold,
            &chunk_size_fn,
            progress,
        )
        .await
        {
            outcome = Err(e);
            break;
        }
    }

    close_handle(transport, handle).await;
    outcome
}

#[allow(clippy::too_many_arguments)]
async fn upload_row<T: Transport + ?Sized>(
    transport: &mut T,
    conn: ConnectionHandle,
    handle: BlobHandle,
    info: &BlobInfo,
    row: BlobRow<BlobSource>,
    row_index: usize,
    total_rows: usize,
    auto_grow: bool,
    size_threshold: usize,
    chunk_size_fn: &Option<ChunkSizeFn>,
    progress: &mut Option<ProgressCallback>,
) -> Result<()> {
    let mut source = SourceReader::open(&row.payload).await?;
    let total = source.len();

    // Grow the field before writing when the payload would not fit, then
    // reopen so the handle observes the new capacity.
    if auto_grow && transport.blob_size(handle) < total {
        let expand = Command::expand_blob_field(&info.table, &info.column, total, row.row_id);
        let result = transport
            .execute(conn, &expand.query, &expand.parameters)
            .await
            .map_err(Error::from)?;
        decode::decode_result(transport, conn, result)?;
        match transport.reopen_blob(handle, row.row_id).await {
            Ok(true) => {}
            Ok(false) => return Err(TaskError::InvalidNumberOfRows.into()),
            Err(e) => return Err(e.into()),
        }
    }

    if total == 0 {
        report_progress(progress, row_index, total_rows, 1.0);
        return Ok(());
    }

    let chunk = effective_chunk_size(total, size_threshold, chunk_size_fn);
    let mut buffer = vec![0u8; chunk];
    let mut position = 0usize;

    while position < total {
        let want = chunk.min(total - position);
        source.fill(&mut buffer[..want]).await?;
        let written = transport
            .write_blob(handle, &buffer[..want], position)
            .await
            .map_err(|_| TaskError::BlobWrite { offset: position })?;
        if written != want {
            return Err(TaskError::BlobWrite { offset: position }.into());
        }
        position += want;
        report_progress(
            progress,
            row_index,
            total_rows,
            position as f64 / total as f64,
        );
    }

    Ok(())
}

/// Close the batch handle, exactly once, on success and error paths
/// alike. A close failure never masks the error being propagated.
async fn close_handle<T: Transport + ?Sized>(transport: &mut T, handle: BlobHandle) {
    if let Err(e) = transport.close_blob(handle).await {
        tracing::warn!(error = %e, "failed to close blob handle");
    }
}

enum SinkWriter {
    Memory(Vec<u8>),
    File(tokio::fs::File, PathBuf),
}

impl SinkWriter {
    async fn open(sink: BlobSink) -> Result<Self> {
        match sink {
            BlobSink::Memory => Ok(Self::Memory(Vec::new())),
            BlobSink::File(path) => {
                let file = tokio::fs::File::create(&path)
                    .await
                    .map_err(TaskError::Io)?;
                Ok(Self::File(file, path))
            }
        }
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        match self {
            Self::Memory(buffer) => {
                buffer.extend_from_slice(chunk);
                Ok(())
            }
            Self::File(file, _) => file
                .write_all(chunk)
                .await
                .map_err(|e| TaskError::Io(e).into()),
        }
    }

    async fn finish(self) -> Result<BlobData> {
        match self {
            Self::Memory(buffer) => Ok(BlobData::Memory(Bytes::from(buffer))),
            Self::File(mut file, path) => {
                file.flush().await.map_err(TaskError::Io)?;
                Ok(BlobData::File(path))
            }
        }
    }
}

enum SourceReader {
    Memory { data: Bytes, position: usize },
    File { file: tokio::fs::File, len: usize },
}

impl SourceReader {
    async fn open(source: &BlobSource) -> Result<Self> {
        match source {
            BlobSource::Memory(data) => Ok(Self::Memory {
                data: data.clone(),
                position: 0,
            }),
            BlobSource::File(path) => {
                let file = tokio::fs::File::open(path).await.map_err(TaskError::Io)?;
                let len = file.metadata().await.map_err(TaskError::Io)?.len() as usize;
                Ok(Self::File { file, len })
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Memory { data, .. } => data.len(),
            Self::File { len, .. } => *len,
        }
    }

    async fn fill(&mut self, buffer: &mut [u8]) -> Result<()> {
        match self {
            Self::Memory { data, position } => {
                buffer.copy_from_slice(&data[*position..*position + buffer.len()]);
                *position += buffer.len();
                Ok(())
            }
            Self::File { file, .. } => file
                .read_exact(buffer)
                .await
                .map(|_| ())
                .map_err(|e| TaskError::Io(e).into()),
        }
    }
}
