//! Prepared statements (virtual machines).
//!
//! A [`VirtualMachine`] wraps a query compiled on the server. Parameters
//! are bound by 1-based index, then [`VirtualMachine::step`] advances
//! execution one row at a time. All calls are serialized onto the owning
//! connection's execution context, so a virtual machine can be driven
//! from a different task than the client without interleaving transport
//! access.
//!
//! Finalization is explicit via [`VirtualMachine::close`]; dropping the
//! wrapper does not issue a close on the wire.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use sqlitecloud_types::{ResultTag, Value, ValueType};

use crate::client::Core;
use crate::error::{ExecutionError, Result, VmError};
use crate::transport::{Transport, VmHandle};

/// Outcome of advancing a virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A row is available through the column accessors.
    Row,
    /// Execution finished.
    Done,
}

/// A compiled prepared statement bound to one connection.
pub struct VirtualMachine<T: Transport> {
    core: Arc<Mutex<Core<T>>>,
    handle: VmHandle,
}

impl<T: Transport> VirtualMachine<T> {
    pub(crate) fn new(core: Arc<Mutex<Core<T>>>, handle: VmHandle) -> Self {
        Self { core, handle }
    }

    /// Bind a parameter at a 1-based index.
    ///
    /// Dispatches on the value variant; an out-of-range index or a
    /// transport-side rejection fails with a
    /// [`VmError::Bind`](crate::error::VmError::Bind) error.
    pub async fn bind(&self, index: u32, value: &Value) -> Result<()> {
        let mut core = self.core.lock().await;
        let transport = &mut core.transport;
        let bound = match value {
            Value::Integer(v) => transport.vm_bind_int64(self.handle, index, *v),
            Value::Double(v) => transport.vm_bind_double(self.handle, index, *v),
            Value::String(v) => transport.vm_bind_text(self.handle, index, v),
            Value::Blob(v) => transport.vm_bind_blob(self.handle, index, v),
            Value::Null => transport.vm_bind_null(self.handle, index),
        };
        if bound {
            Ok(())
        } else {
            Err(VmError::Bind {
                index,
                message: transport
                    .vm_error_message(self.handle)
                    .unwrap_or_else(|| "bind rejected".to_owned()),
            }
            .into())
        }
    }

    /// Bind all parameters in order, starting at index 1.
    pub async fn bind_all(&self, values: &[Value]) -> Result<()> {
        for (offset, value) in values.iter().enumerate() {
            self.bind(offset as u32 + 1, value).await?;
        }
        Ok(())
    }

    /// Bind a zero-filled blob of the given length.
    pub async fn bind_zeroblob(&self, index: u32, length: usize) -> Result<()> {
        let mut core = self.core.lock().await;
        let transport = &mut core.transport;
        if transport.vm_bind_zeroblob(self.handle, index, length) {
            Ok(())
        } else {
            Err(VmError::Bind {
                index,
                message: transport
                    .vm_error_message(self.handle)
                    .unwrap_or_else(|| "bind rejected".to_owned()),
            }
            .into())
        }
    }

    /// Advance execution by one row.
    pub async fn step(&self) -> Result<StepOutcome> {
        let mut core = self.core.lock().await;
        let transport = &mut core.transport;
        let tag = transport
            .vm_step(self.handle)
            .await
            .map_err(|e| VmError::Step {
                code: Some(e.code),
                message: e.message,
            })?;
        match ResultTag::from_tag(tag) {
            Some(ResultTag::Rowset) => Ok(StepOutcome::Row),
            Some(ResultTag::Ok | ResultTag::Null) => Ok(StepOutcome::Done),
            _ => Err(VmError::Step {
                code: transport.vm_error_code(self.handle),
                message: transport
                    .vm_error_message(self.handle)
                    .unwrap_or_else(|| "step failed".to_owned()),
            }
            .into()),
        }
    }

    /// Column count of the current row.
    pub async fn column_count(&self) -> u32 {
        let mut core = self.core.lock().await;
        core.transport.vm_column_count(self.handle)
    }

    /// Decode a column of the current row into a typed value.
    ///
    /// The per-tag fan-out matches the result decoder's; an unknown tag
    /// is a fatal decode error.
    pub async fn column_value(&self, index: u32) -> Result<Value> {
        let mut core = self.core.lock().await;
        let transport = &mut core.transport;
        let raw_tag = transport.vm_column_type(self.handle, index);
        let Some(value_type) = ValueType::from_tag(raw_tag) else {
            return Err(ExecutionError::UnsupportedResultType { tag: raw_tag }.into());
        };
        let value = match value_type {
            ValueType::Integer => Value::Integer(transport.vm_column_int64(self.handle, index)),
            ValueType::Float => Value::Double(transport.vm_column_double(self.handle, index)),
            ValueType::Text => Value::String(transport.vm_column_text(self.handle, index)),
            ValueType::Blob => Value::Blob(transport.vm_column_blob(self.handle, index)),
            ValueType::Null => Value::Null,
        };
        Ok(value)
    }

    /// Decode every column of the current row.
    pub async fn row_values(&self) -> Result<Vec<Value>> {
        let count = self.column_count().await;
        let mut values = Vec::with_capacity(count as usize);
        for index in 0..count {
            values.push(self.column_value(index).await?);
        }
        Ok(values)
    }

    /// Decode a column as raw bytes, for blob columns.
    pub async fn column_blob(&self, index: u32) -> Bytes {
        let mut core = self.core.lock().await;
        core.transport.vm_column_blob(self.handle, index)
    }

    /// Row id of the last inserted row.
    pub async fn last_row_id(&self) -> i64 {
        let mut core = self.core.lock().await;
        core.transport.vm_last_row_id(self.handle)
    }

    /// Rows changed by the last step.
    pub async fn changes(&self) -> i64 {
        let mut core = self.core.lock().await;
        core.transport.vm_changes(self.handle)
    }

    /// Total rows changed since the connection opened.
    pub async fn total_changes(&self) -> i64 {
        let mut core = self.core.lock().await;
        core.transport.vm_total_changes(self.handle)
    }

    /// Number of bindable parameters in the compiled query.
    pub async fn bind_parameter_count(&self) -> u32 {
        let mut core = self.core.lock().await;
        core.transport.vm_bind_parameter_count(self.handle)
    }

    /// Finalize the virtual machine on the server.
    ///
    /// Consumes the wrapper, so a machine cannot be stepped after close.
    pub async fn close(self) -> Result<()> {
        let mut core = self.core.lock().await;
        core.transport
            .vm_close(self.handle)
            .await
            .map_err(|e| VmError::Close { message: e.message }.into())
    }
}

impl<T: Transport> std::fmt::Debug for VirtualMachine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("handle", &self.handle)
            .finish()
    }
}
