//! Result decoding.
//!
//! Converts an undecoded transport result into exactly one
//! [`CommandResult`] variant. Unknown wire tags — at the top level, in an
//! array element or in a row-set cell — are fatal: decoding fails and no
//! partial result is returned. The result handle is released exactly
//! once, on success and on every error path.

use sqlitecloud_types::{CommandResult, ResultTag, Rowset, Value, ValueType};

use crate::error::{ConnectionError, Error, ExecutionError, Result, SqliteError};
use crate::transport::{ConnectionHandle, ResultHandle, Transport};

/// Decode a result and release its handle.
pub(crate) fn decode_result<T: Transport + ?Sized>(
    transport: &mut T,
    conn: ConnectionHandle,
    result: ResultHandle,
) -> Result<CommandResult> {
    let decoded = decode_inner(transport, conn, result);
    transport.free_result(result);
    decoded
}

fn decode_inner<T: Transport + ?Sized>(
    transport: &mut T,
    conn: ConnectionHandle,
    result: ResultHandle,
) -> Result<CommandResult> {
    let raw_tag = transport.result_type(result);
    let Some(tag) = ResultTag::from_tag(raw_tag) else {
        return Err(ExecutionError::UnsupportedResultType { tag: raw_tag }.into());
    };

    match tag {
        ResultTag::Ok => Ok(CommandResult::Success),
        ResultTag::Error => Err(pending_error(transport, conn)),
        ResultTag::Null => Ok(CommandResult::Value(Value::Null)),
        ResultTag::Integer => Ok(CommandResult::Value(Value::Integer(
            transport.result_int64(result),
        ))),
        ResultTag::Float => Ok(CommandResult::Value(Value::Double(
            transport.result_double(result),
        ))),
        ResultTag::String => Ok(CommandResult::Value(Value::String(
            transport.result_string(result),
        ))),
        ResultTag::Json => Ok(CommandResult::Json(transport.result_string(result))),
        ResultTag::Blob => Ok(CommandResult::Value(Value::Blob(
            transport.result_buffer(result),
        ))),
        ResultTag::Array => decode_array(transport, result),
        ResultTag::Rowset => decode_rowset(transport, result),
    }
}

fn decode_array<T: Transport + ?Sized>(
    transport: &mut T,
    result: ResultHandle,
) -> Result<CommandResult> {
    let count = transport.array_count(result);
    let mut values = Vec::with_capacity(count as usize);
    for index in 0..count {
        let raw_tag = transport.array_value_type(result, index);
        let Some(value_type) = ValueType::from_tag(raw_tag) else {
            return Err(ExecutionError::UnsupportedResultType { tag: raw_tag }.into());
        };
        let value = match value_type {
            ValueType::Integer => Value::Integer(transport.array_int64(result, index)),
            ValueType::Float => Value::Double(transport.array_double(result, index)),
            ValueType::Text => Value::String(transport.array_string(result, index)),
            ValueType::Blob => Value::Blob(transport.array_buffer(result, index)),
            ValueType::Null => Value::Null,
        };
        values.push(value);
    }
    Ok(CommandResult::Array(values))
}

fn decode_rowset<T: Transport + ?Sized>(
    transport: &mut T,
    result: ResultHandle,
) -> Result<CommandResult> {
    let row_count = transport.rowset_row_count(result);
    let column_count = transport.rowset_column_count(result);

    let mut columns = Vec::with_capacity(column_count as usize);
    for column in 0..column_count {
        columns.push(transport.rowset_column_name(result, column));
    }

    let mut rows = Vec::with_capacity(row_count as usize);
    for row in 0..row_count {
        let mut cells = Vec::with_capacity(column_count as usize);
        for column in 0..column_count {
            let raw_tag = transport.rowset_value_type(result, row, column);
            let Some(value_type) = ValueType::from_tag(raw_tag) else {
                return Err(ExecutionError::UnsupportedResultType { tag: raw_tag }.into());
            };
            let value = match value_type {
                ValueType::Integer => Value::Integer(transport.rowset_int64(result, row, column)),
                ValueType::Float => Value::Double(transport.rowset_double(result, row, column)),
                ValueType::Text => Value::String(transport.rowset_string(result, row, column)),
                ValueType::Blob => Value::Blob(transport.rowset_buffer(result, row, column)),
                ValueType::Null => Value::Null,
            };
            cells.push(value);
        }
        rows.push(cells);
    }

    let rowset = Rowset::new(columns, rows)
        .map_err(|e| ExecutionError::UnexpectedResult(e.to_string()))?;
    Ok(CommandResult::Rowset(rowset))
}

/// Assemble the structured error pending on a connection.
///
/// Must be called immediately after the failing transport call, before any
/// other transport call can overwrite the connection error state. Returns
/// the [`Error::Unhandled`] sentinel when no error is actually pending,
/// which indicates a bug in error-checking order rather than a runtime
/// condition.
pub(crate) fn pending_error<T: Transport + ?Sized>(
    transport: &mut T,
    conn: ConnectionHandle,
) -> Error {
    if !transport.is_error(conn) {
        return Error::Unhandled;
    }
    let code = transport.error_code(conn);
    let message = transport.error_message(conn).unwrap_or_default();
    if transport.is_sqlite_error(conn) {
        Error::Sqlite(SqliteError {
            code: code.unwrap_or_default(),
            message,
            extended_code: transport.extended_error_code(conn).unwrap_or_default(),
            offset: transport.error_offset(conn).unwrap_or(-1),
        })
    } else {
        Error::Connection(ConnectionError::Failed { code, message })
    }
}
