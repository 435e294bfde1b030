//! Scripted in-memory transport for driver tests.
//!
//! The mock records every transport call and serves canned results from a
//! script queue, so tests can assert on decode behavior, handle lifetimes,
//! blob chunking and LISTEN/UNLISTEN issuance without a server.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;

use sqlitecloud_client::{
    BlobHandle, Config, ConnectionHandle, NotificationCallback, ResultHandle, Transport,
    TransportError, Value, VmHandle,
};

/// A canned outcome for one `execute` call.
pub enum Scripted {
    Success,
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Json(String),
    Blob(Vec<u8>),
    /// Array elements as (raw tag, value) pairs so tests can inject
    /// unsupported tags.
    Array(Vec<(u32, Value)>),
    Rowset {
        columns: Vec<String>,
        cells: Vec<Vec<(u32, Value)>>,
    },
    /// Result with the ERROR tag plus pending connection error state.
    ServerError {
        sqlite: bool,
        code: i32,
        message: String,
        extended: i32,
        offset: i32,
    },
    /// Hard transport failure.
    TransportFailure(i32, String),
}

enum Raw {
    Success,
    Error,
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Json(String),
    Blob(Vec<u8>),
    Array(Vec<(u32, Value)>),
    Rowset {
        columns: Vec<String>,
        cells: Vec<Vec<(u32, Value)>>,
    },
}

struct PendingError {
    sqlite: bool,
    code: i32,
    message: String,
    extended: i32,
    offset: i32,
}

struct MockVm {
    param_count: u32,
    bound: HashMap<u32, Value>,
    rows: VecDeque<Vec<(u32, Value)>>,
    current: Option<Vec<(u32, Value)>>,
    error_message: Option<String>,
}

#[derive(Default)]
struct State {
    next_handle: u64,
    connected: bool,
    connect_error: Option<TransportError>,
    fail_pubsub_only: bool,
    callback_installed: bool,
    callback: Option<NotificationCallback>,

    scripted: VecDeque<Scripted>,
    executed: Vec<(String, Vec<Value>)>,
    results: HashMap<u64, Raw>,
    issued: Vec<u64>,
    freed: Vec<u64>,
    error: Option<PendingError>,

    blob_fields: HashMap<i64, Vec<u8>>,
    blob_row: Option<i64>,
    blob_opens: usize,
    blob_closes: usize,
    blob_reopens: Vec<i64>,
    read_chunks: Vec<usize>,
    write_chunks: Vec<usize>,
    fail_close_blob: bool,
    fail_reads: bool,
    zero_writes: bool,

    vm_rows: VecDeque<Vec<(u32, Value)>>,
    vms: HashMap<u64, MockVm>,
    vm_closes: usize,
}

/// Cloneable handle onto shared mock state; clones observe the transport
/// after it has been moved into a client.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn st(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn mint(state: &mut State) -> u64 {
        state.next_handle += 1;
        state.next_handle
    }

    fn store(state: &mut State, raw: Raw) -> ResultHandle {
        let id = Self::mint(state);
        state.results.insert(id, raw);
        state.issued.push(id);
        ResultHandle::new(id)
    }

    // --- scripting ---

    pub fn script(&self, result: Scripted) {
        self.st().scripted.push_back(result);
    }

    pub fn fail_next_connect(&self, code: i32, message: &str) {
        self.st().connect_error = Some(TransportError::new(code, message));
    }

    pub fn fail_pubsub_only(&self) {
        self.st().fail_pubsub_only = true;
    }

    pub fn set_blob_field(&self, row_id: i64, data: Vec<u8>) {
        self.st().blob_fields.insert(row_id, data);
    }

    pub fn fail_blob_close(&self) {
        self.st().fail_close_blob = true;
    }

    pub fn fail_blob_reads(&self) {
        self.st().fail_reads = true;
    }

    pub fn zero_blob_writes(&self) {
        self.st().zero_writes = true;
    }

    pub fn push_vm_row(&self, row: Vec<(u32, Value)>) {
        self.st().vm_rows.push_back(row);
    }

    pub fn fire_notification(&self, json: &str) {
        let state = self.st();
        let callback = state.callback.as_ref().expect("no pub/sub callback installed");
        callback(json.to_owned());
    }

    // --- observations ---

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.st().executed.clone()
    }

    pub fn executed_queries(&self) -> Vec<String> {
        self.st().executed.iter().map(|(q, _)| q.clone()).collect()
    }

    pub fn is_connected(&self) -> bool {
        self.st().connected
    }

    pub fn callback_installed(&self) -> bool {
        self.st().callback_installed
    }

    /// Every issued result handle was freed exactly once.
    pub fn all_results_freed(&self) -> bool {
        let state = self.st();
        let mut freed = state.freed.clone();
        freed.sort_unstable();
        let mut issued = state.issued.clone();
        issued.sort_unstable();
        freed == issued
    }

    pub fn blob_opens(&self) -> usize {
        self.st().blob_opens
    }

    pub fn blob_closes(&self) -> usize {
        self.st().blob_closes
    }

    pub fn blob_reopens(&self) -> Vec<i64> {
        self.st().blob_reopens.clone()
    }

    pub fn read_chunks(&self) -> Vec<usize> {
        self.st().read_chunks.clone()
    }

    pub fn write_chunks(&self) -> Vec<usize> {
        self.st().write_chunks.clone()
    }

    pub fn blob_field(&self, row_id: i64) -> Vec<u8> {
        self.st().blob_fields.get(&row_id).cloned().unwrap()
    }

    pub fn vm_closes(&self) -> usize {
        self.st().vm_closes
    }
}

fn int_of(value: &Value) -> i64 {
    match value {
        Value::Integer(v) => *v,
        other => panic!("expected integer, got {other:?}"),
    }
}

fn double_of(value: &Value) -> f64 {
    match value {
        Value::Double(v) => *v,
        other => panic!("expected double, got {other:?}"),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(v) => v.clone(),
        other => panic!("expected text, got {other:?}"),
    }
}

fn bytes_of(value: &Value) -> Bytes {
    match value {
        Value::Blob(v) => v.clone(),
        other => panic!("expected blob, got {other:?}"),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, _config: &Config) -> Result<ConnectionHandle, TransportError> {
        let mut state = self.st();
        if let Some(error) = state.connect_error.take() {
            return Err(error);
        }
        state.connected = true;
        let id = Self::mint(&mut state);
        Ok(ConnectionHandle::new(id))
    }

    async fn disconnect(&mut self, _conn: ConnectionHandle) {
        self.st().connected = false;
    }

    fn client_uuid(&mut self, _conn: ConnectionHandle) -> Option<String> {
        self.st()
            .connected
            .then(|| "00000000-mock-uuid".to_owned())
    }

    async fn execute(
        &mut self,
        _conn: ConnectionHandle,
        query: &str,
        parameters: &[Value],
    ) -> Result<ResultHandle, TransportError> {
        let mut state = self.st();
        state.executed.push((query.to_owned(), parameters.to_vec()));

        // Honor zeroblob expansion so auto-grow is observable.
        if query.contains("zeroblob(?)") {
            let size = int_of(&parameters[0]) as usize;
            let row_id = int_of(&parameters[1]);
            state.blob_fields.insert(row_id, vec![0; size]);
        }

        let scripted = state.scripted.pop_front().unwrap_or(Scripted::Success);
        let raw = match scripted {
            Scripted::Success => Raw::Success,
            Scripted::Null => Raw::Null,
            Scripted::Integer(v) => Raw::Integer(v),
            Scripted::Float(v) => Raw::Float(v),
            Scripted::Text(v) => Raw::Text(v),
            Scripted::Json(v) => Raw::Json(v),
            Scripted::Blob(v) => Raw::Blob(v),
            Scripted::Array(v) => Raw::Array(v),
            Scripted::Rowset { columns, cells } => Raw::Rowset { columns, cells },
            Scripted::ServerError {
                sqlite,
                code,
                message,
                extended,
                offset,
            } => {
                state.error = Some(PendingError {
                    sqlite,
                    code,
                    message,
                    extended,
                    offset,
                });
                Raw::Error
            }
            Scripted::TransportFailure(code, message) => {
                return Err(TransportError::new(code, message));
            }
        };
        Ok(Self::store(&mut state, raw))
    }

    fn result_type(&mut self, result: ResultHandle) -> u32 {
        match &self.st().results[&result.raw()] {
            Raw::Success => 0,
            Raw::Error => 1,
            Raw::Text(_) => 2,
            Raw::Integer(_) => 3,
            Raw::Float(_) => 4,
            Raw::Rowset { .. } => 5,
            Raw::Array(_) => 6,
            Raw::Null => 7,
            Raw::Json(_) => 8,
            Raw::Blob(_) => 9,
        }
    }

    fn result_int64(&mut self, result: ResultHandle) -> i64 {
        match &self.st().results[&result.raw()] {
            Raw::Integer(v) => *v,
            _ => panic!("result is not an integer"),
        }
    }

    fn result_double(&mut self, result: ResultHandle) -> f64 {
        match &self.st().results[&result.raw()] {
            Raw::Float(v) => *v,
            _ => panic!("result is not a float"),
        }
    }

    fn result_string(&mut self, result: ResultHandle) -> String {
        match &self.st().results[&result.raw()] {
            Raw::Text(v) | Raw::Json(v) => v.clone(),
            _ => panic!("result is not text"),
        }
    }

    fn result_buffer(&mut self, result: ResultHandle) -> Bytes {
        match &self.st().results[&result.raw()] {
            Raw::Blob(v) => Bytes::from(v.clone()),
            _ => panic!("result is not a blob"),
        }
    }

    fn array_count(&mut self, result: ResultHandle) -> u32 {
        match &self.st().results[&result.raw()] {
            Raw::Array(items) => items.len() as u32,
            _ => panic!("result is not an array"),
        }
    }

    fn array_value_type(&mut self, result: ResultHandle, index: u32) -> u32 {
        match &self.st().results[&result.raw()] {
            Raw::Array(items) => items[index as usize].0,
            _ => panic!("result is not an array"),
        }
    }

    fn array_int64(&mut self, result: ResultHandle, index: u32) -> i64 {
        match &self.st().results[&result.raw()] {
            Raw::Array(items) => int_of(&items[index as usize].1),
            _ => panic!("result is not an array"),
        }
    }

    fn array_double(&mut self, result: ResultHandle, index: u32) -> f64 {
        match &self.st().results[&result.raw()] {
            Raw::Array(items) => double_of(&items[index as usize].1),
            _ => panic!("result is not an array"),
        }
    }

    fn array_string(&mut self, result: ResultHandle, index: u32) -> String {
        match &self.st().results[&result.raw()] {
            Raw::Array(items) => text_of(&items[index as usize].1),
            _ => panic!("result is not an array"),
        }
    }

    fn array_buffer(&mut self, result: ResultHandle, index: u32) -> Bytes {
        match &self.st().results[&result.raw()] {
            Raw::Array(items) => bytes_of(&items[index as usize].1),
            _ => panic!("result is not an array"),
        }
    }

    fn rowset_row_count(&mut self, result: ResultHandle) -> u32 {
        match &self.st().results[&result.raw()] {
            Raw::Rowset { cells, .. } => cells.len() as u32,
            _ => panic!("result is not a rowset"),
        }
    }

    fn rowset_column_count(&mut self, result: ResultHandle) -> u32 {
        match &self.st().results[&result.raw()] {
            Raw::Rowset { columns, .. } => columns.len() as u32,
            _ => panic!("result is not a rowset"),
        }
    }

    fn rowset_column_name(&mut self, result: ResultHandle, column: u32) -> String {
        match &self.st().results[&result.raw()] {
            Raw::Rowset { columns, .. } => columns[column as usize].clone(),
            _ => panic!("result is not a rowset"),
        }
    }

    fn rowset_value_type(&mut self, result: ResultHandle, row: u32, column: u32) -> u32 {
        match &self.st().results[&result.raw()] {
            Raw::Rowset { cells, .. } => cells[row as usize][column as usize].0,
            _ => panic!("result is not a rowset"),
        }
    }

    fn rowset_int64(&mut self, result: ResultHandle, row: u32, column: u32) -> i64 {
        match &self.st().results[&result.raw()] {
            Raw::Rowset { cells, .. } => int_of(&cells[row as usize][column as usize].1),
            _ => panic!("result is not a rowset"),
        }
    }

    fn rowset_double(&mut self, result: ResultHandle, row: u32, column: u32) -> f64 {
        match &self.st().results[&result.raw()] {
            Raw::Rowset { cells, .. } => double_of(&cells[row as usize][column as usize].1),
            _ => panic!("result is not a rowset"),
        }
    }

    fn rowset_string(&mut self, result: ResultHandle, row: u32, column: u32) -> String {
        match &self.st().results[&result.raw()] {
            Raw::Rowset { cells, .. } => text_of(&cells[row as usize][column as usize].1),
            _ => panic!("result is not a rowset"),
        }
    }

    fn rowset_buffer(&mut self, result: ResultHandle, row: u32, column: u32) -> Bytes {
        match &self.st().results[&result.raw()] {
            Raw::Rowset { cells, .. } => bytes_of(&cells[row as usize][column as usize].1),
            _ => panic!("result is not a rowset"),
        }
    }

    fn free_result(&mut self, result: ResultHandle) {
        let mut state = self.st();
        if state.results.remove(&result.raw()).is_none() {
            panic!("double free of result handle {}", result.raw());
        }
        state.freed.push(result.raw());
    }

    async fn open_blob(
        &mut self,
        _conn: ConnectionHandle,
        _schema: Option<&str>,
        _table: &str,
        _column: &str,
        row_id: i64,
        _read_write: bool,
    ) -> Result<BlobHandle, TransportError> {
        let mut state = self.st();
        state.blob_opens += 1;
        if !state.blob_fields.contains_key(&row_id) {
            return Err(TransportError::new(404, format!("no row {row_id}")));
        }
        state.blob_row = Some(row_id);
        let id = Self::mint(&mut state);
        Ok(BlobHandle::new(id))
    }

    async fn reopen_blob(
        &mut self,
        _blob: BlobHandle,
        row_id: i64,
    ) -> Result<bool, TransportError> {
        let mut state = self.st();
        state.blob_reopens.push(row_id);
        if state.blob_fields.contains_key(&row_id) {
            state.blob_row = Some(row_id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn close_blob(&mut self, _blob: BlobHandle) -> Result<(), TransportError> {
        let mut state = self.st();
        state.blob_closes += 1;
        if state.fail_close_blob {
            return Err(TransportError::new(500, "close failed"));
        }
        Ok(())
    }

    fn blob_size(&mut self, _blob: BlobHandle) -> usize {
        let state = self.st();
        let row = state.blob_row.unwrap();
        state.blob_fields[&row].len()
    }

    async fn read_blob(
        &mut self,
        _blob: BlobHandle,
        buf: &mut [u8],
        offset: usize,
    ) -> Result<usize, TransportError> {
        let mut state = self.st();
        state.read_chunks.push(buf.len());
        if state.fail_reads {
            return Err(TransportError::new(500, "read failed"));
        }
        let row = state.blob_row.unwrap();
        let field = &state.blob_fields[&row];
        let available = field.len().saturating_sub(offset).min(buf.len());
        buf[..available].copy_from_slice(&field[offset..offset + available]);
        Ok(available)
    }

    async fn write_blob(
        &mut self,
        _blob: BlobHandle,
        data: &[u8],
        offset: usize,
    ) -> Result<usize, TransportError> {
        let mut state = self.st();
        state.write_chunks.push(data.len());
        if state.zero_writes {
            return Ok(0);
        }
        let row = state.blob_row.unwrap();
        let field = state.blob_fields.get_mut(&row).unwrap();
        if field.len() < offset + data.len() {
            field.resize(offset + data.len(), 0);
        }
        field[offset..offset + data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    async fn vm_compile(
        &mut self,
        _conn: ConnectionHandle,
        query: &str,
    ) -> Result<VmHandle, TransportError> {
        let mut state = self.st();
        let rows = std::mem::take(&mut state.vm_rows);
        let vm = MockVm {
            param_count: query.matches('?').count() as u32,
            bound: HashMap::new(),
            rows,
            current: None,
            error_message: None,
        };
        let id = Self::mint(&mut state);
        state.vms.insert(id, vm);
        Ok(VmHandle::new(id))
    }

    fn vm_bind_int64(&mut self, vm: VmHandle, index: u32, value: i64) -> bool {
        self.bind(vm, index, Value::Integer(value))
    }

    fn vm_bind_double(&mut self, vm: VmHandle, index: u32, value: f64) -> bool {
        self.bind(vm, index, Value::Double(value))
    }

    fn vm_bind_text(&mut self, vm: VmHandle, index: u32, value: &str) -> bool {
        self.bind(vm, index, Value::from(value))
    }

    fn vm_bind_blob(&mut self, vm: VmHandle, index: u32, value: &[u8]) -> bool {
        self.bind(vm, index, Value::from(value.to_vec()))
    }

    fn vm_bind_zeroblob(&mut self, vm: VmHandle, index: u32, length: usize) -> bool {
        self.bind(vm, index, Value::from(vec![0u8; length]))
    }

    fn vm_bind_null(&mut self, vm: VmHandle, index: u32) -> bool {
        self.bind(vm, index, Value::Null)
    }

    async fn vm_step(&mut self, vm: VmHandle) -> Result<u32, TransportError> {
        let mut state = self.st();
        let vm = state.vms.get_mut(&vm.raw()).unwrap();
        vm.current = vm.rows.pop_front();
        if vm.current.is_some() {
            Ok(5) // rowset tag: a row is available
        } else {
            Ok(0) // done
        }
    }

    fn vm_column_count(&mut self, vm: VmHandle) -> u32 {
        let state = self.st();
        state.vms[&vm.raw()].current.as_ref().map_or(0, |r| r.len() as u32)
    }

    fn vm_column_type(&mut self, vm: VmHandle, index: u32) -> u32 {
        let state = self.st();
        state.vms[&vm.raw()].current.as_ref().unwrap()[index as usize].0
    }

    fn vm_column_int64(&mut self, vm: VmHandle, index: u32) -> i64 {
        let state = self.st();
        int_of(&state.vms[&vm.raw()].current.as_ref().unwrap()[index as usize].1)
    }

    fn vm_column_double(&mut self, vm: VmHandle, index: u32) -> f64 {
        let state = self.st();
        double_of(&state.vms[&vm.raw()].current.as_ref().unwrap()[index as usize].1)
    }

    fn vm_column_text(&mut self, vm: VmHandle, index: u32) -> String {
        let state = self.st();
        text_of(&state.vms[&vm.raw()].current.as_ref().unwrap()[index as usize].1)
    }

    fn vm_column_blob(&mut self, vm: VmHandle, index: u32) -> Bytes {
        let state = self.st();
        bytes_of(&state.vms[&vm.raw()].current.as_ref().unwrap()[index as usize].1)
    }

    fn vm_last_row_id(&mut self, _vm: VmHandle) -> i64 {
        42
    }

    fn vm_changes(&mut self, _vm: VmHandle) -> i64 {
        1
    }

    fn vm_total_changes(&mut self, _vm: VmHandle) -> i64 {
        7
    }

    fn vm_bind_parameter_count(&mut self, vm: VmHandle) -> u32 {
        self.st().vms[&vm.raw()].param_count
    }

    async fn vm_close(&mut self, vm: VmHandle) -> Result<(), TransportError> {
        let mut state = self.st();
        state.vms.remove(&vm.raw());
        state.vm_closes += 1;
        Ok(())
    }

    fn vm_error_code(&mut self, vm: VmHandle) -> Option<i32> {
        self.st().vms[&vm.raw()].error_message.as_ref().map(|_| 1)
    }

    fn vm_error_message(&mut self, vm: VmHandle) -> Option<String> {
        self.st().vms[&vm.raw()].error_message.clone()
    }

    fn set_pubsub_callback(&mut self, _conn: ConnectionHandle, callback: NotificationCallback) {
        let mut state = self.st();
        state.callback_installed = true;
        state.callback = Some(callback);
    }

    async fn set_pubsub_only(
        &mut self,
        _conn: ConnectionHandle,
    ) -> Result<ResultHandle, TransportError> {
        let mut state = self.st();
        if state.fail_pubsub_only {
            return Err(TransportError::new(403, "pub/sub-only rejected"));
        }
        Ok(Self::store(&mut state, Raw::Success))
    }

    fn is_error(&mut self, _conn: ConnectionHandle) -> bool {
        self.st().error.is_some()
    }

    fn is_sqlite_error(&mut self, _conn: ConnectionHandle) -> bool {
        self.st().error.as_ref().is_some_and(|e| e.sqlite)
    }

    fn error_code(&mut self, _conn: ConnectionHandle) -> Option<i32> {
        self.st().error.as_ref().map(|e| e.code)
    }

    fn error_message(&mut self, _conn: ConnectionHandle) -> Option<String> {
        self.st().error.as_ref().map(|e| e.message.clone())
    }

    fn extended_error_code(&mut self, _conn: ConnectionHandle) -> Option<i32> {
        self.st().error.as_ref().map(|e| e.extended)
    }

    fn error_offset(&mut self, _conn: ConnectionHandle) -> Option<i32> {
        self.st().error.as_ref().map(|e| e.offset)
    }
}

impl MockTransport {
    fn bind(&self, vm: VmHandle, index: u32, value: Value) -> bool {
        let mut state = self.st();
        let vm = state.vms.get_mut(&vm.raw()).unwrap();
        if index == 0 || index > vm.param_count {
            vm.error_message = Some(format!("parameter index {index} out of range"));
            false
        } else {
            vm.bound.insert(index, value);
            true
        }
    }
}
