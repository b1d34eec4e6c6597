//! Common test utilities and helpers
//!
//! An in-memory driver (connection, command, transaction, reader) and a
//! profiler that records every notification it receives.

#![allow(dead_code)]

use std::any::Any;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use dbprofiler::db::{
    BindByNameFn, CommandBehavior, CommandClone, CommandType, ConnectionClone, ConnectionState,
    DataTable, DataType, DbCommand, DbConnection, DbParameter, DbParameterCollection, DbReader,
    DbTransaction, DbValue, IsolationLevel, StateChangeEvent, StateChangeEvents,
    StateChangeHandler, SubscriptionId, UpdateRowSource,
};
use dbprofiler::error::{DbError, DbResult};
use dbprofiler::profiled::{ProfiledCommand, ProfiledReader};
use dbprofiler::profiler::{DbProfiler, SqlExecuteType};
use uuid::Uuid;

/// Install a tracing subscriber writing to the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dbprofiler=trace")
        .with_test_writer()
        .try_init();
}

/// In-memory sink for formatted log lines
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// A subscriber writing `debug` and above into this capture, for use with
    /// `tracing::subscriber::with_default`
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        let sink = self.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Canned results returned by every command a [`FakeConnection`] creates
#[derive(Debug, Clone)]
pub struct Script {
    pub non_query: DbResult<i64>,
    pub scalar: DbResult<DbValue>,
    pub reader: DbResult<Vec<Vec<DbValue>>>,
    pub columns: Vec<&'static str>,
    pub commit: DbResult<()>,
    pub panic_on_execute: bool,
    pub duplicable: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            non_query: Ok(1),
            scalar: Ok(DbValue::Integer(42)),
            reader: Ok(vec![
                vec![DbValue::Integer(1), DbValue::Text("alpha".into())],
                vec![DbValue::Integer(2), DbValue::Text("beta".into())],
            ]),
            columns: vec!["id", "name"],
            commit: Ok(()),
            panic_on_execute: false,
            duplicable: false,
        }
    }
}

/// Driver error with a native code, as a real driver would raise
pub fn driver_error() -> DbError {
    DbError::Driver {
        code: 2627,
        message: "Violation of PRIMARY KEY constraint".into(),
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

pub struct FakeConnection {
    state: Mutex<ConnectionState>,
    connection_string: Mutex<String>,
    database: Mutex<String>,
    events: StateChangeEvents,
    duplicable: bool,
    script: Mutex<Script>,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub reader_closes: Arc<AtomicUsize>,
    this: Weak<FakeConnection>,
}

impl FakeConnection {
    pub fn new() -> Arc<Self> {
        Self::build(Script::default(), false)
    }

    pub fn with_script(script: Script) -> Arc<Self> {
        Self::build(script, false)
    }

    /// A connection that supports duplication
    pub fn duplicable() -> Arc<Self> {
        Self::build(Script::default(), true)
    }

    fn build(script: Script, duplicable: bool) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            state: Mutex::new(ConnectionState::Closed),
            connection_string: Mutex::new("Data Source=fake;Initial Catalog=main".into()),
            database: Mutex::new("main".into()),
            events: StateChangeEvents::new(),
            duplicable,
            script: Mutex::new(script),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            reader_closes: Arc::new(AtomicUsize::new(0)),
            this: this.clone(),
        })
    }

    pub fn as_dyn(self: &Arc<Self>) -> Arc<dyn DbConnection> {
        Arc::clone(self) as Arc<dyn DbConnection>
    }

    pub fn subscribers(&self) -> usize {
        self.events.len()
    }

    /// Move to `state`, notifying subscribers if it changed
    pub fn set_state(&self, state: ConnectionState) {
        let original = std::mem::replace(&mut *self.state.lock().unwrap(), state);
        if original != state {
            self.events.raise(&StateChangeEvent::new(original, state));
        }
    }
}

impl DbConnection for FakeConnection {
    fn connection_string(&self) -> String {
        self.connection_string.lock().unwrap().clone()
    }

    fn set_connection_string(&self, value: &str) -> DbResult<()> {
        if self.state() == ConnectionState::Open {
            return Err(DbError::QueryFailed("connection is open".into()));
        }
        *self.connection_string.lock().unwrap() = value.to_string();
        Ok(())
    }

    fn connection_timeout(&self) -> Duration {
        Duration::from_secs(15)
    }

    fn database(&self) -> String {
        self.database.lock().unwrap().clone()
    }

    fn data_source(&self) -> String {
        "fake".into()
    }

    fn server_version(&self) -> DbResult<String> {
        match self.state() {
            ConnectionState::Open => Ok("1.0-fake".into()),
            _ => Err(DbError::NotConnected),
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    fn open(&self) -> DbResult<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.set_state(ConnectionState::Open);
        Ok(())
    }

    fn close(&self) -> DbResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.set_state(ConnectionState::Closed);
        Ok(())
    }

    fn change_database(&self, name: &str) -> DbResult<()> {
        if self.state() != ConnectionState::Open {
            return Err(DbError::NotConnected);
        }
        *self.database.lock().unwrap() = name.to_string();
        Ok(())
    }

    fn enlist_transaction(&self, _transaction: Option<Uuid>) -> DbResult<()> {
        Ok(())
    }

    fn get_schema_restricted(
        &self,
        collection: &str,
        restrictions: &[Option<String>],
    ) -> DbResult<DataTable> {
        Ok(DataTable {
            name: collection.to_string(),
            columns: Vec::new(),
            rows: restrictions
                .iter()
                .map(|r| dbprofiler::db::Row {
                    values: vec![r.clone().map_or(DbValue::Null, DbValue::Text)],
                })
                .collect(),
        })
    }

    fn begin_transaction(&self, level: IsolationLevel) -> DbResult<Arc<dyn DbTransaction>> {
        if self.state() != ConnectionState::Open {
            return Err(DbError::NotConnected);
        }
        let connection = self.this.upgrade().map(|c| c as Arc<dyn DbConnection>);
        let commit = self.script.lock().unwrap().commit.clone();
        Ok(Arc::new(FakeTransaction::new(level, connection, commit)))
    }

    fn create_command(&self) -> DbResult<Box<dyn DbCommand>> {
        let mut command: FakeCommand = FakeCommand::new(self.script.lock().unwrap().clone());
        command.reader_closes = Arc::clone(&self.reader_closes);
        command.connection = self.this.upgrade().map(|c| c as Arc<dyn DbConnection>);
        Ok(Box::new(command))
    }

    fn subscribe_state_change(&self, handler: StateChangeHandler) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    fn unsubscribe_state_change(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    fn cloneable(&self) -> Option<&dyn ConnectionClone> {
        if self.duplicable { Some(self as &dyn ConnectionClone) } else { None }
    }
}

impl ConnectionClone for FakeConnection {
    fn clone_connection(&self) -> DbResult<Arc<dyn DbConnection>> {
        let script = self.script.lock().unwrap().clone();
        let copy = Self::build(script, self.duplicable);
        copy.set_connection_string(&self.connection_string())?;
        Ok(copy)
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

pub struct FakeTransaction {
    level: IsolationLevel,
    connection: Option<Arc<dyn DbConnection>>,
    commit_result: DbResult<()>,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
}

impl FakeTransaction {
    pub fn new(
        level: IsolationLevel,
        connection: Option<Arc<dyn DbConnection>>,
        commit_result: DbResult<()>,
    ) -> Self {
        Self {
            level,
            connection,
            commit_result,
            commits: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
        }
    }
}

impl DbTransaction for FakeTransaction {
    fn connection(&self) -> Option<Arc<dyn DbConnection>> {
        self.connection.clone()
    }

    fn isolation_level(&self) -> IsolationLevel {
        self.level
    }

    fn commit(&self) -> DbResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.commit_result.clone()
    }

    fn rollback(&self) -> DbResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Whether a [`FakeCommand`] type exposes a by-name binding toggle
pub trait BindMode: Send + 'static {
    fn toggle() -> Option<BindByNameFn>;
}

/// No by-name binding support
pub struct Positional;

/// By-name binding support
pub struct ByName;

/// By-name binding support, counting how often the capability is queried
pub struct CountedByName;

pub static CAPABILITY_QUERIES: AtomicUsize = AtomicUsize::new(0);

impl BindMode for Positional {
    fn toggle() -> Option<BindByNameFn> {
        None
    }
}

impl BindMode for ByName {
    fn toggle() -> Option<BindByNameFn> {
        Some(toggle_bind_by_name::<ByName> as BindByNameFn)
    }
}

impl BindMode for CountedByName {
    fn toggle() -> Option<BindByNameFn> {
        CAPABILITY_QUERIES.fetch_add(1, Ordering::SeqCst);
        Some(toggle_bind_by_name::<CountedByName> as BindByNameFn)
    }
}

fn toggle_bind_by_name<B: BindMode>(command: &mut dyn DbCommand, value: bool) {
    if let Some(command) = (command as &mut dyn Any).downcast_mut::<FakeCommand<B>>() {
        command.bind_by_name = value;
        command.bind_toggles += 1;
    }
}

pub struct FakeCommand<B: BindMode = Positional> {
    text: String,
    timeout: Duration,
    command_type: CommandType,
    design_time_visible: bool,
    updated_row_source: UpdateRowSource,
    parameters: DbParameterCollection,
    pub connection: Option<Arc<dyn DbConnection>>,
    pub transaction: Option<Arc<dyn DbTransaction>>,
    pub script: Script,
    pub reader_closes: Arc<AtomicUsize>,
    pub bind_by_name: bool,
    pub bind_toggles: usize,
    pub executions: AtomicUsize,
    pub cancels: AtomicUsize,
    _mode: PhantomData<B>,
}

impl<B: BindMode> FakeCommand<B> {
    pub fn new(script: Script) -> Self {
        Self {
            text: String::new(),
            timeout: Duration::from_secs(30),
            command_type: CommandType::Text,
            design_time_visible: true,
            updated_row_source: UpdateRowSource::Both,
            parameters: DbParameterCollection::new(),
            connection: None,
            transaction: None,
            script,
            reader_closes: Arc::new(AtomicUsize::new(0)),
            bind_by_name: false,
            bind_toggles: 0,
            executions: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            _mode: PhantomData,
        }
    }

    pub fn boxed(script: Script) -> Box<dyn DbCommand> {
        Box::new(Self::new(script))
    }

    fn execute(&self) {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.script.panic_on_execute {
            panic!("driver crashed");
        }
    }
}

impl<B: BindMode> DbCommand for FakeCommand<B> {
    fn command_text(&self) -> &str {
        &self.text
    }

    fn set_command_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn command_timeout(&self) -> Duration {
        self.timeout
    }

    fn set_command_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn command_type(&self) -> CommandType {
        self.command_type
    }

    fn set_command_type(&mut self, command_type: CommandType) {
        self.command_type = command_type;
    }

    fn design_time_visible(&self) -> bool {
        self.design_time_visible
    }

    fn set_design_time_visible(&mut self, visible: bool) {
        self.design_time_visible = visible;
    }

    fn updated_row_source(&self) -> UpdateRowSource {
        self.updated_row_source
    }

    fn set_updated_row_source(&mut self, source: UpdateRowSource) {
        self.updated_row_source = source;
    }

    fn parameters(&self) -> &DbParameterCollection {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut DbParameterCollection {
        &mut self.parameters
    }

    fn connection(&self) -> Option<Arc<dyn DbConnection>> {
        self.connection.clone()
    }

    fn set_connection(&mut self, connection: Option<Arc<dyn DbConnection>>) -> DbResult<()> {
        self.connection = connection;
        Ok(())
    }

    fn transaction(&self) -> Option<Arc<dyn DbTransaction>> {
        self.transaction.clone()
    }

    fn set_transaction(&mut self, transaction: Option<Arc<dyn DbTransaction>>) -> DbResult<()> {
        self.transaction = transaction;
        Ok(())
    }

    fn execute_reader(&self, _behavior: CommandBehavior) -> DbResult<Box<dyn DbReader>> {
        self.execute();
        let rows = self.script.reader.clone()?;
        Ok(Box::new(FakeReader::new(
            self.script.columns.clone(),
            rows,
            Arc::clone(&self.reader_closes),
        )))
    }

    fn execute_non_query(&self) -> DbResult<i64> {
        self.execute();
        self.script.non_query.clone()
    }

    fn execute_scalar(&self) -> DbResult<DbValue> {
        self.execute();
        self.script.scalar.clone()
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn prepare(&self) -> DbResult<()> {
        Ok(())
    }

    fn create_parameter(&self) -> DbParameter {
        DbParameter::new(String::new(), DbValue::Null)
    }

    fn cloneable(&self) -> Option<&dyn CommandClone> {
        if self.script.duplicable { Some(self as &dyn CommandClone) } else { None }
    }

    fn bind_by_name_toggle(&self) -> Option<BindByNameFn> {
        B::toggle()
    }
}

impl<B: BindMode> CommandClone for FakeCommand<B> {
    fn clone_command(&self) -> DbResult<Box<dyn DbCommand>> {
        let mut copy = Self::new(self.script.clone());
        copy.text = self.text.clone();
        copy.command_type = self.command_type;
        copy.parameters = self.parameters.clone();
        copy.connection = self.connection.clone();
        copy.transaction = self.transaction.clone();
        copy.reader_closes = Arc::clone(&self.reader_closes);
        copy.bind_by_name = self.bind_by_name;
        Ok(Box::new(copy))
    }
}

/// The driver command behind a profiled command
pub fn inner_fake<B: BindMode>(command: &ProfiledCommand) -> &FakeCommand<B> {
    (command.internal_command() as &dyn Any)
        .downcast_ref::<FakeCommand<B>>()
        .expect("inner command is a FakeCommand")
}

/// Recover the profiled command behind a boxed command
pub fn as_profiled(command: &dyn DbCommand) -> &ProfiledCommand {
    (command as &dyn Any)
        .downcast_ref::<ProfiledCommand>()
        .expect("command is profiled")
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

pub struct FakeReader {
    columns: Vec<&'static str>,
    rows: Vec<Vec<DbValue>>,
    cursor: Option<usize>,
    closed: bool,
    closes: Arc<AtomicUsize>,
}

impl FakeReader {
    pub fn new(
        columns: Vec<&'static str>,
        rows: Vec<Vec<DbValue>>,
        closes: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            columns,
            rows,
            cursor: None,
            closed: false,
            closes,
        }
    }

    fn current(&self) -> DbResult<&Vec<DbValue>> {
        if self.closed {
            return Err(DbError::ReaderClosed);
        }
        self.cursor
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| DbError::QueryFailed("no current row".into()))
    }
}

impl DbReader for FakeReader {
    fn depth(&self) -> usize {
        0
    }

    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn records_affected(&self) -> i64 {
        -1
    }

    fn read(&mut self) -> DbResult<bool> {
        if self.closed {
            return Err(DbError::ReaderClosed);
        }
        let next = self.cursor.map_or(0, |i| i + 1);
        self.cursor = Some(next);
        Ok(next < self.rows.len())
    }

    fn next_result(&mut self) -> DbResult<bool> {
        Ok(false)
    }

    fn close(&mut self) -> DbResult<()> {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn get_name(&self, ordinal: usize) -> DbResult<String> {
        self.columns
            .get(ordinal)
            .map(|c| c.to_string())
            .ok_or_else(|| DbError::QueryFailed(format!("no column {}", ordinal)))
    }

    fn get_ordinal(&self, name: &str) -> DbResult<usize> {
        self.columns
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| DbError::QueryFailed(format!("no column {}", name)))
    }

    fn get_field_type(&self, ordinal: usize) -> DbResult<DataType> {
        self.rows
            .first()
            .and_then(|r| r.get(ordinal))
            .and_then(|v| v.data_type())
            .ok_or_else(|| DbError::QueryFailed(format!("no column {}", ordinal)))
    }

    fn get_value(&self, ordinal: usize) -> DbResult<DbValue> {
        self.current()?
            .get(ordinal)
            .cloned()
            .ok_or_else(|| DbError::QueryFailed(format!("no column {}", ordinal)))
    }
}

// ---------------------------------------------------------------------------
// Profiler
// ---------------------------------------------------------------------------

/// What kind of reader an `execute_finish` notification carried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderSeen {
    None,
    Profiled,
    Driver,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start(SqlExecuteType, String),
    Finish(SqlExecuteType, ReaderSeen),
    Error(SqlExecuteType, DbError),
    ReaderFinish,
}

/// Profiler recording every notification in order
pub struct RecordingProfiler {
    active: AtomicBool,
    events: Mutex<Vec<Event>>,
}

impl RecordingProfiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            active: AtomicBool::new(true),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn inactive() -> Arc<Self> {
        let profiler = Self::new();
        profiler.set_active(false);
        profiler
    }

    pub fn as_dyn(self: &Arc<Self>) -> Arc<dyn DbProfiler> {
        Arc::clone(self) as Arc<dyn DbProfiler>
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl DbProfiler for RecordingProfiler {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    fn execute_start(&self, command: &ProfiledCommand, execute_type: SqlExecuteType) {
        self.push(Event::Start(execute_type, command.command_text().to_string()));
    }

    fn execute_finish(
        &self,
        _command: &ProfiledCommand,
        execute_type: SqlExecuteType,
        reader: Option<&dyn DbReader>,
    ) {
        let seen = match reader {
            None => ReaderSeen::None,
            Some(r) if (r as &dyn Any).is::<ProfiledReader>() => ReaderSeen::Profiled,
            Some(_) => ReaderSeen::Driver,
        };
        self.push(Event::Finish(execute_type, seen));
    }

    fn on_error(&self, _command: &ProfiledCommand, execute_type: SqlExecuteType, error: &DbError) {
        self.push(Event::Error(execute_type, error.clone()));
    }

    fn reader_finish(&self, _reader: &ProfiledReader) {
        self.push(Event::ReaderFinish);
    }
}
