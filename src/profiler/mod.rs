//! Profiler capability
//!
//! The proxies in [`crate::profiled`] report every statement they execute to
//! a [`DbProfiler`]. What a profiler does with the notifications (timing,
//! aggregation, logging) is up to the implementation; the proxies never look
//! at anything a hook does.
//!
//! A process-wide "current" profiler can be installed with [`set_current`].
//! Commands adopt it whenever they are rebound to a connection.

mod logging;

pub use logging::{LoggingProfiler, ProfilerStats};

use crate::config::ProfilerSettings;
use crate::db::provider::{DbConnection, DbReader};
use crate::error::DbError;
use crate::profiled::{ProfiledCommand, ProfiledConnection, ProfiledReader};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Categories of SQL statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SqlExecuteType {
    /// Unknown type
    #[default]
    None = 0,
    /// DML statements that alter database state, e.g. INSERT, UPDATE
    NonQuery = 1,
    /// Statements that return a single value
    Scalar = 2,
    /// Statements that iterate over a result set
    Reader = 3,
}

impl fmt::Display for SqlExecuteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlExecuteType::None => "none",
            SqlExecuteType::NonQuery => "non-query",
            SqlExecuteType::Scalar => "scalar",
            SqlExecuteType::Reader => "reader",
        };
        f.write_str(name)
    }
}

/// Receiver of statement execution notifications
///
/// Every execution on an active profiler sees exactly one `execute_start`
/// and exactly one `execute_finish`, with `on_error` in between when the
/// driver fails. Hooks default to no-ops.
pub trait DbProfiler: Send + Sync {
    fn is_active(&self) -> bool;

    fn set_active(&self, active: bool);

    /// Called before the driver executes `command`
    fn execute_start(&self, _command: &ProfiledCommand, _execute_type: SqlExecuteType) {}

    /// Called once execution is over, on success and failure alike. `reader`
    /// is the wrapped reader for successful row-returning executions and
    /// `None` otherwise.
    fn execute_finish(
        &self,
        _command: &ProfiledCommand,
        _execute_type: SqlExecuteType,
        _reader: Option<&dyn DbReader>,
    ) {
    }

    /// Called with the driver's error before it is returned to the caller
    fn on_error(
        &self,
        _command: &ProfiledCommand,
        _execute_type: SqlExecuteType,
        _error: &DbError,
    ) {
    }

    /// Called when a profiled reader is closed
    fn reader_finish(&self, _reader: &ProfiledReader) {}
}

static CURRENT: RwLock<Option<Arc<dyn DbProfiler>>> = RwLock::new(None);

/// The process-wide profiler, if one is installed
pub fn current() -> Option<Arc<dyn DbProfiler>> {
    CURRENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Install (or clear) the process-wide profiler, returning the previous one
pub fn set_current(profiler: Option<Arc<dyn DbProfiler>>) -> Option<Arc<dyn DbProfiler>> {
    let mut slot = CURRENT.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, profiler)
}

/// The process-wide profiler, installing an active [`LoggingProfiler`] first
/// if none is set
pub fn current_or_default() -> Arc<dyn DbProfiler> {
    current_or_insert_with(|| {
        tracing::debug!("Installing default logging profiler");
        Arc::new(LoggingProfiler::default())
    })
}

/// The process-wide profiler, installing the one built by `make` if none is
/// set. `make` runs under the write lock and at most once.
pub fn current_or_insert_with<F>(make: F) -> Arc<dyn DbProfiler>
where
    F: FnOnce() -> Arc<dyn DbProfiler>,
{
    let mut slot = CURRENT.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(slot.get_or_insert_with(make))
}

/// Wrap `connection` with the process-wide profiler
pub fn wrap(connection: Arc<dyn DbConnection>) -> Arc<ProfiledConnection> {
    ProfiledConnection::new(connection, Some(current_or_default()))
}

/// Wrap `connection` according to `settings`: profiled when enabled, returned
/// untouched when disabled
///
/// With no current profiler installed, a [`LoggingProfiler`] configured from
/// `settings` becomes the current one. An already installed profiler is
/// reused as is.
pub fn wrap_with(
    connection: Arc<dyn DbConnection>,
    settings: &ProfilerSettings,
) -> Arc<dyn DbConnection> {
    if !settings.enabled {
        return connection;
    }
    let profiler = current_or_insert_with(|| {
        tracing::debug!(?settings, "Installing logging profiler from settings");
        Arc::new(LoggingProfiler::new(settings))
    });
    ProfiledConnection::new(connection, Some(profiler))
}
