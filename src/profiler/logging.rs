//! Default profiler: logs statements through `tracing`

use crate::config::ProfilerSettings;
use crate::db::provider::DbReader;
use crate::error::DbError;
use crate::profiled::{ProfiledCommand, ProfiledReader};
use crate::profiler::{DbProfiler, SqlExecuteType};
use crate::sql::command_text::{CommandTextOptions, command_text};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Counters kept by [`LoggingProfiler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfilerStats {
    pub started: u64,
    pub finished: u64,
    pub failed: u64,
    pub readers_closed: u64,
}

/// Profiler that logs each finished statement at `debug` and each failure at
/// `warn`, and keeps simple counters
#[derive(Debug)]
pub struct LoggingProfiler {
    active: AtomicBool,
    options: CommandTextOptions,
    started: AtomicU64,
    finished: AtomicU64,
    failed: AtomicU64,
    readers_closed: AtomicU64,
}

impl Default for LoggingProfiler {
    fn default() -> Self {
        Self::new(&ProfilerSettings::default())
    }
}

impl LoggingProfiler {
    /// Create an active profiler rendering statements per `settings`
    pub fn new(settings: &ProfilerSettings) -> Self {
        Self {
            active: AtomicBool::new(true),
            options: CommandTextOptions::from(settings),
            started: AtomicU64::new(0),
            finished: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            readers_closed: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> ProfilerStats {
        ProfilerStats {
            started: self.started.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            readers_closed: self.readers_closed.load(Ordering::Relaxed),
        }
    }
}

impl DbProfiler for LoggingProfiler {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    fn execute_start(&self, _command: &ProfiledCommand, execute_type: SqlExecuteType) {
        self.started.fetch_add(1, Ordering::Relaxed);
        trace!(kind = %execute_type, "Executing statement");
    }

    fn execute_finish(
        &self,
        command: &ProfiledCommand,
        execute_type: SqlExecuteType,
        reader: Option<&dyn DbReader>,
    ) {
        self.finished.fetch_add(1, Ordering::Relaxed);
        debug!(
            kind = %execute_type,
            has_reader = reader.is_some(),
            sql = %command_text(command, &self.options),
            "Statement finished"
        );
    }

    fn on_error(&self, command: &ProfiledCommand, execute_type: SqlExecuteType, error: &DbError) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        warn!(
            kind = %execute_type,
            error = %error,
            sql = %command_text(command, &self.options),
            "Statement failed"
        );
    }

    fn reader_finish(&self, _reader: &ProfiledReader) {
        self.readers_closed.fetch_add(1, Ordering::Relaxed);
        trace!("Reader closed");
    }
}
