//! Profiling proxies
//!
//! Each proxy implements the same trait as the driver object it wraps and
//! forwards every call to it. [`ProfiledCommand`] additionally brackets its
//! three execution modes with [`DbProfiler`](crate::profiler::DbProfiler)
//! notifications, and [`ProfiledReader`] reports back when it is closed.
//!
//! ```
//! # use std::sync::Arc;
//! # use dbprofiler::db::{DbCommand, DbConnection};
//! # use dbprofiler::profiled::ProfiledConnection;
//! # use dbprofiler::profiler::{DbProfiler, LoggingProfiler};
//! # fn example(driver: Arc<dyn DbConnection>) -> dbprofiler::error::DbResult<()> {
//! let profiler: Arc<dyn DbProfiler> = Arc::new(LoggingProfiler::default());
//! let conn = ProfiledConnection::new(driver, Some(profiler));
//! conn.open()?;
//! let mut cmd = conn.create_command()?;
//! cmd.set_command_text("UPDATE users SET active = 0");
//! let changed = cmd.execute_non_query()?;
//! # let _ = changed;
//! # Ok(())
//! # }
//! ```

mod command;
mod connection;
mod reader;
mod transaction;

pub use command::ProfiledCommand;
pub use connection::ProfiledConnection;
pub use reader::ProfiledReader;
pub use transaction::ProfiledTransaction;
