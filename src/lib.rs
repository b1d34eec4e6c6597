//! dbprofiler - Transparent profiling proxies for database connections
//!
//! dbprofiler wraps a database driver's connection, command, transaction and
//! reader objects in proxies that forward every call to the driver and report
//! statement executions to a pluggable profiler.
//!
//! # Features
//!
//! - **Transparent**: proxies implement the same traits as the driver objects
//! - **Bracketed executions**: every profiled statement sees one start and one
//!   finish notification, with the driver's error reported in between
//! - **Reader tracking**: profilers hear when a result set is closed
//! - **Lock-free caching**: per-type capability lookups go through [`link::LinkCache`]
//!
//! # Architecture
//!
//! - [`db`]: Driver contracts and value types
//! - [`profiled`]: The proxy objects
//! - [`profiler`]: The profiler capability and the default logging profiler
//! - [`link`]: Append-only, identity-keyed cache
//! - [`sql`]: Statement reconstruction and formatting for logs
//! - [`config`]: Profiler settings
//! - [`error`]: Error types and result aliases
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dbprofiler::config::load_settings;
//! use dbprofiler::db::{DbCommand, DbConnection};
//! use dbprofiler::profiler;
//!
//! # fn example(driver: Arc<dyn DbConnection>) -> Result<(), Box<dyn std::error::Error>> {
//! let settings = load_settings()?;
//!
//! // Profiled when enabled, the driver connection itself otherwise
//! let conn = profiler::wrap_with(driver, &settings);
//! conn.open()?;
//!
//! let mut cmd = conn.create_command()?;
//! cmd.set_command_text("SELECT count(*) FROM users");
//! let count = cmd.execute_scalar()?;
//! println!("{} users", count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod link;
pub mod profiled;
pub mod profiler;
pub mod sql;

pub use error::{ConfigError, DbError, ProfilerError, Result};
pub use link::LinkCache;
pub use profiled::{ProfiledCommand, ProfiledConnection, ProfiledReader, ProfiledTransaction};
pub use profiler::{DbProfiler, LoggingProfiler, SqlExecuteType};
