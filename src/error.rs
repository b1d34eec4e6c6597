//! Error types for dbprofiler
//!
//! This module defines the error hierarchy used throughout the crate.
//! We use `thiserror` for library-style errors with clear error chains.
//!
//! Errors raised by a wrapped driver travel through the profiling proxies
//! untouched: the same `DbError` value the driver returned is what the caller
//! receives and what the profiler's error hook observes.

use std::io;

/// Main error type for dbprofiler
#[derive(Debug, thiserror::Error)]
pub enum ProfilerError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Database operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    /// Failed to establish connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Not connected to a database
    #[error("Not connected to database")]
    NotConnected,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Type conversion error
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// A required argument was absent
    #[error("Value cannot be null: {0}")]
    InvalidArgument(&'static str),

    /// The wrapped object lacks the requested capability
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The reader has already been closed
    #[error("Reader is closed")]
    ReaderClosed,

    /// Driver-specific failure with its native error code
    #[error("Driver error {code}: {message}")]
    Driver { code: i32, message: String },
}

/// Configuration loading/parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Config file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Specialized Result type for dbprofiler operations
pub type Result<T> = std::result::Result<T, ProfilerError>;

/// Specialized Result type for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
