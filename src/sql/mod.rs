//! SQL utilities
//!
//! Reconstruction of executed statements for diagnostics, and formatting.

pub mod command_text;
pub mod formatter;

pub use command_text::{CommandTextOptions, command_text, render_parameter_value};
pub use formatter::{format_sql, format_sql_with_indent, single_line};
