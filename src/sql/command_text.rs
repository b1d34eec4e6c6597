//! Human-readable reconstruction of executed statements
//!
//! Produces the statement a command would run with its parameter values
//! spliced in. The output is meant for logs, not for re-execution: values
//! are rendered on a best-effort basis.

use crate::config::ProfilerSettings;
use crate::db::parameters::DbParameter;
use crate::db::provider::DbCommand;
use crate::db::types::{CommandType, DbValue};
use crate::sql::formatter::{format_sql_with_indent, single_line};
use unicode_truncate::UnicodeTruncateStr;

/// Controls how [`command_text`] renders a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTextOptions {
    /// Splice parameter values into the text
    pub substitute_parameters: bool,
    /// Pretty-print with sqlformat instead of collapsing onto one line
    pub pretty: bool,
    pub indent: u8,
    /// Display width to truncate to (0 = unlimited)
    pub max_len: usize,
}

impl Default for CommandTextOptions {
    fn default() -> Self {
        Self::from(&ProfilerSettings::default())
    }
}

impl From<&ProfilerSettings> for CommandTextOptions {
    fn from(settings: &ProfilerSettings) -> Self {
        Self {
            substitute_parameters: settings.log_parameters,
            pretty: settings.format_sql,
            indent: settings.indent,
            max_len: settings.max_statement_len,
        }
    }
}

/// Render the statement `command` would execute
///
/// Stored procedures render as `EXEC name @a=1, @b='x'` over their input
/// parameters; text commands have every parameter name replaced with its
/// value.
pub fn command_text(command: &dyn DbCommand, options: &CommandTextOptions) -> String {
    let params = command.parameters();
    let mut text = match command.command_type() {
        CommandType::StoredProcedure => {
            let mut out = format!("EXEC {}", command.command_text());
            if options.substitute_parameters {
                let args: Vec<String> = params
                    .iter()
                    .filter(|p| p.direction.is_input())
                    .map(|p| format!(" {}={}", at_name(&p.name), render_parameter_value(&p.value)))
                    .collect();
                out.push_str(&args.join(","));
            }
            out
        }
        CommandType::Text | CommandType::TableDirect => {
            let sql = command.command_text().to_string();
            if options.substitute_parameters {
                substitute(&sql, params.iter())
            } else {
                sql
            }
        }
    };

    text = if options.pretty {
        format_sql_with_indent(&text, options.indent)
    } else {
        single_line(&text)
    };
    if options.max_len > 0 {
        let (head, _) = text.unicode_truncate(options.max_len);
        if head.len() < text.len() {
            text = format!("{}...", head);
        }
    }
    text
}

/// Render a parameter value as a SQL literal
pub fn render_parameter_value(value: &DbValue) -> String {
    match value {
        DbValue::Null => "NULL".to_string(),
        DbValue::Binary(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            format!("0x{}", hex)
        }
        DbValue::Json(v) => quote(&v.to_string()),
        v if v.is_textual() => quote(&v.to_string()),
        v => v.to_string(),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn at_name(name: &str) -> String {
    if name.starts_with('@') {
        name.to_string()
    } else {
        format!("@{}", name)
    }
}

/// Replace parameter names with their values in one left-to-right pass.
/// At each position the longest matching name wins, so `@id` does not
/// clobber `@id2`, and substituted values are never scanned again.
fn substitute<'a>(sql: &str, params: impl Iterator<Item = &'a DbParameter>) -> String {
    let mut params: Vec<(&str, String)> = params
        .filter(|p| !p.name.is_empty())
        .map(|p| (p.name.as_str(), render_parameter_value(&p.value)))
        .collect();
    params.sort_by_key(|(name, _)| std::cmp::Reverse(name.len()));

    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    while let Some(c) = rest.chars().next() {
        match params.iter().find(|(name, _)| rest.starts_with(name)) {
            Some((name, value)) => {
                out.push_str(value);
                rest = &rest[name.len()..];
            }
            None => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    out
}
