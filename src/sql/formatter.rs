//! Statement layout for log output
//!
//! Logged statements are either pretty-printed with sqlformat or collapsed
//! onto a single line so one execution produces one log record.

use sqlformat::{FormatOptions, Indent, QueryParams, format};

/// Pretty-print a statement with two-space indentation
///
/// # Examples
/// ```
/// let formatted = dbprofiler::sql::format_sql("select * from users where id=1");
/// assert!(formatted.contains("SELECT"));
/// ```
pub fn format_sql(sql: &str) -> String {
    format_sql_with_indent(sql, 2)
}

/// Pretty-print a statement, indenting nested clauses by `indent` spaces
pub fn format_sql_with_indent(sql: &str, indent: u8) -> String {
    let options = FormatOptions {
        indent: Indent::Spaces(indent),
        uppercase: Some(true),
        lines_between_queries: 1,
        ..FormatOptions::default()
    };
    format(sql, &QueryParams::None, &options)
}

/// Collapse runs of whitespace outside string literals into single spaces
///
/// Quoted text (`'...'`, with `''` as an escaped quote) is copied verbatim so
/// substituted parameter values are not altered.
pub fn single_line(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut in_literal = false;
    let mut pending_space = false;

    for c in sql.trim().chars() {
        if in_literal {
            out.push(c);
            if c == '\'' {
                in_literal = false;
            }
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        if c == '\'' {
            in_literal = true;
        }
        out.push(c);
    }
    out
}
