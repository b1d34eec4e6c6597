//! Database type definitions
//!
//! Core data structures shared by drivers and the profiling proxies:
//! column values, schema tables, and the small enumerations that make up
//! the connection/command contract.

use chrono::NaiveDateTime;
use core::ops::BitOr;
use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

/// Tabular result of a schema query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    /// Table (collection) name
    pub name: String,
    /// Column definitions
    pub columns: Vec<ColumnDef>,
    /// Result rows
    pub rows: Vec<Row>,
}

/// Column definition in a result set or schema table
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Whether column can contain NULL
    pub nullable: bool,
}

/// Database data types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    // Integer types
    TinyInt,
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,
    Numeric,

    // Text types
    Text,
    Varchar(Option<usize>),
    Char(Option<usize>),

    // Boolean
    Boolean,

    // Date/time types
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,

    // JSON types
    Json,
    Jsonb,

    // Binary data
    Bytea,

    // UUID
    Uuid,

    // Array type
    Array(Box<DataType>),

    // Other/unknown types
    Unknown(String),
}

/// A single row of values
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Values in column order
    pub values: Vec<DbValue>,
}

/// A single column value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DbValue {
    /// NULL value
    #[default]
    Null,
    Boolean(bool),
    Byte(u8),
    Char(char),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    Guid(Uuid),
    Text(String),
    Binary(Vec<u8>),
    /// JSON value (parsed)
    Json(serde_json::Value),
}

impl DataType {
    /// Get a human-readable display name for this type
    pub fn display_name(&self) -> String {
        match self {
            DataType::TinyInt => "tinyint".to_string(),
            DataType::SmallInt => "smallint".to_string(),
            DataType::Integer => "integer".to_string(),
            DataType::BigInt => "bigint".to_string(),
            DataType::Real => "real".to_string(),
            DataType::Double => "double precision".to_string(),
            DataType::Numeric => "numeric".to_string(),
            DataType::Text => "text".to_string(),
            DataType::Varchar(Some(n)) => format!("varchar({})", n),
            DataType::Varchar(None) => "varchar".to_string(),
            DataType::Char(Some(n)) => format!("char({})", n),
            DataType::Char(None) => "char".to_string(),
            DataType::Boolean => "boolean".to_string(),
            DataType::Date => "date".to_string(),
            DataType::Time => "time".to_string(),
            DataType::Timestamp => "timestamp".to_string(),
            DataType::TimestampTz => "timestamptz".to_string(),
            DataType::Interval => "interval".to_string(),
            DataType::Json => "json".to_string(),
            DataType::Jsonb => "jsonb".to_string(),
            DataType::Bytea => "bytea".to_string(),
            DataType::Uuid => "uuid".to_string(),
            DataType::Array(inner) => format!("{}[]", inner.display_name()),
            DataType::Unknown(s) => s.clone(),
        }
    }
}

impl DbValue {
    /// The data type a value of this shape is reported as. NULL has no
    /// intrinsic type and reports `None`.
    pub fn data_type(&self) -> Option<DataType> {
        let ty = match self {
            DbValue::Null => return None,
            DbValue::Boolean(_) => DataType::Boolean,
            DbValue::Byte(_) => DataType::TinyInt,
            DbValue::Char(_) => DataType::Char(Some(1)),
            DbValue::SmallInt(_) => DataType::SmallInt,
            DbValue::Integer(_) => DataType::Integer,
            DbValue::BigInt(_) => DataType::BigInt,
            DbValue::Float(_) => DataType::Real,
            DbValue::Double(_) => DataType::Double,
            DbValue::Decimal(_) => DataType::Numeric,
            DbValue::DateTime(_) => DataType::Timestamp,
            DbValue::Guid(_) => DataType::Uuid,
            DbValue::Text(_) => DataType::Text,
            DbValue::Binary(_) => DataType::Bytea,
            DbValue::Json(_) => DataType::Json,
        };
        Some(ty)
    }

    /// Whether the value renders as a quoted literal in reconstructed SQL
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            DbValue::Text(_) | DbValue::Char(_) | DbValue::DateTime(_) | DbValue::Guid(_)
        )
    }

    /// Check if this is a NULL value
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }
}

impl fmt::Display for DbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbValue::Null => f.write_str("NULL"),
            DbValue::Boolean(b) => write!(f, "{}", b),
            DbValue::Byte(b) => write!(f, "{}", b),
            DbValue::Char(c) => write!(f, "{}", c),
            DbValue::SmallInt(i) => write!(f, "{}", i),
            DbValue::Integer(i) => write!(f, "{}", i),
            DbValue::BigInt(i) => write!(f, "{}", i),
            DbValue::Float(x) => write!(f, "{}", x),
            DbValue::Double(x) => write!(f, "{}", x),
            DbValue::Decimal(d) => write!(f, "{}", d),
            DbValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            DbValue::Guid(g) => write!(f, "{}", g),
            DbValue::Text(s) => f.write_str(s),
            DbValue::Binary(b) => write!(f, "<binary {} bytes>", b.len()),
            DbValue::Json(v) => write!(f, "{}", v),
        }
    }
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    Open,
    Connecting,
    Executing,
    Fetching,
    Broken,
}

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    Unspecified,
    Chaos,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

/// How a command's text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandType {
    #[default]
    Text,
    StoredProcedure,
    TableDirect,
}

/// How command results are applied to an updated row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateRowSource {
    None,
    OutputParameters,
    FirstReturnedRecord,
    #[default]
    Both,
}

/// Result-shaping flags for row-returning execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandBehavior(u32);

impl CommandBehavior {
    /// No special handling.
    pub const DEFAULT: Self = Self(0x00);

    /// The query returns a single result set.
    pub const SINGLE_RESULT: Self = Self(0x01);

    /// Only column metadata is returned.
    pub const SCHEMA_ONLY: Self = Self(0x02);

    /// Column and primary key metadata is returned.
    pub const KEY_INFO: Self = Self(0x04);

    /// At most one row is expected.
    pub const SINGLE_ROW: Self = Self(0x08);

    /// Columns are read strictly in order.
    pub const SEQUENTIAL_ACCESS: Self = Self(0x10);

    /// Closing the reader closes the owning connection.
    pub const CLOSE_CONNECTION: Self = Self(0x20);

    /// Returns the raw bitmask value.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Creates a new mask from raw bits.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns true if this mask contains the given flag.
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl BitOr for CommandBehavior {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
