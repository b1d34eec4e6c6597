//! Blocking database client contract
//!
//! Defines the interface that database drivers implement and that the
//! profiling proxies implement again on top of them, so a proxy can stand in
//! wherever a driver object was expected.
//!
//! - Connections and transactions are shared (`Arc<dyn _>`), commands and
//!   readers are owned (`Box<dyn _>`).
//! - Every trait has `Any` as a supertrait so callers can recognise a proxy
//!   behind a trait object and reach the driver object inside it.
//! - Optional capabilities (duplication, bind-by-name) are exposed through
//!   methods returning `Option`, defaulting to "not supported".

use crate::db::events::{StateChangeHandler, SubscriptionId};
use crate::db::parameters::{DbParameter, DbParameterCollection};
use crate::db::types::{
    ColumnDef, CommandBehavior, CommandType, ConnectionState, DataTable, DataType, DbValue,
    IsolationLevel, Row, UpdateRowSource,
};
use crate::error::{DbError, DbResult};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Schema collection returned by [`DbConnection::get_schema`]
pub const METADATA_COLLECTIONS: &str = "MetaDataCollections";

/// An open (or openable) session with a database
pub trait DbConnection: Any + Send + Sync {
    /// Connection string used to open the session
    fn connection_string(&self) -> String;

    /// Replace the connection string
    ///
    /// # Errors
    /// Drivers typically refuse while the connection is open
    fn set_connection_string(&self, value: &str) -> DbResult<()>;

    /// Time to wait while establishing a connection
    fn connection_timeout(&self) -> Duration;

    /// Current database name
    fn database(&self) -> String;

    /// Server or file the connection targets
    fn data_source(&self) -> String;

    /// Version string reported by the server
    ///
    /// # Errors
    /// Returns `DbError::NotConnected` if the connection is not open
    fn server_version(&self) -> DbResult<String>;

    fn state(&self) -> ConnectionState;

    /// Open the connection
    ///
    /// # Errors
    /// Returns `DbError::ConnectionFailed` if connection cannot be established
    fn open(&self) -> DbResult<()>;

    fn close(&self) -> DbResult<()>;

    fn change_database(&self, name: &str) -> DbResult<()>;

    /// Enlist in a distributed transaction, or leave it when `None`
    fn enlist_transaction(&self, transaction: Option<Uuid>) -> DbResult<()>;

    /// Query a schema collection, filtered by positional restrictions
    fn get_schema_restricted(
        &self,
        collection: &str,
        restrictions: &[Option<String>],
    ) -> DbResult<DataTable>;

    /// List the available schema collections
    fn get_schema(&self) -> DbResult<DataTable> {
        self.get_schema_restricted(METADATA_COLLECTIONS, &[])
    }

    /// Query a schema collection without restrictions
    fn get_schema_collection(&self, collection: &str) -> DbResult<DataTable> {
        self.get_schema_restricted(collection, &[])
    }

    fn begin_transaction(&self, level: IsolationLevel) -> DbResult<Arc<dyn DbTransaction>>;

    /// Create a command bound to this connection
    fn create_command(&self) -> DbResult<Box<dyn DbCommand>>;

    fn subscribe_state_change(&self, handler: StateChangeHandler) -> SubscriptionId;

    /// Returns false if the subscription was not registered
    fn unsubscribe_state_change(&self, id: SubscriptionId) -> bool;

    /// Duplication capability, if the driver supports it
    fn cloneable(&self) -> Option<&dyn ConnectionClone> {
        None
    }

    /// Concrete type name, used in diagnostics
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Connections that can produce an independent duplicate of themselves
pub trait ConnectionClone {
    fn clone_connection(&self) -> DbResult<Arc<dyn DbConnection>>;
}

/// A unit of work on a connection
pub trait DbTransaction: Any + Send + Sync {
    /// Connection the transaction belongs to
    fn connection(&self) -> Option<Arc<dyn DbConnection>>;

    fn isolation_level(&self) -> IsolationLevel;

    fn commit(&self) -> DbResult<()>;

    fn rollback(&self) -> DbResult<()>;
}

/// Setter for a driver's by-name parameter binding flag
///
/// The function receives the command that advertised it and is expected to
/// downcast to its own concrete type.
pub type BindByNameFn = fn(&mut dyn DbCommand, bool);

/// A statement to execute against a connection
pub trait DbCommand: Any + Send {
    fn command_text(&self) -> &str;

    fn set_command_text(&mut self, text: &str);

    fn command_timeout(&self) -> Duration;

    fn set_command_timeout(&mut self, timeout: Duration);

    fn command_type(&self) -> CommandType;

    fn set_command_type(&mut self, command_type: CommandType);

    fn design_time_visible(&self) -> bool;

    fn set_design_time_visible(&mut self, visible: bool);

    fn updated_row_source(&self) -> UpdateRowSource;

    fn set_updated_row_source(&mut self, source: UpdateRowSource);

    fn parameters(&self) -> &DbParameterCollection;

    fn parameters_mut(&mut self) -> &mut DbParameterCollection;

    fn connection(&self) -> Option<Arc<dyn DbConnection>>;

    /// Rebind the command to another connection
    ///
    /// # Errors
    /// Drivers may refuse while a reader is open
    fn set_connection(&mut self, connection: Option<Arc<dyn DbConnection>>) -> DbResult<()>;

    fn transaction(&self) -> Option<Arc<dyn DbTransaction>>;

    fn set_transaction(&mut self, transaction: Option<Arc<dyn DbTransaction>>) -> DbResult<()>;

    /// Execute a row-returning statement
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` (or a driver error) if execution fails
    fn execute_reader(&self, behavior: CommandBehavior) -> DbResult<Box<dyn DbReader>>;

    /// Execute a statement and return the number of affected rows
    fn execute_non_query(&self) -> DbResult<i64>;

    /// Execute a statement and return the first column of the first row
    fn execute_scalar(&self) -> DbResult<DbValue>;

    /// Best-effort cancellation of an in-flight execution
    fn cancel(&self);

    fn prepare(&self) -> DbResult<()>;

    fn create_parameter(&self) -> DbParameter;

    /// Duplication capability, if the driver supports it
    fn cloneable(&self) -> Option<&dyn CommandClone> {
        None
    }

    /// Setter for a by-name binding flag, if this command type has one
    fn bind_by_name_toggle(&self) -> Option<BindByNameFn> {
        None
    }

    /// Concrete type name, used in diagnostics
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Commands that can produce an independent duplicate of themselves
pub trait CommandClone {
    fn clone_command(&self) -> DbResult<Box<dyn DbCommand>>;
}

/// Forward-only cursor over one or more result sets
///
/// Only the structural members and [`DbReader::get_value`] are required;
/// the typed getters convert the raw value and may be overridden by drivers
/// with a cheaper native path.
pub trait DbReader: Any + Send {
    /// Nesting depth of the current row
    fn depth(&self) -> usize;

    fn field_count(&self) -> usize;

    fn has_rows(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// Rows changed by the statement, or -1 for SELECT statements
    fn records_affected(&self) -> i64;

    /// Advance to the next row; false at the end of the result set
    fn read(&mut self) -> DbResult<bool>;

    /// Advance to the next result set; false when there is none
    fn next_result(&mut self) -> DbResult<bool>;

    fn close(&mut self) -> DbResult<()>;

    fn get_name(&self, ordinal: usize) -> DbResult<String>;

    fn get_ordinal(&self, name: &str) -> DbResult<usize>;

    fn get_field_type(&self, ordinal: usize) -> DbResult<DataType>;

    /// Raw value of a column in the current row
    fn get_value(&self, ordinal: usize) -> DbResult<DbValue>;

    fn get_data_type_name(&self, ordinal: usize) -> DbResult<String> {
        Ok(self.get_field_type(ordinal)?.display_name())
    }

    /// Column metadata of the current result set
    fn get_schema_table(&self) -> DbResult<DataTable> {
        let mut columns = Vec::with_capacity(self.field_count());
        for ordinal in 0..self.field_count() {
            columns.push(ColumnDef {
                name: self.get_name(ordinal)?,
                data_type: self.get_field_type(ordinal)?,
                nullable: true,
            });
        }
        Ok(DataTable {
            name: "SchemaTable".to_string(),
            columns,
            rows: Vec::new(),
        })
    }

    /// Value of the named column in the current row
    fn get_value_by_name(&self, name: &str) -> DbResult<DbValue> {
        self.get_value(self.get_ordinal(name)?)
    }

    /// Copy the current row into `values`, returning how many were written
    fn get_values(&self, values: &mut [DbValue]) -> DbResult<usize> {
        let count = values.len().min(self.field_count());
        for (ordinal, slot) in values.iter_mut().take(count).enumerate() {
            *slot = self.get_value(ordinal)?;
        }
        Ok(count)
    }

    fn is_db_null(&self, ordinal: usize) -> DbResult<bool> {
        Ok(self.get_value(ordinal)?.is_null())
    }

    fn get_boolean(&self, ordinal: usize) -> DbResult<bool> {
        match self.get_value(ordinal)? {
            DbValue::Boolean(b) => Ok(b),
            other => Err(mismatch("boolean", &other)),
        }
    }

    fn get_byte(&self, ordinal: usize) -> DbResult<u8> {
        match self.get_value(ordinal)? {
            DbValue::Byte(b) => Ok(b),
            other => Err(mismatch("byte", &other)),
        }
    }

    /// Copy bytes of a binary column starting at `data_offset`
    fn get_bytes(&self, ordinal: usize, data_offset: usize, buffer: &mut [u8]) -> DbResult<usize> {
        match self.get_value(ordinal)? {
            DbValue::Binary(bytes) => {
                let src = bytes.get(data_offset..).unwrap_or_default();
                let n = src.len().min(buffer.len());
                buffer[..n].copy_from_slice(&src[..n]);
                Ok(n)
            }
            other => Err(mismatch("binary", &other)),
        }
    }

    fn get_char(&self, ordinal: usize) -> DbResult<char> {
        match self.get_value(ordinal)? {
            DbValue::Char(c) => Ok(c),
            other => Err(mismatch("char", &other)),
        }
    }

    /// Copy characters of a text column starting at `data_offset`
    fn get_chars(
        &self,
        ordinal: usize,
        data_offset: usize,
        buffer: &mut [char],
    ) -> DbResult<usize> {
        match self.get_value(ordinal)? {
            DbValue::Text(s) => {
                let mut n = 0;
                for (slot, c) in buffer.iter_mut().zip(s.chars().skip(data_offset)) {
                    *slot = c;
                    n += 1;
                }
                Ok(n)
            }
            other => Err(mismatch("text", &other)),
        }
    }

    fn get_date_time(&self, ordinal: usize) -> DbResult<NaiveDateTime> {
        match self.get_value(ordinal)? {
            DbValue::DateTime(dt) => Ok(dt),
            other => Err(mismatch("datetime", &other)),
        }
    }

    fn get_decimal(&self, ordinal: usize) -> DbResult<Decimal> {
        match self.get_value(ordinal)? {
            DbValue::Decimal(d) => Ok(d),
            DbValue::Integer(i) => Ok(Decimal::from(i)),
            DbValue::BigInt(i) => Ok(Decimal::from(i)),
            other => Err(mismatch("decimal", &other)),
        }
    }

    fn get_double(&self, ordinal: usize) -> DbResult<f64> {
        match self.get_value(ordinal)? {
            DbValue::Double(x) => Ok(x),
            DbValue::Float(x) => Ok(f64::from(x)),
            other => Err(mismatch("double", &other)),
        }
    }

    fn get_float(&self, ordinal: usize) -> DbResult<f32> {
        match self.get_value(ordinal)? {
            DbValue::Float(x) => Ok(x),
            other => Err(mismatch("float", &other)),
        }
    }

    fn get_guid(&self, ordinal: usize) -> DbResult<Uuid> {
        match self.get_value(ordinal)? {
            DbValue::Guid(g) => Ok(g),
            other => Err(mismatch("guid", &other)),
        }
    }

    fn get_int16(&self, ordinal: usize) -> DbResult<i16> {
        match self.get_value(ordinal)? {
            DbValue::SmallInt(i) => Ok(i),
            DbValue::Byte(b) => Ok(i16::from(b)),
            other => Err(mismatch("int16", &other)),
        }
    }

    fn get_int32(&self, ordinal: usize) -> DbResult<i32> {
        match self.get_value(ordinal)? {
            DbValue::Integer(i) => Ok(i),
            DbValue::SmallInt(i) => Ok(i32::from(i)),
            DbValue::Byte(b) => Ok(i32::from(b)),
            other => Err(mismatch("int32", &other)),
        }
    }

    fn get_int64(&self, ordinal: usize) -> DbResult<i64> {
        match self.get_value(ordinal)? {
            DbValue::BigInt(i) => Ok(i),
            DbValue::Integer(i) => Ok(i64::from(i)),
            DbValue::SmallInt(i) => Ok(i64::from(i)),
            DbValue::Byte(b) => Ok(i64::from(b)),
            other => Err(mismatch("int64", &other)),
        }
    }

    fn get_string(&self, ordinal: usize) -> DbResult<String> {
        match self.get_value(ordinal)? {
            DbValue::Text(s) => Ok(s),
            DbValue::Char(c) => Ok(c.to_string()),
            other => Err(mismatch("string", &other)),
        }
    }
}

fn mismatch(expected: &str, found: &DbValue) -> DbError {
    let found = found
        .data_type()
        .map(|t| t.display_name())
        .unwrap_or_else(|| "null".to_string());
    DbError::TypeConversion(format!("expected {}, found {}", expected, found))
}

/// Row enumeration for any reader
pub trait DbReaderExt: DbReader {
    /// Iterate the remaining rows of the current result set
    fn rows(&mut self) -> Rows<'_, Self> {
        Rows {
            reader: self,
            done: false,
        }
    }
}

impl<R: DbReader + ?Sized> DbReaderExt for R {}

/// Iterator returned by [`DbReaderExt::rows`]
pub struct Rows<'a, R: DbReader + ?Sized> {
    reader: &'a mut R,
    done: bool,
}

impl<R: DbReader + ?Sized> Iterator for Rows<'_, R> {
    type Item = DbResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read() {
            Ok(true) => {
                let mut values = vec![DbValue::Null; self.reader.field_count()];
                match self.reader.get_values(&mut values) {
                    Ok(_) => Some(Ok(Row { values })),
                    Err(e) => {
                        self.done = true;
                        Some(Err(e))
                    }
                }
            }
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
