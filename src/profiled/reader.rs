//! Profiled reader

use crate::db::provider::{DbConnection, DbReader};
use crate::db::types::{DataTable, DataType, DbValue};
use crate::error::{DbError, DbResult};
use crate::profiler::DbProfiler;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Wraps a driver reader returned from a profiled execution
///
/// Every accessor reads through to the driver reader. Closing the reader
/// (explicitly, or by dropping it) closes the driver reader and then calls
/// the profiler's `reader_finish` hook exactly once, even when no driver
/// reader was attached.
pub struct ProfiledReader {
    reader: Option<Box<dyn DbReader>>,
    connection: Option<Arc<dyn DbConnection>>,
    profiler: Option<Arc<dyn DbProfiler>>,
    closed: bool,
}

impl ProfiledReader {
    pub fn new(
        reader: Option<Box<dyn DbReader>>,
        connection: Option<Arc<dyn DbConnection>>,
        profiler: Option<Arc<dyn DbProfiler>>,
    ) -> Self {
        Self {
            reader,
            connection,
            profiler,
            closed: false,
        }
    }

    /// The underlying driver reader, until the reader is closed
    pub fn wrapped_reader(&self) -> Option<&dyn DbReader> {
        self.reader.as_deref()
    }

    /// Connection the reader was produced on
    pub fn connection(&self) -> Option<&Arc<dyn DbConnection>> {
        self.connection.as_ref()
    }

    fn inner(&self) -> DbResult<&dyn DbReader> {
        self.reader.as_deref().ok_or(DbError::ReaderClosed)
    }

    fn inner_mut(&mut self) -> DbResult<&mut (dyn DbReader + 'static)> {
        self.reader.as_deref_mut().ok_or(DbError::ReaderClosed)
    }
}

impl DbReader for ProfiledReader {
    fn depth(&self) -> usize {
        self.reader.as_ref().map_or(0, |r| r.depth())
    }

    fn field_count(&self) -> usize {
        self.reader.as_ref().map_or(0, |r| r.field_count())
    }

    fn has_rows(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| r.has_rows())
    }

    fn is_closed(&self) -> bool {
        self.reader.as_ref().is_none_or(|r| r.is_closed())
    }

    fn records_affected(&self) -> i64 {
        self.reader.as_ref().map_or(-1, |r| r.records_affected())
    }

    fn read(&mut self) -> DbResult<bool> {
        self.inner_mut()?.read()
    }

    fn next_result(&mut self) -> DbResult<bool> {
        self.inner_mut()?.next_result()
    }

    fn close(&mut self) -> DbResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = match self.reader.as_mut() {
            Some(reader) => reader.close(),
            None => Ok(()),
        };
        if let Some(profiler) = self.profiler.take() {
            profiler.reader_finish(self);
        }
        self.reader = None;
        self.connection = None;
        result
    }

    fn get_name(&self, ordinal: usize) -> DbResult<String> {
        self.inner()?.get_name(ordinal)
    }

    fn get_ordinal(&self, name: &str) -> DbResult<usize> {
        self.inner()?.get_ordinal(name)
    }

    fn get_field_type(&self, ordinal: usize) -> DbResult<DataType> {
        self.inner()?.get_field_type(ordinal)
    }

    fn get_value(&self, ordinal: usize) -> DbResult<DbValue> {
        self.inner()?.get_value(ordinal)
    }

    fn get_data_type_name(&self, ordinal: usize) -> DbResult<String> {
        self.inner()?.get_data_type_name(ordinal)
    }

    fn get_schema_table(&self) -> DbResult<DataTable> {
        self.inner()?.get_schema_table()
    }

    fn get_value_by_name(&self, name: &str) -> DbResult<DbValue> {
        self.inner()?.get_value_by_name(name)
    }

    fn get_values(&self, values: &mut [DbValue]) -> DbResult<usize> {
        self.inner()?.get_values(values)
    }

    fn is_db_null(&self, ordinal: usize) -> DbResult<bool> {
        self.inner()?.is_db_null(ordinal)
    }

    fn get_boolean(&self, ordinal: usize) -> DbResult<bool> {
        self.inner()?.get_boolean(ordinal)
    }

    fn get_byte(&self, ordinal: usize) -> DbResult<u8> {
        self.inner()?.get_byte(ordinal)
    }

    fn get_bytes(&self, ordinal: usize, data_offset: usize, buffer: &mut [u8]) -> DbResult<usize> {
        self.inner()?.get_bytes(ordinal, data_offset, buffer)
    }

    fn get_char(&self, ordinal: usize) -> DbResult<char> {
        self.inner()?.get_char(ordinal)
    }

    fn get_chars(
        &self,
        ordinal: usize,
        data_offset: usize,
        buffer: &mut [char],
    ) -> DbResult<usize> {
        self.inner()?.get_chars(ordinal, data_offset, buffer)
    }

    fn get_date_time(&self, ordinal: usize) -> DbResult<NaiveDateTime> {
        self.inner()?.get_date_time(ordinal)
    }

    fn get_decimal(&self, ordinal: usize) -> DbResult<Decimal> {
        self.inner()?.get_decimal(ordinal)
    }

    fn get_double(&self, ordinal: usize) -> DbResult<f64> {
        self.inner()?.get_double(ordinal)
    }

    fn get_float(&self, ordinal: usize) -> DbResult<f32> {
        self.inner()?.get_float(ordinal)
    }

    fn get_guid(&self, ordinal: usize) -> DbResult<Uuid> {
        self.inner()?.get_guid(ordinal)
    }

    fn get_int16(&self, ordinal: usize) -> DbResult<i16> {
        self.inner()?.get_int16(ordinal)
    }

    fn get_int32(&self, ordinal: usize) -> DbResult<i32> {
        self.inner()?.get_int32(ordinal)
    }

    fn get_int64(&self, ordinal: usize) -> DbResult<i64> {
        self.inner()?.get_int64(ordinal)
    }

    fn get_string(&self, ordinal: usize) -> DbResult<String> {
        self.inner()?.get_string(ordinal)
    }
}

impl Drop for ProfiledReader {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to close wrapped reader");
        }
    }
}

impl fmt::Debug for ProfiledReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfiledReader")
            .field("closed", &self.closed)
            .field("has_inner", &self.reader.is_some())
            .field("profiled", &self.profiler.is_some())
            .finish()
    }
}
