//! Database abstraction layer
//!
//! This module defines the trait contracts a driver implements (connection,
//! command, transaction, reader) together with the value types that cross
//! them. The profiling proxies implement the same traits.

pub mod events;
pub mod parameters;
pub mod provider;
pub mod types;

// Re-export main types
pub use events::{StateChangeEvent, StateChangeEvents, StateChangeHandler, SubscriptionId};
pub use parameters::{DbParameter, DbParameterCollection, ParameterDirection};
pub use provider::{
    BindByNameFn, CommandClone, ConnectionClone, DbCommand, DbConnection, DbReader, DbReaderExt,
    DbTransaction,
};
pub use types::{
    ColumnDef, CommandBehavior, CommandType, ConnectionState, DataTable, DataType, DbValue,
    IsolationLevel, Row, UpdateRowSource,
};
