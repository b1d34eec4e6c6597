//! Profiled transaction

use crate::db::provider::{DbConnection, DbTransaction};
use crate::db::types::IsolationLevel;
use crate::error::{DbError, DbResult};
use crate::profiled::ProfiledConnection;
use std::fmt;
use std::sync::{Arc, Weak};

/// Wraps a driver transaction begun through a [`ProfiledConnection`]
///
/// Reports the profiled connection as its owner; commit and rollback go
/// straight to the driver transaction and their errors are returned as-is.
pub struct ProfiledTransaction {
    transaction: Arc<dyn DbTransaction>,
    connection: Weak<ProfiledConnection>,
}

impl ProfiledTransaction {
    pub fn new(transaction: Arc<dyn DbTransaction>, connection: &Arc<ProfiledConnection>) -> Self {
        Self {
            transaction,
            connection: Arc::downgrade(connection),
        }
    }

    /// Like [`ProfiledTransaction::new`], failing if either argument is absent
    pub fn try_new(
        transaction: Option<Arc<dyn DbTransaction>>,
        connection: Option<Arc<ProfiledConnection>>,
    ) -> DbResult<Self> {
        let transaction = transaction.ok_or(DbError::InvalidArgument("transaction"))?;
        let connection = connection.ok_or(DbError::InvalidArgument("connection"))?;
        Ok(Self::new(transaction, &connection))
    }

    /// The underlying driver transaction
    pub fn wrapped_transaction(&self) -> &Arc<dyn DbTransaction> {
        &self.transaction
    }

    /// The owning profiled connection, while it is alive
    pub fn profiled_connection(&self) -> Option<Arc<ProfiledConnection>> {
        self.connection.upgrade()
    }
}

impl DbTransaction for ProfiledTransaction {
    fn connection(&self) -> Option<Arc<dyn DbConnection>> {
        self.profiled_connection()
            .map(|c| c as Arc<dyn DbConnection>)
    }

    fn isolation_level(&self) -> IsolationLevel {
        self.transaction.isolation_level()
    }

    fn commit(&self) -> DbResult<()> {
        self.transaction.commit()
    }

    fn rollback(&self) -> DbResult<()> {
        self.transaction.rollback()
    }
}

impl fmt::Debug for ProfiledTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfiledTransaction")
            .field("isolation_level", &self.transaction.isolation_level())
            .field("connected", &(self.connection.strong_count() > 0))
            .finish()
    }
}
