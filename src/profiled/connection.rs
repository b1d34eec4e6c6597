//! Profiled connection

use crate::db::events::{StateChangeEvents, StateChangeHandler, SubscriptionId};
use crate::db::provider::{ConnectionClone, DbCommand, DbConnection, DbTransaction};
use crate::db::types::{ConnectionState, DataTable, IsolationLevel};
use crate::error::{DbError, DbResult};
use crate::profiled::{ProfiledCommand, ProfiledTransaction};
use crate::profiler::DbProfiler;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{trace, warn};
use uuid::Uuid;

/// Wraps a database connection so that commands created from it report
/// their executions to a profiler
///
/// The proxy keeps no connection state of its own: every accessor and
/// lifecycle call goes straight to the driver connection. State-change
/// notifications raised by the driver are re-raised to subscribers of the
/// proxy with the original arguments.
///
/// Dropping the proxy unsubscribes from the driver's notifications and
/// closes the driver connection.
pub struct ProfiledConnection {
    inner: Arc<dyn DbConnection>,
    profiler: Option<Arc<dyn DbProfiler>>,
    events: Arc<StateChangeEvents>,
    subscription: SubscriptionId,
    this: Weak<ProfiledConnection>,
}

impl ProfiledConnection {
    /// Wrap `connection`. If `profiler` is `None`, no profiling will occur.
    pub fn new(
        connection: Arc<dyn DbConnection>,
        profiler: Option<Arc<dyn DbProfiler>>,
    ) -> Arc<Self> {
        let events = Arc::new(StateChangeEvents::new());
        let forward = Arc::clone(&events);
        let subscription =
            connection.subscribe_state_change(Arc::new(move |event| forward.raise(event)));

        trace!(
            inner = connection.type_name(),
            profiled = profiler.is_some(),
            "Wrapping connection"
        );

        Arc::new_cyclic(|this| Self {
            inner: connection,
            profiler,
            events,
            subscription,
            this: this.clone(),
        })
    }

    /// Like [`ProfiledConnection::new`], failing if `connection` is absent
    pub fn try_new(
        connection: Option<Arc<dyn DbConnection>>,
        profiler: Option<Arc<dyn DbProfiler>>,
    ) -> DbResult<Arc<Self>> {
        let connection = connection.ok_or(DbError::InvalidArgument("connection"))?;
        Ok(Self::new(connection, profiler))
    }

    /// The underlying driver connection
    pub fn wrapped_connection(&self) -> &Arc<dyn DbConnection> {
        &self.inner
    }

    pub fn profiler(&self) -> Option<&Arc<dyn DbProfiler>> {
        self.profiler.as_ref()
    }

    /// Duplicate the driver connection and wrap the copy with the same
    /// profiler
    ///
    /// # Errors
    /// Returns `DbError::NotSupported` if the driver connection cannot be
    /// duplicated
    pub fn duplicate(&self) -> DbResult<Arc<ProfiledConnection>> {
        let tail = self.inner.cloneable().ok_or_else(|| {
            DbError::NotSupported(format!(
                "Underlying {} is not cloneable",
                self.inner.type_name()
            ))
        })?;
        let copy = tail.clone_connection()?;
        trace!(inner = self.inner.type_name(), "Duplicated connection");
        Ok(ProfiledConnection::new(copy, self.profiler.clone()))
    }

    fn shared(&self) -> Option<Arc<ProfiledConnection>> {
        self.this.upgrade()
    }
}

impl DbConnection for ProfiledConnection {
    fn connection_string(&self) -> String {
        self.inner.connection_string()
    }

    fn set_connection_string(&self, value: &str) -> DbResult<()> {
        self.inner.set_connection_string(value)
    }

    fn connection_timeout(&self) -> Duration {
        self.inner.connection_timeout()
    }

    fn database(&self) -> String {
        self.inner.database()
    }

    fn data_source(&self) -> String {
        self.inner.data_source()
    }

    fn server_version(&self) -> DbResult<String> {
        self.inner.server_version()
    }

    fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    fn open(&self) -> DbResult<()> {
        self.inner.open()
    }

    fn close(&self) -> DbResult<()> {
        self.inner.close()
    }

    fn change_database(&self, name: &str) -> DbResult<()> {
        self.inner.change_database(name)
    }

    fn enlist_transaction(&self, transaction: Option<Uuid>) -> DbResult<()> {
        self.inner.enlist_transaction(transaction)
    }

    fn get_schema_restricted(
        &self,
        collection: &str,
        restrictions: &[Option<String>],
    ) -> DbResult<DataTable> {
        self.inner.get_schema_restricted(collection, restrictions)
    }

    fn get_schema(&self) -> DbResult<DataTable> {
        self.inner.get_schema()
    }

    fn get_schema_collection(&self, collection: &str) -> DbResult<DataTable> {
        self.inner.get_schema_collection(collection)
    }

    fn begin_transaction(&self, level: IsolationLevel) -> DbResult<Arc<dyn DbTransaction>> {
        let transaction = self.inner.begin_transaction(level)?;
        let profiled = ProfiledTransaction::try_new(Some(transaction), self.shared())?;
        Ok(Arc::new(profiled))
    }

    fn create_command(&self) -> DbResult<Box<dyn DbCommand>> {
        let command = self.inner.create_command()?;
        let connection = self.shared().map(|c| c as Arc<dyn DbConnection>);
        Ok(Box::new(ProfiledCommand::new(
            command,
            connection,
            self.profiler.clone(),
        )))
    }

    fn subscribe_state_change(&self, handler: StateChangeHandler) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    fn unsubscribe_state_change(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    fn cloneable(&self) -> Option<&dyn ConnectionClone> {
        Some(self)
    }
}

impl ConnectionClone for ProfiledConnection {
    fn clone_connection(&self) -> DbResult<Arc<dyn DbConnection>> {
        Ok(self.duplicate()?)
    }
}

impl Drop for ProfiledConnection {
    fn drop(&mut self) {
        self.inner.unsubscribe_state_change(self.subscription);
        if self.inner.state() != ConnectionState::Closed {
            if let Err(e) = self.inner.close() {
                warn!(error = %e, "Failed to close wrapped connection");
            }
        }
        self.profiler = None;
        trace!(inner = self.inner.type_name(), "Released connection");
    }
}

impl fmt::Debug for ProfiledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfiledConnection")
            .field("inner", &self.inner.type_name())
            .field("state", &self.inner.state())
            .field("profiled", &self.profiler.is_some())
            .finish()
    }
}
