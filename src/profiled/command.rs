//! Profiled command

use crate::db::parameters::{DbParameter, DbParameterCollection};
use crate::db::provider::{
    BindByNameFn, CommandClone, DbCommand, DbConnection, DbReader, DbTransaction,
};
use crate::db::types::{CommandBehavior, CommandType, DbValue, UpdateRowSource};
use crate::error::{DbError, DbResult};
use crate::link::LinkCache;
use crate::profiled::{ProfiledConnection, ProfiledReader, ProfiledTransaction};
use crate::profiler::{self, DbProfiler, SqlExecuteType};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::trace;

/// By-name binding setters, resolved once per concrete command type
static BIND_BY_NAME: LazyLock<LinkCache<TypeId, Option<BindByNameFn>>> =
    LazyLock::new(LinkCache::new);

/// Wraps a driver command, reporting each execution to a profiler
///
/// When no profiler is attached, or the attached one is inactive, every
/// execution goes straight to the driver and readers are returned unwrapped.
/// Otherwise each execution is bracketed by `execute_start` and
/// `execute_finish`, with `on_error` receiving the driver's error before it is
/// returned unchanged.
pub struct ProfiledCommand {
    command: Box<dyn DbCommand>,
    connection: Option<Arc<dyn DbConnection>>,
    transaction: Option<Arc<dyn DbTransaction>>,
    profiler: Option<Arc<dyn DbProfiler>>,
    bind_by_name: bool,
}

impl ProfiledCommand {
    pub fn new(
        command: Box<dyn DbCommand>,
        connection: Option<Arc<dyn DbConnection>>,
        profiler: Option<Arc<dyn DbProfiler>>,
    ) -> Self {
        Self {
            command,
            connection,
            transaction: None,
            profiler,
            bind_by_name: false,
        }
    }

    /// Like [`ProfiledCommand::new`], failing if `command` is absent
    pub fn try_new(
        command: Option<Box<dyn DbCommand>>,
        connection: Option<Arc<dyn DbConnection>>,
        profiler: Option<Arc<dyn DbProfiler>>,
    ) -> DbResult<Self> {
        let command = command.ok_or(DbError::InvalidArgument("command"))?;
        Ok(Self::new(command, connection, profiler))
    }

    /// The underlying driver command
    pub fn internal_command(&self) -> &dyn DbCommand {
        self.command.as_ref()
    }

    pub fn internal_command_mut(&mut self) -> &mut dyn DbCommand {
        self.command.as_mut()
    }

    pub fn profiler(&self) -> Option<&Arc<dyn DbProfiler>> {
        self.profiler.as_ref()
    }

    pub fn bind_by_name(&self) -> bool {
        self.bind_by_name
    }

    /// Bind parameters by name rather than by position
    ///
    /// Forwarded to the driver command when its type has a by-name toggle;
    /// the preference is recorded either way.
    pub fn set_bind_by_name(&mut self, value: bool) {
        if self.bind_by_name == value {
            return;
        }
        if let Some(setter) = bind_by_name_setter(self.command.as_ref()) {
            setter(self.command.as_mut(), value);
        }
        self.bind_by_name = value;
    }

    /// Duplicate the driver command and wrap the copy with the same
    /// connection and profiler
    ///
    /// # Errors
    /// Returns `DbError::NotSupported` if the driver command cannot be
    /// duplicated
    pub fn duplicate(&self) -> DbResult<ProfiledCommand> {
        let tail = self.command.cloneable().ok_or_else(|| {
            DbError::NotSupported(format!(
                "Underlying {} is not cloneable",
                self.command.type_name()
            ))
        })?;
        let mut copy = ProfiledCommand::new(
            tail.clone_command()?,
            self.connection.clone(),
            self.profiler.clone(),
        );
        copy.bind_by_name = self.bind_by_name;
        Ok(copy)
    }

    fn active_profiler(&self) -> Option<&Arc<dyn DbProfiler>> {
        self.profiler.as_ref().filter(|p| p.is_active())
    }

    fn profiled<T>(
        &self,
        execute_type: SqlExecuteType,
        execute: impl FnOnce(&dyn DbCommand) -> DbResult<T>,
    ) -> DbResult<T> {
        let Some(profiler) = self.active_profiler() else {
            return execute(self.command.as_ref());
        };

        let scope = ExecuteScope::enter(self, profiler, execute_type);
        match execute(self.command.as_ref()) {
            Ok(value) => {
                scope.finish(None);
                Ok(value)
            }
            Err(e) => {
                scope.fail(&e);
                Err(e)
            }
        }
    }
}

/// Resolve the by-name toggle of `command`'s concrete type, probing the
/// type the first time it is seen
fn bind_by_name_setter(command: &dyn DbCommand) -> Option<BindByNameFn> {
    let key = (command as &dyn Any).type_id();
    if let Some(setter) = BIND_BY_NAME.get(&key) {
        return setter;
    }

    let setter = command.bind_by_name_toggle();
    trace!(
        command_type = command.type_name(),
        supported = setter.is_some(),
        "Resolved by-name binding toggle"
    );
    // Another thread may have resolved the same type first; use its answer.
    BIND_BY_NAME.try_add(key, setter).into_value()
}

fn toggle_profiled_bind_by_name(command: &mut dyn DbCommand, value: bool) {
    if let Some(profiled) = (command as &mut dyn Any).downcast_mut::<ProfiledCommand>() {
        profiled.set_bind_by_name(value);
    }
}

/// Driver object behind `connection`, looking through one proxy layer
fn unwrap_connection(connection: &Arc<dyn DbConnection>) -> Arc<dyn DbConnection> {
    match (&**connection as &dyn Any).downcast_ref::<ProfiledConnection>() {
        Some(profiled) => Arc::clone(profiled.wrapped_connection()),
        None => Arc::clone(connection),
    }
}

/// Driver object behind `transaction`, looking through one proxy layer
fn unwrap_transaction(transaction: &Arc<dyn DbTransaction>) -> Arc<dyn DbTransaction> {
    match (&**transaction as &dyn Any).downcast_ref::<ProfiledTransaction>() {
        Some(profiled) => Arc::clone(profiled.wrapped_transaction()),
        None => Arc::clone(transaction),
    }
}

/// Brackets one profiled execution. `execute_finish` fires exactly once:
/// from `finish`/`fail`, or from `Drop` if the execution unwinds.
struct ExecuteScope<'a> {
    command: &'a ProfiledCommand,
    profiler: &'a Arc<dyn DbProfiler>,
    execute_type: SqlExecuteType,
    finished: bool,
}

impl<'a> ExecuteScope<'a> {
    fn enter(
        command: &'a ProfiledCommand,
        profiler: &'a Arc<dyn DbProfiler>,
        execute_type: SqlExecuteType,
    ) -> Self {
        profiler.execute_start(command, execute_type);
        Self {
            command,
            profiler,
            execute_type,
            finished: false,
        }
    }

    fn fail(self, error: &DbError) {
        self.profiler.on_error(self.command, self.execute_type, error);
        self.finish(None);
    }

    fn finish(mut self, reader: Option<&dyn DbReader>) {
        self.finished = true;
        self.profiler
            .execute_finish(self.command, self.execute_type, reader);
    }
}

impl Drop for ExecuteScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.profiler
                .execute_finish(self.command, self.execute_type, None);
        }
    }
}

impl DbCommand for ProfiledCommand {
    fn command_text(&self) -> &str {
        self.command.command_text()
    }

    fn set_command_text(&mut self, text: &str) {
        self.command.set_command_text(text);
    }

    fn command_timeout(&self) -> Duration {
        self.command.command_timeout()
    }

    fn set_command_timeout(&mut self, timeout: Duration) {
        self.command.set_command_timeout(timeout);
    }

    fn command_type(&self) -> CommandType {
        self.command.command_type()
    }

    fn set_command_type(&mut self, command_type: CommandType) {
        self.command.set_command_type(command_type);
    }

    fn design_time_visible(&self) -> bool {
        self.command.design_time_visible()
    }

    fn set_design_time_visible(&mut self, visible: bool) {
        self.command.set_design_time_visible(visible);
    }

    fn updated_row_source(&self) -> UpdateRowSource {
        self.command.updated_row_source()
    }

    fn set_updated_row_source(&mut self, source: UpdateRowSource) {
        self.command.set_updated_row_source(source);
    }

    fn parameters(&self) -> &DbParameterCollection {
        self.command.parameters()
    }

    fn parameters_mut(&mut self) -> &mut DbParameterCollection {
        self.command.parameters_mut()
    }

    fn connection(&self) -> Option<Arc<dyn DbConnection>> {
        self.connection.clone()
    }

    fn set_connection(&mut self, connection: Option<Arc<dyn DbConnection>>) -> DbResult<()> {
        // A reused command may be rebound under a different profiler.
        if let Some(current) = profiler::current() {
            self.profiler = Some(current);
        }

        let inner = connection.as_ref().map(unwrap_connection);
        self.connection = connection;
        self.command.set_connection(inner)
    }

    fn transaction(&self) -> Option<Arc<dyn DbTransaction>> {
        self.transaction.clone()
    }

    fn set_transaction(&mut self, transaction: Option<Arc<dyn DbTransaction>>) -> DbResult<()> {
        let inner = transaction.as_ref().map(unwrap_transaction);
        self.transaction = transaction;
        self.command.set_transaction(inner)
    }

    fn execute_reader(&self, behavior: CommandBehavior) -> DbResult<Box<dyn DbReader>> {
        let Some(profiler) = self.active_profiler() else {
            return self.command.execute_reader(behavior);
        };

        let scope = ExecuteScope::enter(self, profiler, SqlExecuteType::Reader);
        match self.command.execute_reader(behavior) {
            Ok(reader) => {
                let wrapped = ProfiledReader::new(
                    Some(reader),
                    self.connection.clone(),
                    Some(Arc::clone(profiler)),
                );
                scope.finish(Some(&wrapped));
                Ok(Box::new(wrapped))
            }
            Err(e) => {
                scope.fail(&e);
                Err(e)
            }
        }
    }

    fn execute_non_query(&self) -> DbResult<i64> {
        self.profiled(SqlExecuteType::NonQuery, |command| {
            command.execute_non_query()
        })
    }

    fn execute_scalar(&self) -> DbResult<DbValue> {
        self.profiled(SqlExecuteType::Scalar, |command| command.execute_scalar())
    }

    fn cancel(&self) {
        self.command.cancel();
    }

    fn prepare(&self) -> DbResult<()> {
        self.command.prepare()
    }

    fn create_parameter(&self) -> DbParameter {
        self.command.create_parameter()
    }

    fn cloneable(&self) -> Option<&dyn CommandClone> {
        Some(self)
    }

    fn bind_by_name_toggle(&self) -> Option<BindByNameFn> {
        Some(toggle_profiled_bind_by_name)
    }
}

impl CommandClone for ProfiledCommand {
    fn clone_command(&self) -> DbResult<Box<dyn DbCommand>> {
        Ok(Box::new(self.duplicate()?))
    }
}

impl fmt::Debug for ProfiledCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfiledCommand")
            .field("inner", &self.command.type_name())
            .field("command_text", &self.command.command_text())
            .field("bind_by_name", &self.bind_by_name)
            .field("profiled", &self.profiler.is_some())
            .finish()
    }
}
