//! Command parameters
//!
//! Parameters are plain data owned by the driver's command. Profiling
//! proxies hand out the driver's collection as-is.

use crate::db::types::{DataType, DbValue};

/// Direction a parameter travels relative to the statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl ParameterDirection {
    /// Whether the parameter carries a value into the statement
    pub fn is_input(self) -> bool {
        matches!(self, ParameterDirection::Input | ParameterDirection::InputOutput)
    }
}

/// A single named statement parameter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DbParameter {
    /// Parameter name as it appears in the command text (e.g. `@id`)
    pub name: String,
    /// Bound value
    pub value: DbValue,
    /// Parameter direction
    pub direction: ParameterDirection,
    /// Declared type, if the caller set one
    pub data_type: Option<DataType>,
}

impl DbParameter {
    /// Create an input parameter
    pub fn new(name: impl Into<String>, value: DbValue) -> Self {
        Self {
            name: name.into(),
            value,
            ..Default::default()
        }
    }

    /// Set the direction, builder style
    pub fn with_direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// Ordered collection of parameters attached to a command
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DbParameterCollection {
    params: Vec<DbParameter>,
}

impl DbParameterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, returning its index
    pub fn add(&mut self, param: DbParameter) -> usize {
        self.params.push(param);
        self.params.len() - 1
    }

    /// Append an input parameter by name and value
    pub fn add_with_value(&mut self, name: impl Into<String>, value: DbValue) -> usize {
        self.add(DbParameter::new(name, value))
    }

    pub fn get(&self, index: usize) -> Option<&DbParameter> {
        self.params.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut DbParameter> {
        self.params.get_mut(index)
    }

    /// Look up a parameter by exact name
    pub fn by_name(&self, name: &str) -> Option<&DbParameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Remove a parameter by name, returning it if present
    pub fn remove(&mut self, name: &str) -> Option<DbParameter> {
        let idx = self.params.iter().position(|p| p.name == name)?;
        Some(self.params.remove(idx))
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DbParameter> {
        self.params.iter()
    }
}

impl<'a> IntoIterator for &'a DbParameterCollection {
    type Item = &'a DbParameter;
    type IntoIter = std::slice::Iter<'a, DbParameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}
