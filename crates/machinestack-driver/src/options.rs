//! Driver options — the string map handed to the driver factory.
//!
//! The base map is fixed when the scheduler is built and shared read-only.
//! Per-invocation overrides (the remote node address) are applied to a
//! private copy, so no invocation can observe another's overrides.

use std::collections::HashMap;
use std::sync::Arc;

use crate::kind::DriverKind;

/// Immutable string → string options for constructing drivers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverOptions {
    values: Arc<HashMap<String, String>>,
}

impl DriverOptions {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Copy the options and set a single key on the copy.
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Self::new(values)
    }

    /// Copy the options and bind the copy to a remote endpoint for `kind`.
    pub fn with_remote(&self, kind: DriverKind, address: impl Into<String>) -> Self {
        self.with(kind.remote_option_key(), address)
    }

    /// The remote endpoint bound for `kind`, if any.
    pub fn remote(&self, kind: DriverKind) -> Option<&str> {
        self.get(&kind.remote_option_key())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, String>> for DriverOptions {
    fn from(values: HashMap<String, String>) -> Self {
        Self::new(values)
    }
}
