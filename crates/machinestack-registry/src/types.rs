//! Registry data as seen by the scheduler.

use std::collections::HashMap;

use crate::weighted::parse_weight;

/// Node metadata key holding the selection weight.
pub const WEIGHT_META_KEY: &str = "weight";

/// A node as listed in the registry catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogNode {
    pub id: String,
    pub name: String,
    /// Network address; may be empty when only the name resolves.
    pub address: String,
    pub meta: HashMap<String, String>,
}

impl CatalogNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            meta: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Host to dial: the address, or the node name when no address is set.
    pub fn host(&self) -> &str {
        if self.address.is_empty() {
            &self.name
        } else {
            &self.address
        }
    }

    /// Selection weight from the `weight` metadata, defaulting to 1.
    pub fn weight(&self) -> u32 {
        parse_weight(self.meta.get(WEIGHT_META_KEY).map(String::as_str))
    }
}

/// One instance of a service, on one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub service: String,
    pub node: CatalogNode,
}
