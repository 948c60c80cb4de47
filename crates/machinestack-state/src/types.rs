//! Domain types persisted by the state store.

use serde::{Deserialize, Serialize};

/// Unique identifier for a node, as reported by the service registry.
pub type NodeId = String;

/// Provisioning record for a single machine.
///
/// `node_id` is empty when the machine was created by the local scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineRecord {
    /// Image reference the machine was launched from (e.g. `ubuntu/trusty`).
    pub image: String,
    /// Driver kind that owns the machine (e.g. `lxd`).
    pub driver: String,
    /// Owning node, empty for single-host deployments.
    #[serde(rename = "nodeID", default)]
    pub node_id: NodeId,
}

impl MachineRecord {
    pub fn new(image: impl Into<String>, driver: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            driver: driver.into(),
            node_id: node_id.into(),
        }
    }

    /// Whether the record was written by the local scheduler.
    pub fn is_local(&self) -> bool {
        self.node_id.is_empty()
    }
}

/// A machine record paired with its name, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineEntry {
    pub name: String,
    pub record: MachineRecord,
}
