//! The service registry seam.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{RegistryError, RegistryResult};
use crate::types::{CatalogNode, ServiceEntry};

/// Read-only view of a service registry.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Instances of `service` whose health checks are all passing.
    async fn healthy_instances(&self, service: &str) -> RegistryResult<Vec<ServiceEntry>>;

    /// Resolve a node ID to its catalog entry. `None` if the node is unknown.
    async fn node(&self, node_id: &str) -> RegistryResult<Option<CatalogNode>>;
}

#[derive(Debug, Clone)]
struct Registration {
    node: CatalogNode,
    /// service name → passing
    services: HashMap<String, bool>,
}

/// In-process registry, for single-host setups and tests.
///
/// Counts every query so callers can assert that a code path never touched
/// the registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    nodes: RwLock<HashMap<String, Registration>>,
    queries: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` on `node` with the given health.
    pub fn register(&self, node: CatalogNode, service: &str, passing: bool) {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        let entry = nodes.entry(node.id.clone()).or_insert_with(|| Registration {
            node: node.clone(),
            services: HashMap::new(),
        });
        entry.node = node;
        entry.services.insert(service.to_string(), passing);
    }

    /// Flip the health of `service` on a node. Returns false if not registered.
    pub fn set_passing(&self, node_id: &str, service: &str, passing: bool) -> bool {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        match nodes
            .get_mut(node_id)
            .and_then(|r| r.services.get_mut(service))
        {
            Some(health) => {
                *health = passing;
                true
            }
            None => false,
        }
    }

    /// Remove a node and all its services.
    pub fn deregister(&self, node_id: &str) -> bool {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        nodes.remove(node_id).is_some()
    }

    /// Make every subsequent query fail, as if the agent were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Number of queries served so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn begin_query(&self) -> RegistryResult<()> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(RegistryError::Request("registry unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceRegistry for MemoryRegistry {
    async fn healthy_instances(&self, service: &str) -> RegistryResult<Vec<ServiceEntry>> {
        self.begin_query()?;
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<ServiceEntry> = nodes
            .values()
            .filter(|r| r.services.get(service).copied().unwrap_or(false))
            .map(|r| ServiceEntry {
                service: service.to_string(),
                node: r.node.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.node.id.cmp(&b.node.id));
        Ok(entries)
    }

    async fn node(&self, node_id: &str) -> RegistryResult<Option<CatalogNode>> {
        self.begin_query()?;
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        Ok(nodes.get(node_id).map(|r| r.node.clone()))
    }
}
