//! Node selector — weighted random choice over healthy registry instances.
//!
//! Every call re-queries the registry and makes one independent draw, so no
//! node is ever excluded by earlier selections and no state is kept between
//! calls.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::ServiceRegistry;
use crate::types::{CatalogNode, ServiceEntry, WEIGHT_META_KEY};
use crate::weighted::{choose_weighted, valid_weight};

/// Picks the node that should host a new machine.
#[derive(Clone)]
pub struct NodeSelector {
    registry: Arc<dyn ServiceRegistry>,
}

impl NodeSelector {
    pub fn new(registry: Arc<dyn ServiceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn ServiceRegistry> {
        &self.registry
    }

    /// Select a healthy node advertising `service`.
    ///
    /// Fails with [`RegistryError::NoHealthyHost`] when no instance passes
    /// its health checks.
    pub async fn select(&self, service: &str) -> RegistryResult<CatalogNode> {
        let candidates = self.registry.healthy_instances(service).await?;
        let chosen = {
            // `ThreadRng` is not `Send`; it must not live across an await.
            let mut rng = rand::thread_rng();
            pick(service, candidates, &mut rng)?
        };
        debug!(%service, node = %chosen.id, host = %chosen.host(), "node selected");
        Ok(chosen)
    }
}

/// One weighted draw over `candidates`.
pub fn pick<R: Rng + ?Sized>(
    service: &str,
    candidates: Vec<ServiceEntry>,
    rng: &mut R,
) -> RegistryResult<CatalogNode> {
    let weights: Vec<u32> = candidates
        .iter()
        .map(|entry| {
            if let Some(raw) = entry.node.meta.get(WEIGHT_META_KEY) {
                if valid_weight(raw).is_none() {
                    warn!(node = %entry.node.id, %raw, "invalid node weight, using 1");
                }
            }
            entry.node.weight()
        })
        .collect();

    let index = choose_weighted(&weights, rng)
        .ok_or_else(|| RegistryError::NoHealthyHost(service.to_string()))?;
    let total: u64 = weights.iter().map(|&w| u64::from(w)).sum();
    debug!(%service, candidates = candidates.len(), total_weight = total, index, "weighted draw");

    candidates
        .into_iter()
        .nth(index)
        .map(|entry| entry.node)
        .ok_or_else(|| RegistryError::NoHealthyHost(service.to_string()))
}
