//! Scheduler — the operations the API layer calls.
//!
//! Both variants share one contract:
//!
//! - `create` provisions a machine and records `{image, driver, nodeID}`
//!   only after the driver succeeds
//! - `delete` fails with `MachineNotFound` before touching any driver, and
//!   removes the record only after the driver succeeds
//! - `session` resolves the machine the same way and hands the streams and
//!   control channel to the driver unmodified

use std::sync::Arc;

use machinestack_driver::{
    ControlReceiver, DriverFactory, MachineAttributes, SessionStreams, TerminalSize,
};
use machinestack_registry::{ConsulRegistry, ServiceRegistry};
use machinestack_state::{MachineEntry, MachineRecord, NodeId, StateStore};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cluster::ClusterScheduler;
use crate::config::{SchedulerConfig, SchedulerKind};
use crate::error::SchedulerResult;
use crate::local::LocalScheduler;

/// A scheduler of either variant.
pub enum Scheduler {
    Cluster(ClusterScheduler),
    Local(LocalScheduler),
}

impl Scheduler {
    pub fn kind(&self) -> SchedulerKind {
        match self {
            Scheduler::Cluster(_) => SchedulerKind::Cluster,
            Scheduler::Local(_) => SchedulerKind::Local,
        }
    }

    /// Provision a machine. Returns the owning node ID, empty when local.
    pub async fn create(
        &self,
        name: &str,
        image: &str,
        driver: &str,
        attrs: &MachineAttributes,
    ) -> SchedulerResult<NodeId> {
        match self {
            Scheduler::Cluster(s) => s.create(name, image, driver, attrs).await,
            Scheduler::Local(s) => s.create(name, image, driver, attrs).await,
        }
    }

    pub async fn delete(&self, name: &str) -> SchedulerResult<()> {
        match self {
            Scheduler::Cluster(s) => s.delete(name).await,
            Scheduler::Local(s) => s.delete(name).await,
        }
    }

    /// Run an interactive session; returns when the remote process exits,
    /// a stream fails, or `cancel` fires.
    pub async fn session(
        &self,
        name: &str,
        streams: SessionStreams,
        control: ControlReceiver,
        size: TerminalSize,
        cancel: &CancellationToken,
    ) -> SchedulerResult<()> {
        match self {
            Scheduler::Cluster(s) => s.session(name, streams, control, size, cancel).await,
            Scheduler::Local(s) => s.session(name, streams, control, size, cancel).await,
        }
    }

    /// The persisted record for `name`, if any.
    pub fn machine(&self, name: &str) -> SchedulerResult<Option<MachineRecord>> {
        match self {
            Scheduler::Cluster(s) => s.machine(name),
            Scheduler::Local(s) => s.machine(name),
        }
    }

    /// Every recorded machine, ordered by name.
    pub fn machines(&self) -> SchedulerResult<Vec<MachineEntry>> {
        let state = match self {
            Scheduler::Cluster(s) => s.state(),
            Scheduler::Local(s) => s.state(),
        };
        Ok(state.list_machines()?)
    }
}

impl From<ClusterScheduler> for Scheduler {
    fn from(s: ClusterScheduler) -> Self {
        Scheduler::Cluster(s)
    }
}

impl From<LocalScheduler> for Scheduler {
    fn from(s: LocalScheduler) -> Self {
        Scheduler::Local(s)
    }
}

/// Build the scheduler named by `config`.
///
/// The cluster variant talks to the Consul agent at `config.registry`.
/// Fails with `UnknownScheduler` for any other name.
pub fn build_scheduler(
    config: &SchedulerConfig,
    state: StateStore,
    factory: Arc<dyn DriverFactory>,
) -> SchedulerResult<Scheduler> {
    let kind = config.kind()?;
    let options = config.driver_options();

    let scheduler = match kind {
        SchedulerKind::Local => LocalScheduler::new(state, factory, options).into(),
        SchedulerKind::Cluster => {
            let mut consul = ConsulRegistry::new(config.registry.address.clone())
                .with_timeout(config.registry.timeout());
            if let Some(token) = &config.registry.token {
                consul = consul.with_token(token.clone());
            }
            let registry: Arc<dyn ServiceRegistry> = Arc::new(consul);
            ClusterScheduler::new(state, registry, factory, options, config.driver_port).into()
        }
    };

    info!(scheduler = kind.as_str(), registry = %config.registry.address, "scheduler built");
    Ok(scheduler)
}
