//! Cluster scheduler — places machines on registry-discovered nodes.
//!
//! The state store is the only record of which node owns a machine. Delete
//! and Exec read it back before any registry or driver call is made.

use std::sync::Arc;

use machinestack_driver::{
    ControlReceiver, Driver, DriverFactory, DriverKind, DriverOptions, MachineAttributes,
    SessionStreams, TerminalSize,
};
use machinestack_registry::{CatalogNode, NodeSelector, RegistryError, ServiceRegistry};
use machinestack_state::{MachineRecord, NodeId, StateStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::locks::NameLocks;
use crate::session::run_session;

pub struct ClusterScheduler {
    state: StateStore,
    selector: NodeSelector,
    factory: Arc<dyn DriverFactory>,
    /// Base driver options; each dispatch binds a copy to one node.
    options: DriverOptions,
    driver_port: u16,
    locks: NameLocks,
}

impl ClusterScheduler {
    pub fn new(
        state: StateStore,
        registry: Arc<dyn ServiceRegistry>,
        factory: Arc<dyn DriverFactory>,
        options: DriverOptions,
        driver_port: u16,
    ) -> Self {
        Self {
            state,
            selector: NodeSelector::new(registry),
            factory,
            options,
            driver_port,
            locks: NameLocks::new(),
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Provision `name` on a selected node and record its owner.
    ///
    /// Returns the ID of the node the machine was placed on.
    pub async fn create(
        &self,
        name: &str,
        image: &str,
        driver: &str,
        attrs: &MachineAttributes,
    ) -> SchedulerResult<NodeId> {
        let kind: DriverKind = driver.parse()?;
        let _guard = self.locks.lock(name).await;

        if self.state.get_machine(name)?.is_some() {
            return Err(SchedulerError::MachineExists(name.to_string()));
        }

        let node = self.selector.select(kind.service_name()).await?;
        let driver = self.driver_for(kind, &node)?;
        driver.create(name, image, attrs).await?;

        let record = MachineRecord::new(image, kind.as_str(), node.id.clone());
        if let Err(e) = self.state.put_machine(name, &record) {
            // The machine exists remotely but nothing points at it; undo.
            error!(%name, node = %node.id, error = %e, "failed to record machine, deprovisioning");
            if let Err(undo) = driver.delete(name).await {
                warn!(%name, node = %node.id, error = %undo, "deprovision after failed record also failed");
            }
            return Err(e.into());
        }

        info!(%name, %image, driver = %kind, node = %node.id, "machine created");
        Ok(node.id)
    }

    /// Deprovision `name`, removing its record only once the driver succeeds.
    pub async fn delete(&self, name: &str) -> SchedulerResult<()> {
        let _guard = self.locks.lock(name).await;
        let (record, driver) = self.resolve(name).await?;

        driver.delete(name).await?;
        self.state.delete_machine(name)?;

        info!(%name, node = %record.node_id, "machine deleted");
        Ok(())
    }

    /// Run an interactive session in `name` until it ends or `cancel` fires.
    pub async fn session(
        &self,
        name: &str,
        streams: SessionStreams,
        control: ControlReceiver,
        size: TerminalSize,
        cancel: &CancellationToken,
    ) -> SchedulerResult<()> {
        let (record, driver) = {
            let _guard = self.locks.lock(name).await;
            self.resolve(name).await?
        };

        info!(%name, node = %record.node_id, %size, "session opened");
        run_session(name, driver, streams, control, size, cancel).await
    }

    pub fn machine(&self, name: &str) -> SchedulerResult<Option<MachineRecord>> {
        Ok(self.state.get_machine(name)?)
    }

    /// Look up the owning node of `name` and build a driver bound to it.
    async fn resolve(&self, name: &str) -> SchedulerResult<(MachineRecord, Arc<dyn Driver>)> {
        let record = self
            .state
            .get_machine(name)?
            .ok_or_else(|| SchedulerError::MachineNotFound(name.to_string()))?;
        let kind: DriverKind = record.driver.parse()?;

        let node = self
            .selector
            .registry()
            .node(&record.node_id)
            .await?
            .ok_or_else(|| {
                warn!(%name, node = %record.node_id, "owning node is no longer registered");
                RegistryError::UnknownNode(record.node_id.clone())
            })?;

        debug!(%name, node = %node.id, host = %node.host(), "resolved owning node");
        let driver = self.driver_for(kind, &node)?;
        Ok((record, driver))
    }

    fn driver_for(&self, kind: DriverKind, node: &CatalogNode) -> SchedulerResult<Arc<dyn Driver>> {
        let options = self.options.with_remote(kind, self.remote_address(node));
        Ok(self.factory.new_driver(kind, options)?)
    }

    /// `<host>:<driver_port>` for a node.
    pub fn remote_address(&self, node: &CatalogNode) -> String {
        format!("{}:{}", node.host(), self.driver_port)
    }
}
