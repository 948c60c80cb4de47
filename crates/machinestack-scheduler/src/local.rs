//! Local scheduler — every machine lives on this host.
//!
//! Same operations and errors as the cluster scheduler, minus node
//! selection: drivers are built from the base options untouched and records
//! carry an empty node ID.

use std::sync::Arc;

use machinestack_driver::{
    ControlReceiver, Driver, DriverFactory, DriverKind, DriverOptions, MachineAttributes,
    SessionStreams, TerminalSize,
};
use machinestack_state::{MachineRecord, NodeId, StateStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::locks::NameLocks;
use crate::session::run_session;

pub struct LocalScheduler {
    state: StateStore,
    factory: Arc<dyn DriverFactory>,
    options: DriverOptions,
    locks: NameLocks,
}

impl LocalScheduler {
    pub fn new(state: StateStore, factory: Arc<dyn DriverFactory>, options: DriverOptions) -> Self {
        Self {
            state,
            factory,
            options,
            locks: NameLocks::new(),
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Provision `name` locally. The returned node ID is always empty.
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

        let driver = self.driver(kind)?;
        driver.create(name, image, attrs).await?;

        let record = MachineRecord::new(image, kind.as_str(), NodeId::new());
        if let Err(e) = self.state.put_machine(name, &record) {
            error!(%name, error = %e, "failed to record machine, deprovisioning");
            if let Err(undo) = driver.delete(name).await {
                warn!(%name, error = %undo, "deprovision after failed record also failed");
            }
            return Err(e.into());
        }

        info!(%name, %image, driver = %kind, "machine created locally");
        Ok(record.node_id)
    }

    pub async fn delete(&self, name: &str) -> SchedulerResult<()> {
        let _guard = self.locks.lock(name).await;
        let driver = self.resolve(name)?;

        driver.delete(name).await?;
        self.state.delete_machine(name)?;

        info!(%name, "machine deleted locally");
        Ok(())
    }

    pub async fn session(
        &self,
        name: &str,
        streams: SessionStreams,
        control: ControlReceiver,
        size: TerminalSize,
        cancel: &CancellationToken,
    ) -> SchedulerResult<()> {
        let driver = {
            let _guard = self.locks.lock(name).await;
            self.resolve(name)?
        };

        info!(%name, %size, "session opened");
        run_session(name, driver, streams, control, size, cancel).await
    }

    pub fn machine(&self, name: &str) -> SchedulerResult<Option<MachineRecord>> {
        Ok(self.state.get_machine(name)?)
    }

    fn resolve(&self, name: &str) -> SchedulerResult<Arc<dyn Driver>> {
        let record = self
            .state
            .get_machine(name)?
            .ok_or_else(|| SchedulerError::MachineNotFound(name.to_string()))?;
        let kind: DriverKind = record.driver.parse()?;
        self.driver(kind)
    }

    fn driver(&self, kind: DriverKind) -> SchedulerResult<Arc<dyn Driver>> {
        Ok(self.factory.new_driver(kind, self.options.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use machinestack_driver::NativeDriverFactory;

    #[tokio::test]
    async fn unknown_persisted_driver_is_reported() {
        let scheduler = LocalScheduler::new(
            StateStore::open_in_memory().unwrap(),
            Arc::new(NativeDriverFactory),
            DriverOptions::default(),
        );
        scheduler
            .state()
            .put_machine("m1", &MachineRecord::new("img", "vmware", ""))
            .unwrap();

        let err = scheduler.delete("m1").await.unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownDriver(ref k) if k == "vmware"));
    }

    #[tokio::test]
    async fn missing_machine_is_not_found() {
        let scheduler = LocalScheduler::new(
            StateStore::open_in_memory().unwrap(),
            Arc::new(NativeDriverFactory),
            DriverOptions::default(),
        );

        let err = scheduler.delete("ghost").await.unwrap_err();
        assert!(matches!(err, SchedulerError::MachineNotFound(ref n) if n == "ghost"));
    }
}
