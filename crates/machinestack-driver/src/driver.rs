//! The driver contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriverResult;
use crate::kind::DriverKind;
use crate::session::{ControlReceiver, SessionStreams, TerminalSize};

/// Optional resource limits requested for a new machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineAttributes {
    /// Number of CPUs to expose to the machine.
    pub cpu: Option<u32>,
    /// Memory limit in the driver's notation (e.g. `512MB`).
    pub memory: Option<String>,
}

impl MachineAttributes {
    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none()
    }
}

/// A machine driver bound to one endpoint (a remote node or the local host).
///
/// Implementations are constructed per invocation by a
/// [`DriverFactory`](crate::factory::DriverFactory) and are expected to be
/// cheap to build.
#[async_trait]
pub trait Driver: Send + Sync {
    /// The kind this driver implements.
    fn kind(&self) -> DriverKind;

    /// Provision a machine named `name` from `image`.
    async fn create(&self, name: &str, image: &str, attrs: &MachineAttributes) -> DriverResult<()>;

    /// Deprovision the machine named `name`.
    async fn delete(&self, name: &str) -> DriverResult<()>;

    /// Run an interactive session inside `name`.
    ///
    /// Blocks until the remote process exits or a stream fails. Control
    /// messages received on `control` are applied while the session runs;
    /// a closed control channel does not end the session.
    async fn session(
        &self,
        name: &str,
        streams: SessionStreams,
        control: ControlReceiver,
        size: TerminalSize,
    ) -> DriverResult<()>;
}
