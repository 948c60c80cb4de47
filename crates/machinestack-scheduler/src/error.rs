//! Scheduler error types.

use machinestack_driver::DriverError;
use machinestack_registry::RegistryError;
use machinestack_state::StateError;
use thiserror::Error;

/// Errors returned by scheduler operations.
///
/// Nothing is retried internally; every error goes back to the caller.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no healthy hosts found for driver '{0}'")]
    NoHealthyHost(String),

    #[error("unknown driver '{0}'")]
    UnknownDriver(String),

    #[error("machine '{0}' does not exist")]
    MachineNotFound(String),

    #[error("machine '{0}' already exists")]
    MachineExists(String),

    #[error("unknown scheduler '{0}'")]
    UnknownScheduler(String),

    #[error("session for machine '{0}' was cancelled")]
    Cancelled(String),

    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("driver error: {0}")]
    Driver(DriverError),

    #[error("registry error: {0}")]
    Registry(RegistryError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl From<DriverError> for SchedulerError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::UnknownDriver(kind) => SchedulerError::UnknownDriver(kind),
            other => SchedulerError::Driver(other),
        }
    }
}

impl From<RegistryError> for SchedulerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NoHealthyHost(service) => SchedulerError::NoHealthyHost(service),
            other => SchedulerError::Registry(other),
        }
    }
}
