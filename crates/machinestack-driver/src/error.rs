//! Driver error types.

use thiserror::Error;

/// Result type alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors raised while constructing or calling a machine driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("unknown driver '{0}'")]
    UnknownDriver(String),

    #[error("invalid driver option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("{operation} '{machine}' failed: {message}")]
    Operation {
        operation: &'static str,
        machine: String,
        message: String,
    },

    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    pub(crate) fn operation(
        operation: &'static str,
        machine: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::Operation {
            operation,
            machine: machine.to_string(),
            message: message.into(),
        }
    }
}
