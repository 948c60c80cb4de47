//! Registry error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while querying the service registry or selecting a node.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no healthy hosts found for service '{0}'")]
    NoHealthyHost(String),

    #[error("node '{0}' is not registered")]
    UnknownNode(String),

    #[error("registry request failed: {0}")]
    Request(String),

    #[error("registry returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("registry response could not be decoded: {0}")]
    Decode(String),

    #[error("registry request timed out after {0:?}")]
    Timeout(Duration),
}
