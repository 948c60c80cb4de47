//! Error types for the machine state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Failures reading or writing machine ownership records.
///
/// Every variant aborts the operation; callers make no assumption about the
/// record's consistency afterwards.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open machine state database: {0}")]
    Open(String),

    #[error("machine state transaction failed: {0}")]
    Transaction(String),

    #[error("cannot open machines table: {0}")]
    Table(String),

    #[error("reading machine record failed: {0}")]
    Read(String),

    #[error("writing machine record failed: {0}")]
    Write(String),

    #[error("cannot encode machine record: {0}")]
    Serialize(String),

    #[error("stored machine record is malformed: {0}")]
    Deserialize(String),
}
