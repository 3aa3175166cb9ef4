//! Error types for the Tidings state store.

use thiserror::Error;

/// Result type alias for substrate operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors raised by the durable substrate.
///
/// `KeyedStore` never surfaces these to its callers; they are logged and the
/// operation degrades to an empty result.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}
