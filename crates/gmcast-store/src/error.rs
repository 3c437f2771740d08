//! Error types for the storage layer.

use thiserror::Error;

/// Errors that can occur while committing or reading replicated state.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown command applied to the state machine")]
    UnknownCommand,

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
