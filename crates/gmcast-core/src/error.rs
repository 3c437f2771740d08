//! Error types for the protocol core.

use thiserror::Error;

/// Errors surfaced by the protocol engine and its collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Protocol version not supported: {0}")]
    UnsupportedProtocol(u32),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Commit failure: {0}")]
    Commit(String),

    #[error("Unknown command applied to the state machine")]
    UnknownCommand,

    #[error("Deadline elapsed before the operation completed")]
    Timeout,

    #[error("Peer is stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
