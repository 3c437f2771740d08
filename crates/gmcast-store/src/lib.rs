//! Storage layer for the gmcast protocol: an append-only log of
//! committed messages over a pluggable key/value storage backend, and
//! the state machine that commits delivered messages into both.

pub mod error;
pub mod log;
pub mod state_machine;
pub mod storage;

pub use error::{Result, StoreError};
pub use log::{Log, LogEntry};
pub use state_machine::{InMemoryStateMachine, StateMachine};
pub use storage::{MemoryStorage, Storage, StorageEntry};
