//! Core data model for the gmcast generic multicast protocol.
//!
//! This crate holds the protocol's value types and small shared-state
//! primitives: messages and their state tags, the logical clock, the
//! previous set used for conflict tracking, the per-message timestamp
//! memo, and the pluggable conflict relation.

pub mod clock;
pub mod conflict;
pub mod error;
pub mod memo;
pub mod message;
pub mod previous_set;

pub use clock::LogicalClock;
pub use conflict::{AlwaysConflict, ConflictRelation, DestinationConflict, NeverConflict};
pub use error::{ProtocolError, Result};
pub use memo::Memo;
pub use message::{
    Message, MessageState, MessageType, Operation, Partition, Payload, Response, Uid,
    PROTOCOL_VERSION,
};
pub use previous_set::PreviousSet;
