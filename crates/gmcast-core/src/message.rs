//! Protocol message types and the client-facing response.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Protocol version stamped on every message. Peers drop messages
/// carrying a different version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Globally unique message identifier, assigned by the originator.
///
/// Backed by a ULID string, so ordering ties on equal timestamps break
/// bytewise and deterministically at every peer.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Uid(pub String);

impl Uid {
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a replica group. Every correct member of a partition converges
/// on the same committed state.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Partition(pub String);

impl Partition {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of operation carried by a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Mutates the replicated state.
    Command,
    /// Reads the replicated state; still ordered by the protocol when
    /// multicast, but served from the log snapshot.
    Query,
}

impl Default for Operation {
    fn default() -> Self {
        Operation::Command
    }
}

/// The client data a message transports.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// What kind of operation is being executed.
    pub operation: Operation,

    /// Associates the value with something so retrieval is easier.
    pub key: Vec<u8>,

    /// The value written into the state machine. Only meaningful for
    /// commands; empty for queries.
    pub value: Vec<u8>,

    /// Opaque middleware bytes, carried untouched end to end.
    pub extensions: Vec<u8>,
}

/// Protocol state of a message at a given peer.
///
/// Ordering reflects protocol advancement: a message may only move
/// forward, and the received queue only replaces an entry with an equal
/// or more advanced one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageState {
    /// No timestamp assigned yet.
    S0,
    /// Local timestamp assigned, waiting on the cross-partition exchange.
    S1,
    /// Final timestamp adopted from the exchange, clock not yet caught up.
    S2,
    /// Final: timestamp fixed, ready for ordered delivery.
    S3,
}

/// Whether a message is an in-partition protocol step or a
/// cross-partition timestamp exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Initial,
    External,
}

/// A protocol message. Round-trips losslessly through serde.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Globally unique, originator-assigned.
    pub id: Uid,

    /// Originating partition; for external messages, the partition whose
    /// timestamp this message carries.
    pub from: Partition,

    /// Non-empty set of destination partitions.
    pub destination: Vec<Partition>,

    /// Client content.
    pub payload: Payload,

    /// Monotone non-decreasing within a partition once final.
    pub timestamp: u64,

    /// Protocol state at the sending peer.
    pub state: MessageState,

    /// Initial or external.
    pub mtype: MessageType,

    /// Must equal the receiving peer's version.
    pub protocol_version: u32,
}

impl Message {
    /// Build a fresh client message in its pre-timestamp state.
    pub fn new(from: Partition, destination: Vec<Partition>, payload: Payload) -> Self {
        Self {
            id: Uid::new(),
            from,
            destination,
            payload,
            timestamp: 0,
            state: MessageState::S0,
            mtype: MessageType::Initial,
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

/// Outcome of a request, resolved once the message commits locally.
#[derive(Clone, Debug)]
pub struct Response {
    /// Whether the operation committed.
    pub success: bool,

    /// Identifier of the message this response answers.
    pub identifier: Uid,

    /// Command responses echo the written payload; query responses carry
    /// the full committed history in append order.
    pub data: Vec<Payload>,

    /// Set when `success` is false.
    pub failure: Option<ProtocolError>,
}

impl Response {
    /// A successful response carrying the given payloads.
    pub fn ok(identifier: Uid, data: Vec<Payload>) -> Self {
        Self {
            success: true,
            identifier,
            data,
            failure: None,
        }
    }

    /// A failed response carrying the error.
    pub fn failed(identifier: Uid, failure: ProtocolError) -> Self {
        Self {
            success: false,
            identifier,
            data: Vec::new(),
            failure: Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roundtrip() {
        let message = Message::new(
            Partition::new("p1"),
            vec![Partition::new("p1"), Partition::new("p2")],
            Payload {
                operation: Operation::Command,
                key: b"k".to_vec(),
                value: b"v".to_vec(),
                extensions: vec![1, 2, 3],
            },
        );

        let bytes = serde_json::to_vec(&message).unwrap();
        let decoded: Message = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(message, decoded);
    }

    #[test]
    fn test_state_ordering() {
        assert!(MessageState::S0 < MessageState::S1);
        assert!(MessageState::S1 < MessageState::S2);
        assert!(MessageState::S2 < MessageState::S3);
    }

    #[test]
    fn test_uid_ordering_is_bytewise() {
        let a = Uid("01AAAAAAAAAAAAAAAAAAAAAAAA".to_string());
        let b = Uid("01BBBBBBBBBBBBBBBBBBBBBBBB".to_string());
        assert!(a < b);
    }
}
