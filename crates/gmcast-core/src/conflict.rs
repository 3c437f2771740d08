//! Pluggable conflict relation.
//!
//! The relation decides whether an incoming message must be ordered
//! against a set of recently-ordered messages. It must be pure and
//! deterministic: every peer of every partition evaluates the same
//! predicate, and agreement on commit order depends on them agreeing
//! here.

use crate::message::Message;

/// Domain-specific predicate over messages.
pub trait ConflictRelation: Send + Sync {
    /// Does `message` conflict with any member of `snapshot`?
    fn conflict(&self, message: &Message, snapshot: &[Message]) -> bool;
}

/// Default relation: two messages conflict when their destination sets
/// intersect. Overlapping destinations force a clock tick so the new
/// message receives a strictly higher local timestamp.
#[derive(Clone, Copy, Debug, Default)]
pub struct DestinationConflict;

impl ConflictRelation for DestinationConflict {
    fn conflict(&self, message: &Message, snapshot: &[Message]) -> bool {
        snapshot.iter().any(|previous| {
            previous
                .destination
                .iter()
                .any(|partition| message.destination.contains(partition))
        })
    }
}

/// Every pair of messages conflicts. Disables generic delivery entirely;
/// useful for tests that need a strict total order.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysConflict;

impl ConflictRelation for AlwaysConflict {
    fn conflict(&self, _message: &Message, snapshot: &[Message]) -> bool {
        !snapshot.is_empty()
    }
}

/// No pair of messages conflicts, so every message may be generic
/// delivered as soon as it is final.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverConflict;

impl ConflictRelation for NeverConflict {
    fn conflict(&self, _message: &Message, _snapshot: &[Message]) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Partition, Payload};

    fn message_to(destinations: &[&str]) -> Message {
        Message::new(
            Partition::new("origin"),
            destinations.iter().map(|p| Partition::new(*p)).collect(),
            Payload::default(),
        )
    }

    #[test]
    fn test_destination_overlap_conflicts() {
        let relation = DestinationConflict;
        let snapshot = vec![message_to(&["p", "q"])];
        assert!(relation.conflict(&message_to(&["q", "r"]), &snapshot));
        assert!(!relation.conflict(&message_to(&["r", "s"]), &snapshot));
    }

    #[test]
    fn test_never_conflict() {
        let relation = NeverConflict;
        let snapshot = vec![message_to(&["p"])];
        assert!(!relation.conflict(&message_to(&["p"]), &snapshot));
    }
}
