//! Set of recently-ordered messages driving conflict-based clock ticks.
//!
//! Members are messages whose final timestamp is not yet fixed for this
//! partition's ordering decision. The set is cleared whenever the local
//! clock ticks or leaps, because everything ordered before the jump is
//! already dominated by the new clock value.

use crate::conflict::ConflictRelation;
use crate::message::{Message, Uid};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Thread-safe previous set keyed by message id.
#[derive(Debug, Default)]
pub struct PreviousSet {
    entries: Mutex<HashMap<Uid, Message>>,
}

impl PreviousSet {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Add a message; re-appending the same id replaces the stored copy.
    pub fn append(&self, message: Message) {
        self.entries.lock().insert(message.id.clone(), message);
    }

    /// Drop every member.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Immutable copy of the current members.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.lock().values().cloned().collect()
    }

    /// Does `message` conflict with any member, according to `relation`?
    pub fn conflicts(&self, relation: &dyn ConflictRelation, message: &Message) -> bool {
        relation.conflict(message, &self.snapshot())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
