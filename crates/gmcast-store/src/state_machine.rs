//! State machine committing delivered messages.

use crate::error::Result;
use crate::log::Log;
use gmcast_core::{Message, Operation};

/// Replicated state machine capability. Implementations decide what a
/// committed command means; the default appends to the log and keeps
/// last-write-wins values in the storage backend.
pub trait StateMachine: Send + Sync {
    /// Commit the delivered message, making it visible to clients.
    fn commit(&self, message: &Message, generic_delivered: bool) -> Result<()>;

    /// Every committed message, in commit order.
    fn history(&self) -> Result<Vec<Message>>;

    /// Rehydrate from the log at startup. No-op for the in-memory
    /// default.
    fn restore(&self) -> Result<()>;
}

/// Default state machine over the shared log.
pub struct InMemoryStateMachine {
    log: Log,
}

impl InMemoryStateMachine {
    pub fn new(log: Log) -> Self {
        Self { log }
    }
}

impl StateMachine for InMemoryStateMachine {
    fn commit(&self, message: &Message, generic_delivered: bool) -> Result<()> {
        match message.payload.operation {
            Operation::Command => self.log.append(message, generic_delivered),
            // Queries are ordered but do not mutate state; history serves them.
            Operation::Query => Ok(()),
        }
    }

    fn history(&self) -> Result<Vec<Message>> {
        self.log.dump()
    }

    fn restore(&self) -> Result<()> {
        // The in-memory backend starts empty; nothing to rehydrate.
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStateMachine").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use gmcast_core::{Partition, Payload};
    use std::sync::Arc;

    fn command(key: &[u8], value: &[u8]) -> Message {
        Message::new(
            Partition::new("p"),
            vec![Partition::new("p")],
            Payload {
                operation: Operation::Command,
                key: key.to_vec(),
                value: value.to_vec(),
                extensions: Vec::new(),
            },
        )
    }

    #[test]
    fn test_commit_command_appends_history() {
        let log = Log::new(Arc::new(MemoryStorage::new()));
        let sm = InMemoryStateMachine::new(log);

        let first = command(b"k", b"a");
        let second = command(b"k", b"b");
        sm.commit(&first, false).unwrap();
        sm.commit(&second, true).unwrap();

        let history = sm.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, first.id);
        assert_eq!(history[1].id, second.id);
    }

    #[test]
    fn test_query_commits_without_mutation() {
        let log = Log::new(Arc::new(MemoryStorage::new()));
        let sm = InMemoryStateMachine::new(log);

        let mut query = command(b"k", b"");
        query.payload.operation = Operation::Query;
        sm.commit(&query, false).unwrap();

        assert!(sm.history().unwrap().is_empty());
    }

    #[test]
    fn test_restore_is_noop() {
        let log = Log::new(Arc::new(MemoryStorage::new()));
        let sm = InMemoryStateMachine::new(log);
        assert!(sm.restore().is_ok());
    }
}
