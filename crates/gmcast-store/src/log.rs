//! Append-only log of committed messages.
//!
//! Each entry holds the full serialized message so the log can be
//! compacted or shipped later without consulting other state. Reads
//! deserialize back into messages in append order.

use crate::error::Result;
use crate::storage::{Storage, StorageEntry};
use gmcast_core::Message;
use std::sync::Arc;

/// Entry on the log abstraction.
#[derive(Clone, Debug)]
pub struct LogEntry {
    /// A serialized [`Message`].
    pub data: Vec<u8>,

    /// Which kind of operation generated this entry.
    pub operation: gmcast_core::Operation,

    /// Whether the entry was produced by generic delivery.
    pub generic_delivered: bool,
}

/// The log view over a shared storage backend. All writes come from the
/// state machine when a commit is applied; reads serve queries.
#[derive(Clone)]
pub struct Log {
    storage: Arc<dyn Storage>,
}

impl Log {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Append the committed message.
    pub fn append(&self, message: &Message, generic_delivered: bool) -> Result<()> {
        let entry = LogEntry {
            data: serde_json::to_vec(message)?,
            operation: message.payload.operation,
            generic_delivered,
        };
        self.storage.set(StorageEntry {
            key: message.id.clone(),
            operation: entry.operation,
            value: entry.data,
        })
    }

    /// Every committed message, deserialized, in append order.
    pub fn dump(&self) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        for entry in self.storage.get()? {
            messages.push(serde_json::from_slice(&entry.value)?);
        }
        Ok(messages)
    }

    /// Number of committed entries.
    pub fn size(&self) -> usize {
        self.storage.get().map(|entries| entries.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use gmcast_core::{Message, Partition, Payload};

    #[test]
    fn test_append_and_dump_in_order() {
        let log = Log::new(Arc::new(MemoryStorage::new()));
        let mut ids = Vec::new();

        for timestamp in 0..10u64 {
            let mut message = Message::new(
                Partition::new("p"),
                vec![Partition::new("p")],
                Payload::default(),
            );
            message.timestamp = timestamp;
            ids.push(message.id.clone());
            log.append(&message, false).unwrap();
        }

        assert_eq!(log.size(), 10);

        let messages = log.dump().unwrap();
        assert_eq!(messages.len(), 10);
        for (index, message) in messages.iter().enumerate() {
            assert_eq!(message.id, ids[index]);
            assert_eq!(message.timestamp, index as u64);
        }
    }
}
