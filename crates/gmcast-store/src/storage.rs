//! Pluggable storage backend for state machine values.

use crate::error::Result;
use gmcast_core::{Operation, Uid};
use parking_lot::Mutex;

/// Entry applied to the storage backend: the protocol-generated key and
/// the serialized content it carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEntry {
    /// The identifier generated by the protocol.
    pub key: Uid,

    /// Which kind of operation generated this entry.
    pub operation: Operation,

    /// The serialized content replicated by the protocol.
    pub value: Vec<u8>,
}

/// Storage capability consumed by the state machine.
///
/// Implementations must be thread-safe: peers of one partition may share
/// a backend. Insertion order must be preserved so queries can replay
/// history faithfully.
pub trait Storage: Send + Sync {
    /// Store the entry. Writing an existing key replaces the stored
    /// value in place (last write wins per key).
    fn set(&self, entry: StorageEntry) -> Result<()>;

    /// Every stored entry, in insertion order.
    fn get(&self) -> Result<Vec<StorageEntry>>;
}

/// The default in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<Vec<StorageEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl Storage for MemoryStorage {
    fn set(&self, entry: StorageEntry) -> Result<()> {
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|stored| stored.key == entry.key) {
            Some(stored) => *stored = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    fn get(&self) -> Result<Vec<StorageEntry>> {
        Ok(self.entries.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let storage = MemoryStorage::new();
        let keys: Vec<Uid> = (0..5).map(|_| Uid::new()).collect();
        for key in &keys {
            storage
                .set(StorageEntry {
                    key: key.clone(),
                    operation: Operation::Command,
                    value: Vec::new(),
                })
                .unwrap();
        }

        let stored = storage.get().unwrap();
        let stored_keys: Vec<Uid> = stored.into_iter().map(|entry| entry.key).collect();
        assert_eq!(stored_keys, keys);
    }

    #[test]
    fn test_set_replaces_existing_key() {
        let storage = MemoryStorage::new();
        let key = Uid::new();
        storage
            .set(StorageEntry {
                key: key.clone(),
                operation: Operation::Command,
                value: b"first".to_vec(),
            })
            .unwrap();
        storage
            .set(StorageEntry {
                key: key.clone(),
                operation: Operation::Command,
                value: b"second".to_vec(),
            })
            .unwrap();

        let stored = storage.get().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, b"second");
    }
}
