//! Per-message table of timestamps received from destination partitions.
//!
//! During the gather round every destination partition contributes one
//! timestamp per message. Retransmits overwrite per `(id, partition)`,
//! so duplicates never inflate the received count past the number of
//! destinations.

use crate::message::{Partition, Uid};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct MemoEntry {
    timestamps: HashMap<Partition, u64>,
    touched: Instant,
}

/// Thread-safe memo of exchanged timestamps, with bounded-TTL eviction
/// for exchanges that never complete (a dead remote partition would
/// otherwise leak entries forever).
#[derive(Debug, Default)]
pub struct Memo {
    entries: Mutex<HashMap<Uid, MemoEntry>>,
}

impl Memo {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record the timestamp `partition` computed for `id`, overwriting
    /// any earlier value from the same partition.
    pub fn insert(&self, id: Uid, partition: Partition, timestamp: u64) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(id).or_insert_with(|| MemoEntry {
            timestamps: HashMap::new(),
            touched: Instant::now(),
        });
        entry.timestamps.insert(partition, timestamp);
        entry.touched = Instant::now();
    }

    /// All timestamps received so far for `id`.
    pub fn read(&self, id: &Uid) -> Vec<u64> {
        self.entries
            .lock()
            .get(id)
            .map(|entry| entry.timestamps.values().copied().collect())
            .unwrap_or_default()
    }

    /// Forget `id` entirely; called once the message commits.
    pub fn remove(&self, id: &Uid) {
        self.entries.lock().remove(id);
    }

    /// Evict entries not touched within `ttl`, returning the evicted
    /// ids so the caller can fail the stalled exchanges.
    pub fn evict_older_than(&self, ttl: Duration) -> Vec<Uid> {
        let mut entries = self.entries.lock();
        let expired: Vec<Uid> = entries
            .iter()
            .filter(|(_, entry)| entry.touched.elapsed() > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            entries.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
