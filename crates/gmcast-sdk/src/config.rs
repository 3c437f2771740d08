//! Partition configuration.

use gmcast_core::{ConflictRelation, DestinationConflict, Partition, PROTOCOL_VERSION};
use gmcast_store::{MemoryStorage, Storage};
use std::sync::Arc;

/// Configuration for one partition and its peers.
#[derive(Clone)]
pub struct Config {
    /// Partition name.
    pub partition: Partition,

    /// Number of co-located peers inside the partition.
    pub replication: usize,

    /// Protocol version stamped on and required of every message.
    pub version: u32,

    /// Conflict relation; must be the same at every partition of the
    /// deployment.
    pub conflict: Arc<dyn ConflictRelation>,

    /// Storage backend shared by the partition's peers. Must be
    /// thread-safe; the in-memory default is.
    pub storage: Arc<dyn Storage>,
}

impl Config {
    /// Default configuration for the named partition: three peers, the
    /// destination-intersection conflict relation, in-memory storage.
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: Partition::new(partition),
            replication: 3,
            version: PROTOCOL_VERSION,
            conflict: Arc::new(DestinationConflict),
            storage: Arc::new(MemoryStorage::new()),
        }
    }

    pub fn builder(partition: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            config: Config::new(partition),
        }
    }
}

/// Builder for partition configuration.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn replication(mut self, peers: usize) -> Self {
        self.config.replication = peers;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.config.version = version;
        self
    }

    pub fn conflict(mut self, conflict: Arc<dyn ConflictRelation>) -> Self {
        self.config.conflict = conflict;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
