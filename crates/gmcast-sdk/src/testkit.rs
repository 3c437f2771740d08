//! Cluster helpers for tests and the stress runner.
//!
//! Builds groups of unities over one shared in-memory network and
//! provides the convergence assertions the integration suites share.

use crate::config::Config;
use crate::request::Request;
use crate::unity::Unity;
use gmcast_core::{Partition, Response, Uid};
use gmcast_engine::MemoryNetwork;
use parking_lot::Mutex;
use std::time::Duration;

/// A set of partitions connected through one in-memory network.
pub struct Cluster {
    names: Vec<Partition>,
    unities: Vec<Unity>,
    next: Mutex<usize>,
}

impl Cluster {
    /// Build `partitions` unities named `{prefix}-{uid}`, each with
    /// `replication` peers, all on one network.
    pub fn new(prefix: &str, partitions: usize, replication: usize) -> Self {
        let network = MemoryNetwork::new();
        let mut names = Vec::with_capacity(partitions);
        let mut unities = Vec::with_capacity(partitions);
        for _ in 0..partitions {
            let name = format!("{prefix}-{}", Uid::new());
            names.push(Partition::new(name.clone()));
            let config = Config::builder(name).replication(replication).build();
            unities.push(Unity::with_network(config, &network).expect("bootstrap unity"));
        }
        Self {
            names,
            unities,
            next: Mutex::new(0),
        }
    }

    /// Every partition name, usable as a full destination set.
    pub fn names(&self) -> &[Partition] {
        &self.names
    }

    pub fn unity(&self, index: usize) -> &Unity {
        &self.unities[index]
    }

    pub fn len(&self) -> usize {
        self.unities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unities.is_empty()
    }

    /// Round-robin over the unities, like a client that spreads load.
    pub fn next(&self) -> &Unity {
        let mut next = self.next.lock();
        let index = *next;
        *next = (index + 1) % self.unities.len();
        &self.unities[index]
    }

    /// A write addressed to every partition of the cluster.
    pub fn request(&self, key: &[u8], value: &[u8]) -> Request {
        Request::write(key, value, self.names.clone())
    }

    /// The latest committed value for `key` at every peer of every
    /// partition, or `None` where a peer has not committed it yet.
    pub fn values_everywhere(&self, key: &[u8]) -> Vec<Option<Vec<u8>>> {
        self.unities
            .iter()
            .flat_map(|unity| unity.read_all())
            .map(|response| latest_value(&response, key))
            .collect()
    }

    /// True once every peer of every partition reports the same
    /// committed value for `key`.
    pub fn agrees_on(&self, key: &[u8]) -> bool {
        let values = self.values_everywhere(key);
        match values.first() {
            Some(first) => first.is_some() && values.iter().all(|value| value == first),
            None => false,
        }
    }

    /// Poll until `done` holds or `deadline` elapses.
    pub async fn settle<F>(&self, deadline: Duration, mut done: F) -> bool
    where
        F: FnMut(&Cluster) -> bool,
    {
        let stop_at = tokio::time::Instant::now() + deadline;
        loop {
            if done(self) {
                return true;
            }
            if tokio::time::Instant::now() >= stop_at {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Shut every unity down and wait for the drain.
    pub async fn off(&self) {
        for unity in &self.unities {
            unity.shutdown().await;
        }
    }
}

/// The last committed value for `key` in a read response.
pub fn latest_value(response: &Response, key: &[u8]) -> Option<Vec<u8>> {
    if !response.success {
        return None;
    }
    response
        .data
        .iter()
        .rev()
        .find(|payload| payload.key == key)
        .map(|payload| payload.value.clone())
}

/// The uppercase alphabet, the classic convergence workload.
pub fn alphabet() -> Vec<String> {
    (b'A'..=b'Z').map(|c| (c as char).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cluster_bootstrap_and_off() {
        let cluster = Cluster::new("boot", 2, 2);
        assert_eq!(cluster.len(), 2);
        assert_eq!(cluster.names().len(), 2);
        cluster.off().await;
    }

    #[test]
    fn test_alphabet_shape() {
        let letters = alphabet();
        assert_eq!(letters.len(), 26);
        assert_eq!(letters[0], "A");
        assert_eq!(letters[25], "Z");
    }
}
