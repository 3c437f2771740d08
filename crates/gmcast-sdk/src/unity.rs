//! Partition façade: one logical endpoint over N peers.

use crate::config::Config;
use crate::request::Request;
use futures::future::join_all;
use gmcast_core::{Message, Operation, Partition, ProtocolError, Response};
use gmcast_engine::{MemoryNetwork, Peer, PeerConfig, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A partition exposed as a single client API. Requests are forwarded
/// to the internal peers round-robin; each peer runs the full protocol
/// engine, and all of them share the partition's storage.
pub struct Unity {
    config: Config,
    peers: Vec<Peer>,
    last: Mutex<usize>,
}

impl Unity {
    /// Bootstrap the partition's peers over the given in-memory
    /// network. Must be called from within a tokio runtime.
    pub fn with_network(
        config: Config,
        network: &Arc<MemoryNetwork>,
    ) -> Result<Self, ProtocolError> {
        let transports = (0..config.replication)
            .map(|_| {
                Arc::new(network.transport(config.partition.clone())) as Arc<dyn Transport>
            })
            .collect();
        Self::with_transports(config, transports)
    }

    /// Bootstrap the partition's peers over caller-provided transports,
    /// one per peer.
    pub fn with_transports(
        config: Config,
        transports: Vec<Arc<dyn Transport>>,
    ) -> Result<Self, ProtocolError> {
        let mut peers = Vec::with_capacity(transports.len());
        for (index, transport) in transports.into_iter().enumerate() {
            let peer_config = PeerConfig {
                name: format!("{}-{}", config.partition, index),
                partition: config.partition.clone(),
                version: config.version,
                conflict: config.conflict.clone(),
                storage: config.storage.clone(),
            };
            peers.push(Peer::new(peer_config, transport)?);
        }
        Ok(Self {
            config,
            peers,
            last: Mutex::new(0),
        })
    }

    /// The partition this unity fronts.
    pub fn partition(&self) -> &Partition {
        &self.config.partition
    }

    /// Multicast a write. The returned channel yields exactly one
    /// response once the message commits on the forwarding peer, or a
    /// failure response if the broadcast fails.
    pub fn write(&self, request: Request) -> mpsc::Receiver<Response> {
        let message = Message::new(
            self.config.partition.clone(),
            request.destination.clone(),
            request.into_payload(Operation::Command),
        );
        tracing::debug!(id = %message.id, partition = %self.config.partition, "issuing write");
        self.next_peer().command(message)
    }

    /// Read the committed history from one peer's log. Stale-tolerant:
    /// a read racing a write may miss it.
    pub fn read(&self, _request: Request) -> Response {
        self.next_peer().fast_read()
    }

    /// One read per peer, covering every member of the partition.
    pub fn read_all(&self) -> Vec<Response> {
        self.peers.iter().map(|peer| peer.fast_read()).collect()
    }

    /// Committed history of every peer, in commit order. Observation
    /// hook for convergence checks.
    pub fn histories(&self) -> Vec<Vec<Message>> {
        self.peers
            .iter()
            .map(|peer| peer.history().unwrap_or_default())
            .collect()
    }

    /// Stop every peer and wait for their tasks to drain.
    pub async fn shutdown(&self) {
        join_all(self.peers.iter().map(|peer| peer.stop())).await;
        tracing::debug!(partition = %self.config.partition, "unity shut down");
    }

    fn next_peer(&self) -> &Peer {
        let mut last = self.last.lock();
        let index = *last;
        *last = (index + 1) % self.peers.len();
        &self.peers[index]
    }
}
