//! Transport abstractions for inter-partition communication.
//!
//! The protocol consumes a reliable transport: FIFO per sender pair,
//! at-least-once, and the same delivery order at every member of a
//! partition. The in-memory implementation here provides exactly that
//! for tests and single-process clusters by serializing publishes per
//! partition.

use async_trait::async_trait;
use gmcast_core::{Message, Partition};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Capacity of each peer inbox. Overflow drops the message for that
/// subscriber; at-least-once then relies on sender retry.
const INBOX_CAPACITY: usize = 1024;

/// Transport error type.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Serialization failed: {0}")]
    Serialize(String),

    #[error("Unknown partition: {0}")]
    UnknownPartition(String),

    #[error("Transport is closed")]
    Closed,
}

/// Abstract transport capability consumed by a peer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Serialize the message and send it to every partition in its
    /// destination set.
    async fn broadcast(&self, message: Message) -> Result<(), TransportError>;

    /// Send the message to a single partition; every member of that
    /// partition receives it.
    async fn unicast(&self, message: Message, partition: Partition) -> Result<(), TransportError>;

    /// Take the inbound message stream. May only be called once.
    fn listen(&self) -> mpsc::Receiver<Message>;

    /// Close the transport for sending and receiving.
    fn close(&self);
}

type Subscribers = HashMap<Partition, HashMap<u64, mpsc::Sender<Message>>>;

/// Shared hub connecting in-memory transports.
///
/// Publishing to a partition happens under the hub lock, so every
/// member of that partition observes one total order of messages.
#[derive(Default)]
pub struct MemoryNetwork {
    subscribers: Mutex<Subscribers>,
    next_id: AtomicU64,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a transport subscribed to `partition`.
    pub fn transport(self: &Arc<Self>, partition: Partition) -> MemoryTransport {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .lock()
            .entry(partition.clone())
            .or_default()
            .insert(id, tx);

        MemoryTransport {
            network: self.clone(),
            partition,
            id,
            inbox: Mutex::new(Some(rx)),
            closed: AtomicBool::new(false),
        }
    }

    /// Deliver `message` to every subscriber of `partition`, exercising
    /// the wire format on the way.
    fn publish(&self, message: &Message, partition: &Partition) -> Result<(), TransportError> {
        let bytes =
            serde_json::to_vec(message).map_err(|err| TransportError::Serialize(err.to_string()))?;

        let subscribers = self.subscribers.lock();
        let targets = subscribers
            .get(partition)
            .ok_or_else(|| TransportError::UnknownPartition(partition.to_string()))?;

        for (id, tx) in targets {
            let decoded: Message = match serde_json::from_slice(&bytes) {
                Ok(decoded) => decoded,
                Err(err) => return Err(TransportError::Serialize(err.to_string())),
            };
            if tx.try_send(decoded).is_err() {
                tracing::warn!(
                    subscriber = *id,
                    partition = %partition,
                    "dropping message for saturated or closed subscriber"
                );
            }
        }
        Ok(())
    }

    fn unsubscribe(&self, partition: &Partition, id: u64) {
        let mut subscribers = self.subscribers.lock();
        if let Some(members) = subscribers.get_mut(partition) {
            members.remove(&id);
            if members.is_empty() {
                subscribers.remove(partition);
            }
        }
    }
}

/// In-memory transport bound to one peer.
pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
    partition: Partition,
    id: u64,
    inbox: Mutex<Option<mpsc::Receiver<Message>>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn broadcast(&self, message: Message) -> Result<(), TransportError> {
        self.ensure_open()?;
        for partition in message.destination.clone() {
            self.network.publish(&message, &partition)?;
        }
        Ok(())
    }

    async fn unicast(&self, message: Message, partition: Partition) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.network.publish(&message, &partition)
    }

    fn listen(&self) -> mpsc::Receiver<Message> {
        self.inbox
            .lock()
            .take()
            .expect("listen can only be called once")
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.network.unsubscribe(&self.partition, self.id);
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmcast_core::Payload;

    fn message_for(destinations: &[&str]) -> Message {
        Message::new(
            Partition::new(destinations[0]),
            destinations.iter().map(|p| Partition::new(*p)).collect(),
            Payload::default(),
        )
    }

    #[tokio::test]
    async fn test_unicast_reaches_every_member() {
        let network = MemoryNetwork::new();
        let a = network.transport(Partition::new("p"));
        let b = network.transport(Partition::new("p"));
        let mut inbox_a = a.listen();
        let mut inbox_b = b.listen();

        let message = message_for(&["p"]);
        a.unicast(message.clone(), Partition::new("p")).await.unwrap();

        assert_eq!(inbox_a.recv().await.unwrap().id, message.id);
        assert_eq!(inbox_b.recv().await.unwrap().id, message.id);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_destination() {
        let network = MemoryNetwork::new();
        let p = network.transport(Partition::new("p"));
        let q = network.transport(Partition::new("q"));
        let mut inbox_p = p.listen();
        let mut inbox_q = q.listen();

        let message = message_for(&["p", "q"]);
        p.broadcast(message.clone()).await.unwrap();

        assert_eq!(inbox_p.recv().await.unwrap().id, message.id);
        assert_eq!(inbox_q.recv().await.unwrap().id, message.id);
    }

    #[tokio::test]
    async fn test_unknown_partition_is_an_error() {
        let network = MemoryNetwork::new();
        let p = network.transport(Partition::new("p"));
        let result = p.unicast(message_for(&["p"]), Partition::new("ghost")).await;
        assert!(matches!(result, Err(TransportError::UnknownPartition(_))));
    }

    #[tokio::test]
    async fn test_closed_transport_refuses_sends() {
        let network = MemoryNetwork::new();
        let p = network.transport(Partition::new("p"));
        p.close();
        let result = p.unicast(message_for(&["p"]), Partition::new("p")).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_members_observe_same_order() {
        let network = MemoryNetwork::new();
        let a = network.transport(Partition::new("p"));
        let b = network.transport(Partition::new("p"));
        let mut inbox_a = a.listen();
        let mut inbox_b = b.listen();

        let mut sent = Vec::new();
        for _ in 0..32 {
            let message = message_for(&["p"]);
            sent.push(message.id.clone());
            a.unicast(message, Partition::new("p")).await.unwrap();
        }

        for id in &sent {
            assert_eq!(&inbox_a.recv().await.unwrap().id, id);
            assert_eq!(&inbox_b.recv().await.unwrap().id, id);
        }
    }
}
