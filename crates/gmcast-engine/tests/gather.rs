//! Cross-partition delivery over the in-memory network.
//!
//! Two partitions exchange timestamps for a multi-destination message
//! and must both commit it with the same final timestamp.

use gmcast_core::{
    DestinationConflict, Message, MessageState, Operation, Partition, Payload, PROTOCOL_VERSION,
};
use gmcast_engine::{MemoryNetwork, Peer, PeerConfig};
use gmcast_store::MemoryStorage;
use std::sync::Arc;
use std::time::Duration;

fn peer_on(network: &Arc<MemoryNetwork>, partition: &str) -> Peer {
    let partition = Partition::new(partition);
    let config = PeerConfig {
        name: format!("{partition}-0"),
        partition: partition.clone(),
        version: PROTOCOL_VERSION,
        conflict: Arc::new(DestinationConflict),
        storage: Arc::new(MemoryStorage::new()),
    };
    Peer::new(config, Arc::new(network.transport(partition))).unwrap()
}

fn command(destinations: &[&str], value: &[u8]) -> Message {
    Message::new(
        Partition::new(destinations[0]),
        destinations.iter().map(|p| Partition::new(*p)).collect(),
        Payload {
            operation: Operation::Command,
            key: b"shared".to_vec(),
            value: value.to_vec(),
            extensions: Vec::new(),
        },
    )
}

async fn settle<F>(mut done: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "cluster did not settle in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_two_partitions_agree_on_final_timestamp() {
    let network = MemoryNetwork::new();
    let p = peer_on(&network, "p");
    let q = peer_on(&network, "q");

    let message = command(&["p", "q"], b"v");
    let id = message.id.clone();

    let mut receiver = p.command(message);
    let response = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("write timed out")
        .expect("observer channel closed");
    assert!(response.success, "write failed: {:?}", response.failure);
    assert_eq!(response.identifier, id);

    settle(|| !p.history().unwrap().is_empty() && !q.history().unwrap().is_empty()).await;

    let at_p = p.history().unwrap();
    let at_q = q.history().unwrap();
    assert_eq!(at_p.len(), 1);
    assert_eq!(at_q.len(), 1);
    assert_eq!(at_p[0].id, id);
    assert_eq!(at_q[0].id, id);
    assert_eq!(at_p[0].state, MessageState::S3);
    assert_eq!(at_q[0].state, MessageState::S3);
    assert_eq!(
        at_p[0].timestamp, at_q[0].timestamp,
        "destinations committed different final timestamps"
    );

    p.stop().await;
    q.stop().await;
}

#[tokio::test]
async fn test_conflicting_writes_commit_in_same_order_everywhere() {
    let network = MemoryNetwork::new();
    let p = peer_on(&network, "p");
    let q = peer_on(&network, "q");

    // Concurrent conflicting writes from both sides.
    let mut rx_a = p.command(command(&["p", "q"], b"a"));
    let mut rx_b = q.command(command(&["p", "q"], b"b"));

    for receiver in [&mut rx_a, &mut rx_b] {
        let response = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("write timed out")
            .expect("observer channel closed");
        assert!(response.success, "write failed: {:?}", response.failure);
    }

    settle(|| p.history().unwrap().len() == 2 && q.history().unwrap().len() == 2).await;

    let order_p: Vec<_> = p.history().unwrap().into_iter().map(|m| m.id).collect();
    let order_q: Vec<_> = q.history().unwrap().into_iter().map(|m| m.id).collect();
    assert_eq!(order_p, order_q, "partitions committed in different orders");

    p.stop().await;
    q.stop().await;
}

#[tokio::test]
async fn test_single_destination_commits_without_exchange() {
    let network = MemoryNetwork::new();
    let p = peer_on(&network, "p");

    let message = command(&["p"], b"solo");
    let id = message.id.clone();
    let mut receiver = p.command(message);

    let response = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("write timed out")
        .expect("observer channel closed");
    assert!(response.success);
    assert_eq!(response.identifier, id);

    let history = p.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].state, MessageState::S3);

    p.stop().await;
}
