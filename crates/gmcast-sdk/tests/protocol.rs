//! End-to-end protocol scenarios over in-memory clusters.

use gmcast_core::ProtocolError;
use gmcast_engine::MemoryNetwork;
use gmcast_sdk::testkit::{alphabet, latest_value, Cluster};
use gmcast_sdk::{Config, Request, Unity};
use std::time::Duration;
use tokio::time::timeout;

const WRITE_DEADLINE: Duration = Duration::from_secs(5);
const SETTLE_DEADLINE: Duration = Duration::from_secs(10);

#[tokio::test(flavor = "multi_thread")]
async fn test_single_unity_single_process_write_then_read() {
    let network = MemoryNetwork::new();
    let unity = Unity::with_network(
        Config::builder("single-unity").replication(1).build(),
        &network,
    )
    .unwrap();
    let destination = vec![unity.partition().clone()];

    let mut pending = unity.write(Request::write(b"test-key", b"test", destination.clone()));
    let response = timeout(WRITE_DEADLINE, pending.recv())
        .await
        .expect("write timed out")
        .expect("observer channel closed");
    assert!(response.success, "write failed: {:?}", response.failure);
    let id = response.identifier.clone();

    let read = unity.read(Request::read(b"test-key", destination));
    assert!(read.success, "read failed: {:?}", read.failure);
    assert_eq!(read.identifier, id);
    assert_eq!(latest_value(&read, b"test-key"), Some(b"test".to_vec()));

    unity.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sequential_alphabet_single_partition() {
    let cluster = Cluster::new("alphabet", 1, 3);
    let key = b"alphabet";

    for letter in alphabet() {
        let mut pending = cluster.next().write(cluster.request(key, letter.as_bytes()));
        let response = timeout(WRITE_DEADLINE, pending.recv())
            .await
            .unwrap_or_else(|_| panic!("write {letter} timed out"))
            .expect("observer channel closed");
        assert!(response.success, "write {letter} failed: {:?}", response.failure);
    }

    let settled = cluster
        .settle(SETTLE_DEADLINE, |cluster| {
            cluster
                .values_everywhere(key)
                .iter()
                .all(|value| value.as_deref() == Some(b"Z".as_slice()))
        })
        .await;
    assert!(settled, "peers did not all reach Z: {:?}", cluster.values_everywhere(key));

    cluster.off().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_alphabet_converges() {
    let cluster = std::sync::Arc::new(Cluster::new("concurrent", 1, 3));
    let key = b"alphabet";

    let writes: Vec<_> = alphabet()
        .into_iter()
        .map(|letter| {
            let cluster = cluster.clone();
            tokio::spawn(async move {
                let mut pending = cluster.next().write(cluster.request(key, letter.as_bytes()));
                timeout(WRITE_DEADLINE, pending.recv())
                    .await
                    .unwrap_or_else(|_| panic!("write {letter} timed out"))
                    .expect("observer channel closed")
            })
        })
        .collect();

    for write in writes {
        let response = write.await.expect("writer task panicked");
        assert!(response.success, "write failed: {:?}", response.failure);
    }

    let settled = cluster
        .settle(SETTLE_DEADLINE, |cluster| cluster.agrees_on(key))
        .await;
    assert!(settled, "peers disagree: {:?}", cluster.values_everywhere(key));

    cluster.off().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sequential_alphabet_across_partitions() {
    let cluster = Cluster::new("multicast", 3, 2);
    let key = b"alphabet";

    for letter in alphabet() {
        let mut pending = cluster.next().write(cluster.request(key, letter.as_bytes()));
        let response = timeout(WRITE_DEADLINE, pending.recv())
            .await
            .unwrap_or_else(|_| panic!("write {letter} timed out"))
            .expect("observer channel closed");
        assert!(response.success, "write {letter} failed: {:?}", response.failure);
    }

    let settled = cluster
        .settle(SETTLE_DEADLINE, |cluster| {
            cluster
                .values_everywhere(key)
                .iter()
                .all(|value| value.as_deref() == Some(b"Z".as_slice()))
        })
        .await;
    assert!(settled, "partitions did not all reach Z: {:?}", cluster.values_everywhere(key));

    cluster.off().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_multicast_commits_with_identical_timestamps() {
    let cluster = Cluster::new("timestamps", 2, 2);
    let key = b"shared";

    let mut pending = cluster.next().write(cluster.request(key, b"v"));
    let response = timeout(WRITE_DEADLINE, pending.recv())
        .await
        .expect("write timed out")
        .expect("observer channel closed");
    assert!(response.success);
    let id = response.identifier.clone();

    let settled = cluster
        .settle(SETTLE_DEADLINE, |cluster| {
            (0..cluster.len()).all(|index| {
                cluster.unity(index)
                    .histories()
                    .iter()
                    .all(|history| history.iter().any(|message| message.id == id))
            })
        })
        .await;
    assert!(settled, "message did not reach every peer");

    let mut timestamps = Vec::new();
    for index in 0..cluster.len() {
        for history in cluster.unity(index).histories() {
            let committed = history
                .iter()
                .find(|message| message.id == id)
                .expect("committed message present");
            timestamps.push(committed.timestamp);
        }
    }
    assert!(
        timestamps.windows(2).all(|pair| pair[0] == pair[1]),
        "final timestamps differ across peers: {timestamps:?}"
    );

    cluster.off().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_write_after_shutdown_fails() {
    let network = MemoryNetwork::new();
    let unity = Unity::with_network(
        Config::builder("halting").replication(2).build(),
        &network,
    )
    .unwrap();
    let destination = vec![unity.partition().clone()];

    unity.shutdown().await;

    let mut pending = unity.write(Request::write(b"k", b"v", destination));
    let response = timeout(WRITE_DEADLINE, pending.recv())
        .await
        .expect("failure response timed out")
        .expect("observer channel closed");
    assert!(!response.success);
    assert_eq!(response.failure, Some(ProtocolError::Stopped));
}
