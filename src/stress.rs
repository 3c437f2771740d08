//! Stress workloads over in-memory gmcast clusters.

use gmcast_sdk::testkit::Cluster;
use rand::Rng;
use std::time::{Duration, Instant};

const WRITE_DEADLINE: Duration = Duration::from_secs(10);
const SETTLE_DEADLINE: Duration = Duration::from_secs(30);

/// Outcome of one stress workload.
pub struct StressStats {
    pub workload: String,
    pub partitions: usize,
    pub replication: usize,
    pub writes: usize,
    pub failed: usize,
    pub total_time: Duration,
    pub writes_per_second: f64,
    pub converged: bool,
}

impl StressStats {
    pub fn print(&self) {
        println!();
        println!("── {} ──", self.workload);
        println!(
            "  partitions: {}  replication: {}  writes: {}",
            self.partitions, self.replication, self.writes
        );
        println!(
            "  elapsed: {:?}  throughput: {:.0} writes/s  failed: {}",
            self.total_time, self.writes_per_second, self.failed
        );
        println!(
            "  converged: {}",
            if self.converged { "yes" } else { "NO" }
        );
    }
}

fn random_value() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..16).map(|_| rng.gen_range(b'a'..=b'z')).collect()
}

/// Awaited writes through a single partition.
pub async fn stress_sequential_writes(replication: usize, writes: usize) -> StressStats {
    let cluster = Cluster::new("seq", 1, replication);
    let key = b"stress";
    let start = Instant::now();
    let mut failed = 0;

    for _ in 0..writes {
        let mut pending = cluster.next().write(cluster.request(key, &random_value()));
        match tokio::time::timeout(WRITE_DEADLINE, pending.recv()).await {
            Ok(Some(response)) if response.success => {}
            _ => failed += 1,
        }
    }

    let converged = cluster
        .settle(SETTLE_DEADLINE, |cluster| cluster.agrees_on(key))
        .await;
    let total_time = start.elapsed();
    cluster.off().await;

    StressStats {
        workload: "Sequential writes".to_string(),
        partitions: 1,
        replication,
        writes,
        failed,
        total_time,
        writes_per_second: writes as f64 / total_time.as_secs_f64(),
        converged,
    }
}

/// Concurrent writers against a single partition.
pub async fn stress_concurrent_writes(replication: usize, writes: usize) -> StressStats {
    let cluster = std::sync::Arc::new(Cluster::new("conc", 1, replication));
    let key = b"stress";
    let start = Instant::now();

    let handles: Vec<_> = (0..writes)
        .map(|_| {
            let cluster = cluster.clone();
            tokio::spawn(async move {
                let mut pending = cluster.next().write(cluster.request(key, &random_value()));
                matches!(
                    tokio::time::timeout(WRITE_DEADLINE, pending.recv()).await,
                    Ok(Some(response)) if response.success
                )
            })
        })
        .collect();

    let mut failed = 0;
    for handle in handles {
        if !handle.await.unwrap_or(false) {
            failed += 1;
        }
    }

    let converged = cluster
        .settle(SETTLE_DEADLINE, |cluster| cluster.agrees_on(key))
        .await;
    let total_time = start.elapsed();
    cluster.off().await;

    StressStats {
        workload: "Concurrent writes".to_string(),
        partitions: 1,
        replication,
        writes,
        failed,
        total_time,
        writes_per_second: writes as f64 / total_time.as_secs_f64(),
        converged,
    }
}

/// Writes addressed to every partition of a multi-partition cluster.
pub async fn stress_multicast(partitions: usize, replication: usize, writes: usize) -> StressStats {
    let cluster = Cluster::new("multi", partitions, replication);
    let key = b"stress";
    let start = Instant::now();
    let mut failed = 0;

    for _ in 0..writes {
        let mut pending = cluster.next().write(cluster.request(key, &random_value()));
        match tokio::time::timeout(WRITE_DEADLINE, pending.recv()).await {
            Ok(Some(response)) if response.success => {}
            _ => failed += 1,
        }
    }

    let converged = cluster
        .settle(SETTLE_DEADLINE, |cluster| cluster.agrees_on(key))
        .await;
    let total_time = start.elapsed();
    cluster.off().await;

    StressStats {
        workload: "Multi-partition multicast".to_string(),
        partitions,
        replication,
        writes,
        failed,
        total_time,
        writes_per_second: writes as f64 / total_time.as_secs_f64(),
        converged,
    }
}
