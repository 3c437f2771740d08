//! GMCast Stress Runner
//!
//! Command-line interface for exercising the gmcast crate family with
//! realistic workloads: sequential and concurrent single-partition
//! writes, and multi-partition multicast.

use stress::{stress_concurrent_writes, stress_multicast, stress_sequential_writes};
pub mod stress;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let rt = tokio::runtime::Runtime::new().expect("build tokio runtime");

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("sequential") => rt.block_on(run_sequential()),
        Some("concurrent") => rt.block_on(run_concurrent()),
        Some("multicast") => rt.block_on(run_multicast()),
        Some("full") => rt.block_on(run_full_suite()),
        Some("help" | "--help" | "-h") => print_usage(),
        Some(other) => {
            println!("Unknown workload: {other}");
            print_usage();
        }
        // Default: a quick pass over every workload with small sizes
        None => rt.block_on(run_quick()),
    }
}

fn print_usage() {
    println!("Usage: cargo run [workload]");
    println!();
    println!("Available workloads:");
    println!("  sequential - Awaited writes through one 3-peer partition");
    println!("  concurrent - Concurrent writers against one 3-peer partition");
    println!("  multicast  - Writes addressed to every partition of a 3-partition cluster");
    println!("  full       - All workloads at full size");
    println!("  help       - Show this help message");
}

async fn run_quick() {
    println!("── Quick pass ──────────────────────────────────────────────");
    stress_sequential_writes(3, 50).await.print();
    stress_concurrent_writes(3, 50).await.print();
    stress_multicast(3, 2, 25).await.print();
}

async fn run_sequential() {
    stress_sequential_writes(3, 500).await.print();
}

async fn run_concurrent() {
    stress_concurrent_writes(3, 500).await.print();
}

async fn run_multicast() {
    stress_multicast(3, 2, 200).await.print();
}

async fn run_full_suite() {
    stress_sequential_writes(3, 500).await.print();
    stress_concurrent_writes(3, 500).await.print();
    stress_multicast(3, 2, 200).await.print();
}
