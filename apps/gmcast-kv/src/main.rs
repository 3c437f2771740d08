//! # gmcast-kv
//!
//! A standalone CLI key/value store built on the gmcast SDK. Every
//! write is multicast to its destination partitions and committed in
//! the same order at every peer, so reads from any member of a
//! partition agree once the cluster settles.

use std::io::{self, Write as _};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::*;
use gmcast_sdk::testkit::{latest_value, Cluster};
use gmcast_sdk::Request;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "gmcast-kv")]
#[command(about = "Replicated key/value store demo (gmcast SDK)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic demo: one partition, three peers, ordered writes
    Demo,
    /// Multicast demo: three partitions agree on conflicting writes
    Multicast,
    /// Interactive REPL for manual experimentation
    Interactive,
}

const WRITE_DEADLINE: Duration = Duration::from_secs(5);
const SETTLE_DEADLINE: Duration = Duration::from_secs(10);

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Demo => demo().await,
        Commands::Multicast => multicast().await,
        Commands::Interactive => interactive().await,
    }
}

async fn write_and_wait(cluster: &Cluster, key: &[u8], value: &[u8]) -> bool {
    let mut pending = cluster.next().write(cluster.request(key, value));
    match tokio::time::timeout(WRITE_DEADLINE, pending.recv()).await {
        Ok(Some(response)) if response.success => {
            println!(
                "  {} {} = {} ({})",
                "committed".green(),
                String::from_utf8_lossy(key),
                String::from_utf8_lossy(value),
                response.identifier
            );
            true
        }
        Ok(Some(response)) => {
            println!("  {} {:?}", "failed".red(), response.failure);
            false
        }
        _ => {
            println!("  {} write timed out", "failed".red());
            false
        }
    }
}

// ─── Demo: one partition, three peers ──────────────────────────────────────

async fn demo() {
    println!("{}", "gmcast demo: one partition, three peers".bold());
    let cluster = Cluster::new("demo", 1, 3);

    for value in [b"one".as_slice(), b"two", b"three"] {
        write_and_wait(&cluster, b"counter", value).await;
    }

    let settled = cluster
        .settle(SETTLE_DEADLINE, |cluster| cluster.agrees_on(b"counter"))
        .await;
    report_agreement(&cluster, b"counter", settled);

    cluster.off().await;
}

// ─── Multicast: three partitions, conflicting writes ───────────────────────

async fn multicast() {
    println!("{}", "gmcast demo: three partitions, conflicting writes".bold());
    let cluster = Cluster::new("mc", 3, 2);

    for value in [b"red".as_slice(), b"green", b"blue"] {
        write_and_wait(&cluster, b"color", value).await;
    }

    let settled = cluster
        .settle(SETTLE_DEADLINE, |cluster| cluster.agrees_on(b"color"))
        .await;
    report_agreement(&cluster, b"color", settled);

    cluster.off().await;
}

fn report_agreement(cluster: &Cluster, key: &[u8], settled: bool) {
    if settled {
        let values = cluster.values_everywhere(key);
        let agreed = values[0].clone().unwrap_or_default();
        println!(
            "{} every peer reads {} = {}",
            "converged:".green().bold(),
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(&agreed)
        );
    } else {
        println!("{} peers disagree", "not converged:".red().bold());
    }
}

// ─── Interactive REPL ──────────────────────────────────────────────────────

async fn interactive() {
    println!("{}", "gmcast interactive (one partition, three peers)".bold());
    println!("commands: write <key> <value> | read <key> | quit");
    let cluster = Cluster::new("repl", 1, 3);

    loop {
        print!("{} ", ">".cyan());
        io::stdout().flush().unwrap();

        let mut line = String::new();
        if io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.as_slice() {
            ["write", key, value] => {
                write_and_wait(&cluster, key.as_bytes(), value.as_bytes()).await;
            }
            ["read", key] => {
                let response = cluster.next().read(Request::read(
                    key.as_bytes(),
                    cluster.names().to_vec(),
                ));
                match latest_value(&response, key.as_bytes()) {
                    Some(value) => {
                        println!("  {} = {}", key, String::from_utf8_lossy(&value))
                    }
                    None => println!("  {} not found", key),
                }
            }
            ["quit" | "exit"] => break,
            [] => {}
            _ => println!("  unrecognized command"),
        }
    }

    cluster.off().await;
    println!("bye");
}
