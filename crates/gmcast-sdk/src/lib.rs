//! gmcast SDK - client-facing API for the generic multicast protocol.
//!
//! A [`Unity`] is one partition seen as a single logical endpoint: a
//! round-robin façade over its internal peers. Clients write through
//! [`Unity::write`], read through [`Unity::read`], and the protocol
//! guarantees that every correct peer of every addressed partition
//! commits conflicting messages in the same order.
//!
//! # Quick start
//!
//! ```rust
//! use gmcast_engine::MemoryNetwork;
//! use gmcast_sdk::{Config, Request, Unity};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() {
//!     let network = MemoryNetwork::new();
//!     let config = Config::builder("inventory").replication(3).build();
//!     let unity = Unity::with_network(config, &network).unwrap();
//!
//!     let request = Request::write(b"stock", b"42", vec![unity.partition().clone()]);
//!     let mut pending = unity.write(request);
//!     let response = pending.recv().await.unwrap();
//!     assert!(response.success);
//!
//!     unity.shutdown().await;
//! }
//! ```

pub mod config;
pub mod request;
pub mod testkit;
pub mod unity;

pub use config::{Config, ConfigBuilder};
pub use request::Request;
pub use unity::Unity;

// Re-exports for convenience
pub use gmcast_core::{
    ConflictRelation, DestinationConflict, Message, Operation, Partition, Payload, ProtocolError,
    Response, Uid, PROTOCOL_VERSION,
};
pub use gmcast_engine::{MemoryNetwork, Transport};
