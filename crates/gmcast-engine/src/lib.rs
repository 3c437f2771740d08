//! Protocol engine for gmcast.
//!
//! A [`peer::Peer`] is one process inside a partition. It owns a
//! transport, drives every received message through the protocol state
//! machine, exchanges timestamps with the other destination partitions,
//! and delivers finalized messages in `(timestamp, id)` order through
//! the [`queue::ReceivedQueue`] into the [`deliver::Deliver`] commit
//! path.

pub mod deliver;
pub mod invoker;
pub mod peer;
pub mod queue;
pub mod timing;
pub mod transport;

pub use deliver::Deliver;
pub use invoker::Invoker;
pub use peer::{Peer, PeerConfig};
pub use queue::ReceivedQueue;
pub use transport::{MemoryNetwork, MemoryTransport, Transport, TransportError};
