//! Client request shape.

use gmcast_core::{Operation, Partition, Payload};

/// A client request forwarded to the protocol by a [`crate::Unity`].
#[derive(Clone, Debug)]
pub struct Request {
    /// Key the value is associated with.
    pub key: Vec<u8>,

    /// Value to replicate; empty for reads.
    pub value: Vec<u8>,

    /// Destination partitions. For the write response to resolve, the
    /// set must include the partition the request is issued on.
    pub destination: Vec<Partition>,

    /// Opaque middleware bytes carried end to end.
    pub extensions: Vec<u8>,
}

impl Request {
    /// A write request.
    pub fn write(key: &[u8], value: &[u8], destination: Vec<Partition>) -> Self {
        Self {
            key: key.to_vec(),
            value: value.to_vec(),
            destination,
            extensions: Vec::new(),
        }
    }

    /// A read request.
    pub fn read(key: &[u8], destination: Vec<Partition>) -> Self {
        Self {
            key: key.to_vec(),
            value: Vec::new(),
            destination,
            extensions: Vec::new(),
        }
    }

    pub(crate) fn into_payload(self, operation: Operation) -> Payload {
        Payload {
            operation,
            key: self.key,
            value: self.value,
            extensions: self.extensions,
        }
    }
}
