//! Commit path for finalized messages.

use gmcast_core::{Message, Operation, ProtocolError, Response};
use gmcast_store::StateMachine;
use std::sync::Arc;

/// Commits queue-released messages into the state machine and shapes
/// the client response.
pub struct Deliver {
    state_machine: Arc<dyn StateMachine>,
}

impl Deliver {
    /// Restores the state machine before first use.
    pub fn new(state_machine: Arc<dyn StateMachine>) -> Result<Self, ProtocolError> {
        state_machine
            .restore()
            .map_err(|err| ProtocolError::Commit(err.to_string()))?;
        Ok(Self { state_machine })
    }

    /// Commit the message. Commands echo the written payload; queries
    /// answer with the full committed history in append order.
    pub fn commit(&self, message: &Message, generic_delivered: bool) -> Response {
        tracing::debug!(id = %message.id, generic = generic_delivered, "committing message");

        if let Err(err) = self.state_machine.commit(message, generic_delivered) {
            tracing::error!(id = %message.id, error = %err, "commit failed");
            return Response::failed(message.id.clone(), ProtocolError::Commit(err.to_string()));
        }

        match message.payload.operation {
            Operation::Command => {
                Response::ok(message.id.clone(), vec![message.payload.clone()])
            }
            Operation::Query => match self.state_machine.history() {
                Ok(messages) => Response::ok(
                    message.id.clone(),
                    messages.into_iter().map(|m| m.payload).collect(),
                ),
                Err(err) => {
                    Response::failed(message.id.clone(), ProtocolError::Commit(err.to_string()))
                }
            },
        }
    }
}
