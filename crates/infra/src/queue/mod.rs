//! Outbound message queue used for dead-letter delivery.

pub mod in_memory;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

pub use in_memory::InMemoryQueue;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("unknown destination `{0}`")]
    UnknownDestination(String),

    #[error("send failed: {0}")]
    Send(String),
}

pub trait MessageQueue: Send + Sync {
    fn send(&self, destination: &str, payload: &Value) -> Result<(), QueueError>;
}

impl<Q> MessageQueue for Arc<Q>
where
    Q: MessageQueue + ?Sized,
{
    fn send(&self, destination: &str, payload: &Value) -> Result<(), QueueError> {
        (**self).send(destination, payload)
    }
}
