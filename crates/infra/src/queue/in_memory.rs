use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use super::{MessageQueue, QueueError};

/// Records every message sent, per destination. Accepts any destination.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    sent: Mutex<HashMap<String, Vec<Value>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered to a destination, in send order.
    pub fn messages(&self, destination: &str) -> Vec<Value> {
        self.sent
            .lock()
            .map(|sent| sent.get(destination).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl MessageQueue for InMemoryQueue {
    fn send(&self, destination: &str, payload: &Value) -> Result<(), QueueError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| QueueError::Send("queue lock poisoned".to_string()))?;
        sent.entry(destination.to_string())
            .or_default()
            .push(payload.clone());
        Ok(())
    }
}
