//! Retry ceiling for replay entries.

use serde::{Deserialize, Serialize};

/// When (and where) a repeatedly failing entry leaves its bin.
///
/// Disabled by default: entries are retried on every scheduled run for as long
/// as they keep failing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeadLetterPolicy {
    /// Run count at which an entry counts as exhausted.
    pub max_run_count: Option<u32>,
    /// Destination receiving exhausted entries.
    pub queue: Option<String>,
}

impl DeadLetterPolicy {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn after(max_run_count: u32) -> Self {
        Self {
            max_run_count: Some(max_run_count),
            queue: None,
        }
    }

    pub fn to_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.max_run_count.is_some()
    }

    /// Whether an entry that has now been run `run_count` times is exhausted.
    pub fn is_exhausted(&self, run_count: u32) -> bool {
        self.max_run_count.is_some_and(|max| run_count >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_policy_never_exhausts() {
        let policy = DeadLetterPolicy::disabled();
        assert!(!policy.is_enabled());
        assert!(!policy.is_exhausted(u32::MAX));
    }

    #[test]
    fn exhausted_at_ceiling() {
        let policy = DeadLetterPolicy::after(3).to_queue("dlq");
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
        assert_eq!(policy.queue.as_deref(), Some("dlq"));
    }
}
