//! Source kinds of inbound records.

use serde::{Deserialize, Serialize};

/// Where an inbound record came from.
///
/// Exactly one dispatch path exists per kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Row-level mutation notification from a table stream.
    ChangeFeed,
    /// Message delivered from a queue.
    Queue,
    /// Direct invocation carrying a free-form `type`.
    Adhoc,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::ChangeFeed, SourceKind::Queue, SourceKind::Adhoc];

    /// Handler category used when resolving modules for this kind.
    pub fn category(self) -> &'static str {
        match self {
            SourceKind::ChangeFeed => "dynamodb",
            SourceKind::Queue => "sqs",
            SourceKind::Adhoc => "adhoc",
        }
    }

    /// Whether records of this kind may be consumed by a batch entry point.
    pub fn supports_batch(self) -> bool {
        !matches!(self, SourceKind::Adhoc)
    }
}

impl core::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.category())
    }
}
