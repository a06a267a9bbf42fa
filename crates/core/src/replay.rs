//! Persisted shape of a queued failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{BinName, ReplayId};

/// Where the failed record's payload lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordRef {
    /// Record serialized as JSON, gzip-compressed, then base64-encoded.
    Inline { data: String },
    /// Record stored verbatim in an object store.
    External { bucket: String, key: String },
}

impl RecordRef {
    pub fn is_external(&self) -> bool {
        matches!(self, RecordRef::External { .. })
    }
}

/// One durably queued failure, keyed by `(bin, replay_id)`.
///
/// Created by the outcome collector when a record (or a single function of a
/// fanned-out change-feed record) fails. Only the replay engine bumps
/// `run_count` or deletes the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayEntry {
    pub bin: BinName,
    pub replay_id: ReplayId,
    /// Starts at 1; incremented on every failed replay.
    pub run_count: u32,
    pub record: RecordRef,
    pub reason: String,
    /// Set when only one entry point of a change-feed record failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReplayEntry {
    pub fn new(
        bin: BinName,
        replay_id: ReplayId,
        record: RecordRef,
        reason: impl Into<String>,
        function_name: Option<String>,
    ) -> Self {
        Self {
            bin,
            replay_id,
            run_count: 1,
            record,
            reason: reason.into(),
            function_name,
            created_at: Utc::now(),
        }
    }

    /// Key of the entry inside the replay store.
    pub fn key(&self) -> (&BinName, &ReplayId) {
        (&self.bin, &self.replay_id)
    }

    /// Whether replaying this entry targets a single entry point.
    pub fn is_granular(&self) -> bool {
        self.function_name.is_some()
    }
}
