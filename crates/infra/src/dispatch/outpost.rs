//! Per-invocation outcome collector.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use outpost_core::{BinName, ReplayEntry, ReplayId};
use serde_json::Value;
use tracing::warn;

use crate::payload::{PayloadArchive, PayloadError};

/// Why a record (or one entry point of it) failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub reason: String,
    pub function_name: Option<String>,
}

/// Outputs and failures of one top-level invocation.
///
/// Owned by a single invocation and dropped with it.
#[derive(Debug)]
pub struct Outpost {
    many: bool,
    processed: Vec<Value>,
    failures: Vec<Failure>,
    replays: Vec<ReplayEntry>,
    skipped: usize,
    /// `None` while replaying: failures are noted but nothing is stashed.
    archive: Option<Arc<PayloadArchive>>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Outpost {
    pub fn new(many: bool, archive: Arc<PayloadArchive>) -> Self {
        Self::with_archive(many, Some(archive))
    }

    /// Collector for a replay attempt. The entry being replayed already holds
    /// the payload, so failures produce no new entries.
    pub fn replaying(many: bool) -> Self {
        Self::with_archive(many, None)
    }

    fn with_archive(many: bool, archive: Option<Arc<PayloadArchive>>) -> Self {
        Self {
            many,
            processed: Vec::new(),
            failures: Vec::new(),
            replays: Vec::new(),
            skipped: 0,
            archive,
            last_stamp: None,
        }
    }

    pub fn add_processed(&mut self, output: Value) {
        self.processed.push(output);
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    /// Note a failed record (or one failed entry point of it) and queue it
    /// for replay. Returns the new entry, or `None` while replaying.
    ///
    /// Falls back to an inline payload when the external store rejects it.
    pub fn record_failure(
        &mut self,
        bin: &BinName,
        record: &Value,
        reason: impl Into<String>,
        function_name: Option<String>,
    ) -> Result<Option<&ReplayEntry>, PayloadError> {
        let reason = reason.into();
        self.failures.push(Failure {
            reason: reason.clone(),
            function_name: function_name.clone(),
        });
        let Some(archive) = self.archive.clone() else {
            return Ok(None);
        };

        let replay_id = ReplayId::at(self.next_stamp());
        let reference = match archive.stash(bin, &replay_id, record) {
            Ok(reference) => reference,
            Err(err) if archive.bucket().is_some() => {
                warn!(bin = %bin, replay_id = %replay_id, error = %err, "external payload store failed; inlining");
                PayloadArchive::stash_inline(record)?
            }
            Err(err) => return Err(err),
        };

        let entry = ReplayEntry::new(bin.clone(), replay_id, reference, reason, function_name);
        self.replays.push(entry);
        Ok(self.replays.last())
    }

    /// Strictly increasing per Outpost so that failures recorded within the
    /// same microsecond keep their order.
    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    pub fn processed(&self) -> &[Value] {
        &self.processed
    }

    pub fn replays(&self) -> &[ReplayEntry] {
        &self.replays
    }

    /// Every failure noted so far, in dispatch order.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn is_many(&self) -> bool {
        self.many
    }

    /// Hand the new entries over for persistence.
    pub fn take_replays(&mut self) -> Vec<ReplayEntry> {
        std::mem::take(&mut self.replays)
    }

    /// Caller-facing value: every output for a batch, the first one for a
    /// single event, nothing if nothing was processed.
    pub fn into_result(self) -> Option<Value> {
        if self.processed.is_empty() {
            return None;
        }
        if self.many {
            Some(Value::Array(self.processed))
        } else {
            self.processed.into_iter().next()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::{InMemoryObjectStore, ObjectStore, ObjectStoreError};
    use serde_json::json;

    fn bin() -> BinName {
        BinName::new("orders").unwrap()
    }

    #[test]
    fn return_shaping() {
        let mut many = Outpost::new(true, Arc::default());
        many.add_processed(json!(1));
        many.add_processed(json!(2));
        assert_eq!(many.into_result(), Some(json!([1, 2])));

        let mut single = Outpost::new(false, Arc::default());
        single.add_processed(json!({"ok": true}));
        assert_eq!(single.into_result(), Some(json!({"ok": true})));

        let mut nothing = Outpost::new(true, Arc::default());
        nothing.skip();
        assert_eq!(nothing.skipped(), 1);
        assert_eq!(nothing.into_result(), None);
    }

    #[test]
    fn failures_get_increasing_ids() {
        let mut outpost = Outpost::new(true, Arc::default());
        for i in 0..50 {
            outpost
                .record_failure(&bin(), &json!({"n": i}), "boom", None)
                .unwrap()
                .unwrap();
        }
        let ids: Vec<_> = outpost.replays().iter().map(|e| e.replay_id.clone()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(outpost.has_failures());
    }

    #[test]
    fn function_name_is_attached() {
        let mut outpost = Outpost::new(false, Arc::default());
        let entry = outpost
            .record_failure(&bin(), &json!({}), "smtp down", Some("notify".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(entry.function_name.as_deref(), Some("notify"));
        assert_eq!(entry.run_count, 1);
        assert_eq!(entry.reason, "smtp down");
    }

    struct Broken;

    impl ObjectStore for Broken {
        fn put(&self, _: &str, _: &str, _: Vec<u8>) -> Result<(), ObjectStoreError> {
            Err(ObjectStoreError::Storage("unavailable".to_string()))
        }

        fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
            Err(ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        }
    }

    #[test]
    fn external_failure_falls_back_to_inline() {
        let archive = Arc::new(PayloadArchive::external(Arc::new(Broken), "payloads"));
        let mut outpost = Outpost::new(false, archive.clone());
        let record = json!({"type": "x"});
        let entry = outpost.record_failure(&bin(), &record, "boom", None).unwrap().unwrap();
        assert!(!entry.record.is_external());
        assert_eq!(archive.restore(&entry.record).unwrap(), record);

        let healthy = Arc::new(PayloadArchive::external(
            Arc::new(InMemoryObjectStore::new()),
            "payloads",
        ));
        let mut outpost = Outpost::new(false, healthy);
        let entry = outpost.record_failure(&bin(), &record, "boom", None).unwrap().unwrap();
        assert!(entry.record.is_external());
    }

    #[test]
    fn replaying_notes_failures_without_stashing() {
        let mut outpost = Outpost::replaying(false);
        let entry = outpost
            .record_failure(&bin(), &json!({"type": "x"}), "still down", Some("notify".to_string()))
            .unwrap();
        assert!(entry.is_none());
        assert!(outpost.replays().is_empty());
        assert!(outpost.has_failures());
        assert_eq!(
            outpost.failures(),
            [Failure {
                reason: "still down".to_string(),
                function_name: Some("notify".to_string()),
            }]
        );
    }
}
