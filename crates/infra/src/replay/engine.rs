//! Replay engine: drains one bin in order, halting on the first renewed failure.
//!
//! ```text
//! Pending ──run──▶ Running ──ok──▶ deleted
//!                     │
//!                     └─fail─▶ run_count += 1 ──▶ halt (entry stays first in line)
//!                                  │
//!                                  └─ exhausted + dead-letter queue ─▶ sent, deleted, continue
//! ```
//!
//! An entry that cannot even be reconstructed counts as a failed attempt.

use std::sync::Arc;

use outpost_core::{BinName, ReplayEntry, ReplayId};
use outpost_events::Context;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::dispatch::EventProcessor;
use crate::queue::{MessageQueue, QueueError};
use crate::replay_store::{ReplayStore, ReplayStoreError};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Store(#[from] ReplayStoreError),

    #[error("dead-letter delivery failed: {0}")]
    Queue(#[from] QueueError),
}

/// Summary of one replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    /// Entry that stopped the run.
    pub halted_on: Option<ReplayId>,
}

enum Verdict {
    Succeeded,
    Failed(String),
}

pub struct ReplayEngine {
    processor: Arc<EventProcessor>,
    store: Arc<dyn ReplayStore>,
    dead_letter_queue: Option<Arc<dyn MessageQueue>>,
}

impl ReplayEngine {
    pub fn new(processor: Arc<EventProcessor>, store: Arc<dyn ReplayStore>) -> Self {
        Self {
            processor,
            store,
            dead_letter_queue: None,
        }
    }

    pub fn with_dead_letter_queue(mut self, queue: Arc<dyn MessageQueue>) -> Self {
        self.dead_letter_queue = Some(queue);
        self
    }

    /// Replay the bin of the processor's deployment.
    pub fn run_default(&self, ctx: &Context) -> Result<ReplayReport, ReplayError> {
        let bin = self.processor.config().bin.clone();
        self.run(&bin, ctx)
    }

    /// Replay up to one page of `bin`, oldest first.
    pub fn run(&self, bin: &BinName, ctx: &Context) -> Result<ReplayReport, ReplayError> {
        let page_size = self.processor.config().replay_page_size;
        let entries = self.store.query(bin, page_size)?;
        let mut report = ReplayReport::default();

        debug!(bin = %bin, pending = entries.len(), "starting replay run");

        for entry in entries {
            report.attempted += 1;
            match self.attempt(&entry, ctx) {
                Verdict::Succeeded => {
                    self.store.delete(bin, &entry.replay_id)?;
                    report.succeeded += 1;
                    debug!(bin = %bin, replay_id = %entry.replay_id, "replay succeeded");
                }
                Verdict::Failed(reason) => {
                    report.failed += 1;
                    let run_count = self.store.increment_run_count(bin, &entry.replay_id)?;
                    warn!(
                        bin = %bin,
                        replay_id = %entry.replay_id,
                        run_count,
                        reason = %reason,
                        "replay failed"
                    );

                    if self.dead_letter(&entry, run_count, &reason)? {
                        report.dead_lettered += 1;
                        continue;
                    }

                    report.halted_on = Some(entry.replay_id.clone());
                    break;
                }
            }
        }

        info!(
            bin = %bin,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            dead_lettered = report.dead_lettered,
            "replay run finished"
        );
        Ok(report)
    }

    fn attempt(&self, entry: &ReplayEntry, ctx: &Context) -> Verdict {
        let record = match self.processor.archive().restore(&entry.record) {
            Ok(record) => record,
            Err(err) => return Verdict::Failed(format!("payload unavailable: {err}")),
        };

        match self
            .processor
            .replay(record, ctx, entry.function_name.as_deref())
        {
            Ok(outpost) => match outpost.failures().first() {
                None => Verdict::Succeeded,
                Some(renewed) => Verdict::Failed(renewed.reason.clone()),
            },
            Err(err) => Verdict::Failed(err.to_string()),
        }
    }

    /// Move an exhausted entry to the dead-letter queue. Returns whether it left
    /// the bin.
    fn dead_letter(&self, entry: &ReplayEntry, run_count: u32, reason: &str) -> Result<bool, ReplayError> {
        let policy = &self.processor.config().dead_letter;
        if !policy.is_exhausted(run_count) {
            return Ok(false);
        }

        let (Some(destination), Some(queue)) = (&policy.queue, &self.dead_letter_queue) else {
            error!(
                bin = %entry.bin,
                replay_id = %entry.replay_id,
                run_count,
                "replay entry exhausted but no dead-letter queue is configured"
            );
            return Ok(false);
        };

        let record = self
            .processor
            .archive()
            .restore(&entry.record)
            .unwrap_or(Value::Null);
        let payload = json!({
            "bin": entry.bin,
            "replay_id": entry.replay_id,
            "run_count": run_count,
            "reason": reason,
            "function_name": entry.function_name,
            "record": record,
            "record_ref": entry.record,
        });
        queue.send(destination, &payload)?;
        self.store.delete(&entry.bin, &entry.replay_id)?;

        error!(
            bin = %entry.bin,
            replay_id = %entry.replay_id,
            run_count,
            destination = %destination,
            "replay entry dead-lettered"
        );
        Ok(true)
    }
}

impl core::fmt::Debug for ReplayEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReplayEngine")
            .field("processor", &self.processor)
            .field("dead_letter_queue", &self.dead_letter_queue.is_some())
            .finish_non_exhaustive()
    }
}
