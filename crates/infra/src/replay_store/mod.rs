//! Durable store of pending replay entries.
//!
//! Entries are keyed by `(bin, replay_id)` and listed per bin in ascending
//! `replay_id` order, which is chronological. Only the replay engine mutates or
//! deletes entries; the event processor only inserts.

pub mod in_memory;

use std::sync::Arc;

use outpost_core::{BinName, ReplayEntry, ReplayId};
use thiserror::Error;

pub use in_memory::InMemoryReplayStore;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplayStoreError {
    #[error("replay entry not found: {bin}/{replay_id}")]
    NotFound { bin: BinName, replay_id: ReplayId },

    #[error("replay entry already exists: {bin}/{replay_id}")]
    AlreadyExists { bin: BinName, replay_id: ReplayId },

    #[error("storage error: {0}")]
    Storage(String),
}

pub trait ReplayStore: Send + Sync {
    /// Insert a new entry.
    fn put(&self, entry: ReplayEntry) -> Result<(), ReplayStoreError>;

    /// Insert several entries (one round trip where the backend supports it).
    fn put_batch(&self, entries: Vec<ReplayEntry>) -> Result<(), ReplayStoreError> {
        for entry in entries {
            self.put(entry)?;
        }
        Ok(())
    }

    /// Oldest `limit` entries of a bin, ordered by `replay_id`.
    fn query(&self, bin: &BinName, limit: usize) -> Result<Vec<ReplayEntry>, ReplayStoreError>;

    fn get(&self, bin: &BinName, replay_id: &ReplayId) -> Result<Option<ReplayEntry>, ReplayStoreError>;

    /// Atomically add one to `run_count`; returns the new count.
    fn increment_run_count(&self, bin: &BinName, replay_id: &ReplayId) -> Result<u32, ReplayStoreError>;

    fn delete(&self, bin: &BinName, replay_id: &ReplayId) -> Result<(), ReplayStoreError>;
}

impl<S> ReplayStore for Arc<S>
where
    S: ReplayStore + ?Sized,
{
    fn put(&self, entry: ReplayEntry) -> Result<(), ReplayStoreError> {
        (**self).put(entry)
    }

    fn put_batch(&self, entries: Vec<ReplayEntry>) -> Result<(), ReplayStoreError> {
        (**self).put_batch(entries)
    }

    fn query(&self, bin: &BinName, limit: usize) -> Result<Vec<ReplayEntry>, ReplayStoreError> {
        (**self).query(bin, limit)
    }

    fn get(&self, bin: &BinName, replay_id: &ReplayId) -> Result<Option<ReplayEntry>, ReplayStoreError> {
        (**self).get(bin, replay_id)
    }

    fn increment_run_count(&self, bin: &BinName, replay_id: &ReplayId) -> Result<u32, ReplayStoreError> {
        (**self).increment_run_count(bin, replay_id)
    }

    fn delete(&self, bin: &BinName, replay_id: &ReplayId) -> Result<(), ReplayStoreError> {
        (**self).delete(bin, replay_id)
    }
}
