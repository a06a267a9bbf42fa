use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use outpost_core::{BinName, ReplayEntry, ReplayId};

use super::{ReplayStore, ReplayStoreError};

/// In-memory replay store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryReplayStore {
    bins: RwLock<HashMap<BinName, BTreeMap<ReplayId, ReplayEntry>>>,
}

impl InMemoryReplayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending entries in a bin.
    pub fn pending(&self, bin: &BinName) -> usize {
        self.bins
            .read()
            .map(|bins| bins.get(bin).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> ReplayStoreError {
    ReplayStoreError::Storage("replay store lock poisoned".to_string())
}

impl ReplayStore for InMemoryReplayStore {
    fn put(&self, entry: ReplayEntry) -> Result<(), ReplayStoreError> {
        let mut bins = self.bins.write().map_err(poisoned)?;
        let bin = bins.entry(entry.bin.clone()).or_default();
        if bin.contains_key(&entry.replay_id) {
            return Err(ReplayStoreError::AlreadyExists {
                bin: entry.bin,
                replay_id: entry.replay_id,
            });
        }
        bin.insert(entry.replay_id.clone(), entry);
        Ok(())
    }

    fn query(&self, bin: &BinName, limit: usize) -> Result<Vec<ReplayEntry>, ReplayStoreError> {
        let bins = self.bins.read().map_err(poisoned)?;
        Ok(bins
            .get(bin)
            .map(|entries| entries.values().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn get(&self, bin: &BinName, replay_id: &ReplayId) -> Result<Option<ReplayEntry>, ReplayStoreError> {
        let bins = self.bins.read().map_err(poisoned)?;
        Ok(bins.get(bin).and_then(|entries| entries.get(replay_id)).cloned())
    }

    fn increment_run_count(&self, bin: &BinName, replay_id: &ReplayId) -> Result<u32, ReplayStoreError> {
        let mut bins = self.bins.write().map_err(poisoned)?;
        let entry = bins
            .get_mut(bin)
            .and_then(|entries| entries.get_mut(replay_id))
            .ok_or_else(|| ReplayStoreError::NotFound {
                bin: bin.clone(),
                replay_id: replay_id.clone(),
            })?;
        entry.run_count += 1;
        Ok(entry.run_count)
    }

    fn delete(&self, bin: &BinName, replay_id: &ReplayId) -> Result<(), ReplayStoreError> {
        let mut bins = self.bins.write().map_err(poisoned)?;
        let removed = bins.get_mut(bin).and_then(|entries| entries.remove(replay_id));
        match removed {
            Some(_) => Ok(()),
            None => Err(ReplayStoreError::NotFound {
                bin: bin.clone(),
                replay_id: replay_id.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use outpost_core::RecordRef;
    use uuid::Uuid;

    fn bin(name: &str) -> BinName {
        BinName::new(name).unwrap()
    }

    fn entry(bin_name: &str, minute: u32) -> ReplayEntry {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap();
        ReplayEntry::new(
            bin(bin_name),
            ReplayId::with_suffix(at, Uuid::new_v4()),
            RecordRef::Inline { data: String::new() },
            "failed",
            None,
        )
    }

    #[test]
    fn query_is_chronological_and_bounded() {
        let store = InMemoryReplayStore::new();
        let late = entry("orders", 30);
        let early = entry("orders", 1);
        let middle = entry("orders", 15);
        store.put(late.clone()).unwrap();
        store.put(early.clone()).unwrap();
        store.put(middle.clone()).unwrap();
        store.put(entry("users", 0)).unwrap();

        let page = store.query(&bin("orders"), 2).unwrap();
        assert_eq!(page, vec![early, middle]);
        assert_eq!(store.pending(&bin("orders")), 3);
        assert!(store.query(&bin("nobody"), 10).unwrap().is_empty());
    }

    #[test]
    fn duplicate_put_is_rejected() {
        let store = InMemoryReplayStore::new();
        let e = entry("orders", 1);
        store.put(e.clone()).unwrap();
        assert!(matches!(store.put(e), Err(ReplayStoreError::AlreadyExists { .. })));
    }

    #[test]
    fn increment_and_delete() {
        let store = InMemoryReplayStore::new();
        let e = entry("orders", 1);
        store.put(e.clone()).unwrap();

        assert_eq!(store.increment_run_count(&e.bin, &e.replay_id).unwrap(), 2);
        assert_eq!(store.increment_run_count(&e.bin, &e.replay_id).unwrap(), 3);
        assert_eq!(store.get(&e.bin, &e.replay_id).unwrap().unwrap().run_count, 3);

        store.delete(&e.bin, &e.replay_id).unwrap();
        assert!(store.get(&e.bin, &e.replay_id).unwrap().is_none());
        assert!(matches!(
            store.delete(&e.bin, &e.replay_id),
            Err(ReplayStoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.increment_run_count(&e.bin, &e.replay_id),
            Err(ReplayStoreError::NotFound { .. })
        ));
    }

    #[test]
    fn put_batch_inserts_all() {
        let store = InMemoryReplayStore::new();
        store
            .put_batch(vec![entry("orders", 1), entry("orders", 2)])
            .unwrap();
        assert_eq!(store.pending(&bin("orders")), 2);
    }
}
