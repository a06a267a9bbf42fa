use std::collections::HashMap;
use std::sync::RwLock;

use super::{ObjectStore, ObjectStoreError};

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| ObjectStoreError::Storage("object store lock poisoned".to_string()))?;
        objects.insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| ObjectStoreError::Storage("object store lock poisoned".to_string()))?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}
