//! Blob storage for payloads that should not be inlined into replay entries.

pub mod in_memory;

use std::sync::Arc;

use thiserror::Error;

pub use in_memory::InMemoryObjectStore;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObjectStoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("storage error: {0}")]
    Storage(String),
}

pub trait ObjectStore: Send + Sync {
    fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError>;

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError>;
}

impl<S> ObjectStore for Arc<S>
where
    S: ObjectStore + ?Sized,
{
    fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError> {
        (**self).put(bucket, key, bytes)
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        (**self).get(bucket, key)
    }
}
