//! Failed-record payloads: inline (JSON, gzip, base64) or external.
//!
//! Inline payloads travel inside the replay entry itself. When a bucket is
//! configured the record is written verbatim to the object store instead and
//! the entry only keeps a pointer.

use std::io::{Read, Write};
use std::sync::Arc;

use base64::prelude::*;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use outpost_core::{BinName, RecordRef, ReplayId};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::object_store::{ObjectStore, ObjectStoreError};

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("gzip stream error: {0}")]
    Compression(#[from] std::io::Error),

    #[error("inline payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),

    #[error("payload lives in bucket `{bucket}` but no object store is configured")]
    NoObjectStore { bucket: String },
}

/// Serialize, gzip and base64-encode a record.
pub fn compress(record: &Value) -> Result<String, PayloadError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, record)?;
    encoder.flush()?;
    let bytes = encoder.finish()?;
    Ok(BASE64_STANDARD.encode(bytes))
}

/// Inverse of [`compress`].
pub fn decompress(data: &str) -> Result<Value, PayloadError> {
    let bytes = BASE64_STANDARD.decode(data)?;
    let mut json = Vec::new();
    GzDecoder::new(bytes.as_slice()).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Object key of an externally stored payload.
pub fn external_key(bin: &BinName, replay_id: &ReplayId) -> String {
    format!("replay/{bin}/{replay_id}.json")
}

struct External {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

/// Stores and reconstructs the payload of failed records.
pub struct PayloadArchive {
    external: Option<External>,
    reader: Option<Arc<dyn ObjectStore>>,
}

impl PayloadArchive {
    /// Keep every payload inline.
    pub fn inline() -> Self {
        Self {
            external: None,
            reader: None,
        }
    }

    /// Write payloads to `bucket`.
    pub fn external(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            external: Some(External {
                store: Arc::clone(&store),
                bucket: bucket.into(),
            }),
            reader: Some(store),
        }
    }

    /// Inline writes, but external pointers written by another deployment can
    /// still be read back.
    pub fn inline_with_reader(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            external: None,
            reader: Some(store),
        }
    }

    pub fn bucket(&self) -> Option<&str> {
        self.external.as_ref().map(|e| e.bucket.as_str())
    }

    /// Persist a record and return the reference to keep in its replay entry.
    pub fn stash(
        &self,
        bin: &BinName,
        replay_id: &ReplayId,
        record: &Value,
    ) -> Result<RecordRef, PayloadError> {
        let Some(external) = &self.external else {
            return Self::stash_inline(record);
        };

        let key = external_key(bin, replay_id);
        external
            .store
            .put(&external.bucket, &key, serde_json::to_vec(record)?)?;
        debug!(bucket = %external.bucket, key = %key, "stored payload externally");
        Ok(RecordRef::External {
            bucket: external.bucket.clone(),
            key,
        })
    }

    pub fn stash_inline(record: &Value) -> Result<RecordRef, PayloadError> {
        Ok(RecordRef::Inline {
            data: compress(record)?,
        })
    }

    /// Reconstruct the original record.
    pub fn restore(&self, reference: &RecordRef) -> Result<Value, PayloadError> {
        match reference {
            RecordRef::Inline { data } => decompress(data),
            RecordRef::External { bucket, key } => {
                let store = self.reader.as_ref().ok_or_else(|| PayloadError::NoObjectStore {
                    bucket: bucket.clone(),
                })?;
                Ok(serde_json::from_slice(&store.get(bucket, key)?)?)
            }
        }
    }
}

impl Default for PayloadArchive {
    fn default() -> Self {
        Self::inline()
    }
}

impl core::fmt::Debug for PayloadArchive {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PayloadArchive")
            .field("bucket", &self.bucket())
            .field("reader", &self.reader.is_some())
            .finish()
    }
}
