//! Cached binary objects

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::durable::EntrySummary;
use super::key::{CacheKey, DocumentIdentity};

/// Informational metadata stored alongside cached bytes
pub type Metadata = BTreeMap<String, String>;

/// Raw document bytes plus eviction bookkeeping.
///
/// The byte buffer is shared and immutable; callers only ever receive
/// copies through [`CachedObject::copy_bytes`].
#[derive(Clone)]
pub struct CachedObject {
    pub key: CacheKey,
    pub bytes: Arc<[u8]>,
    /// Byte length used for eviction accounting
    pub size: u64,
    /// Last write time, the eviction recency signal
    pub timestamp: DateTime<Utc>,
    pub metadata: Metadata,
}

impl CachedObject {
    #[must_use]
    pub fn new(
        key: CacheKey,
        bytes: Arc<[u8]>,
        metadata: Metadata,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            size: bytes.len() as u64,
            bytes,
            timestamp,
            metadata,
        }
    }

    /// Fresh owned copy of the bytes, safe to hand to a consuming decoder
    #[must_use]
    pub fn copy_bytes(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    #[must_use]
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            key: self.key.clone(),
            size: self.size,
            timestamp: self.timestamp,
        }
    }
}

impl std::fmt::Debug for CachedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedObject")
            .field("key", &self.key)
            .field("size", &self.size)
            .field("timestamp", &self.timestamp)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Metadata recorded when a document is downloaded into the cache
#[must_use]
pub fn download_metadata(document: &DocumentIdentity, downloaded_at: DateTime<Utc>) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("docName".to_string(), document.name.clone());
    metadata.insert("path".to_string(), document.url.clone());
    metadata.insert("downloadedAt".to_string(), downloaded_at.to_rfc3339());
    metadata
}
