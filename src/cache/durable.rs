//! Durable tier contract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::CacheKey;
use super::object::CachedObject;

/// Byte-free view of a durable entry, enough for eviction accounting
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub key: CacheKey,
    pub size: u64,
    pub timestamp: DateTime<Utc>,
}

/// Errors from the durable tier. These never leave the cache boundary.
#[derive(Debug, thiserror::Error)]
pub enum DurableError {
    #[error("durable store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("durable record encoding: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt durable entry {key}: {detail}")]
    Corrupt { key: String, detail: String },

    #[error("durable store unavailable: {detail}")]
    Unavailable { detail: String },
}

impl DurableError {
    pub fn corrupt(key: &CacheKey, detail: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            detail: detail.into(),
        }
    }
}

/// Persistent key-value blob store backing the cache.
///
/// Writes are idempotent by key: the last write wins.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedObject>, DurableError>;

    fn put(&self, object: &CachedObject) -> Result<(), DurableError>;

    /// Deleting a missing key is not an error
    fn delete(&self, key: &CacheKey) -> Result<(), DurableError>;

    /// All entries, oldest write first
    fn entries_by_timestamp(&self) -> Result<Vec<EntrySummary>, DurableError>;

    fn clear(&self) -> Result<(), DurableError>;
}

/// Order summaries oldest first, breaking timestamp ties by key
pub fn sort_oldest_first(entries: &mut [EntrySummary]) {
    entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key)));
}

/// Stand-in used when no durable backend could be opened.
///
/// Every operation fails, which the cache turns into plain misses.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> DurableError {
        DurableError::Unavailable {
            detail: self.reason.clone(),
        }
    }
}

impl DurableStore for UnavailableStore {
    fn get(&self, _key: &CacheKey) -> Result<Option<CachedObject>, DurableError> {
        Err(self.error())
    }

    fn put(&self, _object: &CachedObject) -> Result<(), DurableError> {
        Err(self.error())
    }

    fn delete(&self, _key: &CacheKey) -> Result<(), DurableError> {
        Err(self.error())
    }

    fn entries_by_timestamp(&self) -> Result<Vec<EntrySummary>, DurableError> {
        Err(self.error())
    }

    fn clear(&self) -> Result<(), DurableError> {
        Err(self.error())
    }
}
