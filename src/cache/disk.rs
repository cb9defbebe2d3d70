//! Directory-backed durable store
//!
//! Each entry is two files named after the md5 of its key: `<name>.bin`
//! holds the bytes and `<name>.json` the record. The record is written
//! last, so an entry only becomes visible once its bytes are complete.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::durable::{DurableError, DurableStore, EntrySummary, sort_oldest_first};
use super::key::CacheKey;
use super::object::{CachedObject, Metadata};

const BLOB_EXT: &str = "bin";
const RECORD_EXT: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    key: CacheKey,
    size: u64,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    metadata: Metadata,
}

/// Durable tier that survives restarts, rooted in a single directory
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DurableError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!("Opened durable cache store at {root:?}");
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &CacheKey, ext: &str) -> PathBuf {
        self.root.join(format!("{}.{ext}", key.storage_name()))
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), DurableError> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| DurableError::Io(e.error))?;
        Ok(())
    }

    fn read_record(path: &Path) -> Result<StoredRecord, DurableError> {
        let content = fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }
}

fn remove_if_present(path: &Path) -> Result<(), DurableError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl DurableStore for DiskStore {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedObject>, DurableError> {
        let record_path = self.path_for(key, RECORD_EXT);
        let record = match Self::read_record(&record_path) {
            Ok(record) => record,
            Err(DurableError::Io(e)) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        // md5 collision or stale record from another key
        if &record.key != key {
            return Ok(None);
        }

        let bytes = match fs::read(self.path_for(key, BLOB_EXT)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DurableError::corrupt(key, "record without blob"));
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.len() as u64 != record.size {
            return Err(DurableError::corrupt(
                key,
                format!("expected {} bytes, found {}", record.size, bytes.len()),
            ));
        }

        Ok(Some(CachedObject::new(
            record.key,
            Arc::from(bytes),
            record.metadata,
            record.timestamp,
        )))
    }

    fn put(&self, object: &CachedObject) -> Result<(), DurableError> {
        self.write_atomic(&self.path_for(&object.key, BLOB_EXT), &object.bytes)?;

        let record = StoredRecord {
            key: object.key.clone(),
            size: object.size,
            timestamp: object.timestamp,
            metadata: object.metadata.clone(),
        };
        let content = serde_json::to_vec(&record)?;
        self.write_atomic(&self.path_for(&object.key, RECORD_EXT), &content)
    }

    fn delete(&self, key: &CacheKey) -> Result<(), DurableError> {
        remove_if_present(&self.path_for(key, RECORD_EXT))?;
        remove_if_present(&self.path_for(key, BLOB_EXT))
    }

    fn entries_by_timestamp(&self) -> Result<Vec<EntrySummary>, DurableError> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }

            match Self::read_record(&path) {
                Ok(record) => entries.push(EntrySummary {
                    key: record.key,
                    size: record.size,
                    timestamp: record.timestamp,
                }),
                Err(e) => warn!("Skipping unreadable cache record {path:?}: {e}"),
            }
        }

        sort_oldest_first(&mut entries);
        Ok(entries)
    }

    /// Remove cache entries only; anything else in the directory is left alone
    fn clear(&self) -> Result<(), DurableError> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if path.is_file() && matches!(ext, Some(BLOB_EXT | RECORD_EXT)) {
                remove_if_present(&path)?;
            }
        }
        Ok(())
    }
}
