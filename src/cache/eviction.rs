//! Size- and count-bounded eviction of the durable tier

use log::{info, warn};

use super::durable::{DurableError, DurableStore, EntrySummary};
use super::key::CacheKey;
use super::{DEFAULT_MAX_BYTES, DEFAULT_MAX_ITEMS};

/// Two independent ceilings on the durable tier. Eviction only stops once
/// both hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvictionPolicy {
    pub max_items: usize,
    pub max_bytes: u64,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

/// Result of one enforcement pass
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: Vec<CacheKey>,
    pub failed: Vec<CacheKey>,
}

impl EvictionPolicy {
    #[must_use]
    pub const fn new(max_items: usize, max_bytes: u64) -> Self {
        Self {
            max_items,
            max_bytes,
        }
    }

    #[must_use]
    pub fn is_within(&self, count: usize, bytes: u64) -> bool {
        count <= self.max_items && bytes <= self.max_bytes
    }

    /// Keys to delete, given entries sorted oldest first
    #[must_use]
    pub fn plan(&self, entries: &[EntrySummary]) -> Vec<CacheKey> {
        let mut total_bytes: u64 = entries.iter().map(|e| e.size).sum();
        let mut count = entries.len();
        let mut doomed = Vec::new();

        for entry in entries {
            if self.is_within(count, total_bytes) {
                break;
            }
            doomed.push(entry.key.clone());
            total_bytes = total_bytes.saturating_sub(entry.size);
            count -= 1;
        }

        doomed
    }

    /// Bring `store` within both ceilings. A failed delete is logged and the
    /// remaining deletions still run.
    pub fn enforce(&self, store: &dyn DurableStore) -> Result<EvictionReport, DurableError> {
        let entries = store.entries_by_timestamp()?;
        let mut report = EvictionReport::default();

        for key in self.plan(&entries) {
            match store.delete(&key) {
                Ok(()) => report.evicted.push(key),
                Err(e) => {
                    warn!("Failed to evict cache entry {key}: {e}");
                    report.failed.push(key);
                }
            }
        }

        if !report.evicted.is_empty() {
            info!(
                "Evicted {} cache entries ({} items / {} bytes ceiling)",
                report.evicted.len(),
                self.max_items,
                self.max_bytes
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::cache::{CachedObject, Metadata};
    use crate::test_utils::test_helpers::MemoryStore;

    /// Memory store that refuses to delete one key
    struct StuckKeyStore {
        inner: MemoryStore,
        stuck: CacheKey,
    }

    impl DurableStore for StuckKeyStore {
        fn get(&self, key: &CacheKey) -> Result<Option<CachedObject>, DurableError> {
            self.inner.get(key)
        }

        fn put(&self, object: &CachedObject) -> Result<(), DurableError> {
            self.inner.put(object)
        }

        fn delete(&self, key: &CacheKey) -> Result<(), DurableError> {
            if *key == self.stuck {
                return Err(DurableError::Unavailable {
                    detail: "file locked".to_string(),
                });
            }
            self.inner.delete(key)
        }

        fn entries_by_timestamp(&self) -> Result<Vec<EntrySummary>, DurableError> {
            self.inner.entries_by_timestamp()
        }

        fn clear(&self) -> Result<(), DurableError> {
            self.inner.clear()
        }
    }

    fn entries(sizes: &[u64]) -> Vec<EntrySummary> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| EntrySummary {
                key: CacheKey::new(format!("k{i}")),
                size,
                timestamp: Utc.timestamp_opt(i as i64, 0).single().unwrap(),
            })
            .collect()
    }

    #[test]
    fn empty_store_plans_nothing() {
        assert!(EvictionPolicy::default().plan(&[]).is_empty());
    }

    #[test]
    fn count_ceiling_evicts_oldest() {
        let policy = EvictionPolicy::new(2, u64::MAX);
        let doomed = policy.plan(&entries(&[1, 1, 1, 1]));
        assert_eq!(doomed, vec![CacheKey::new("k0"), CacheKey::new("k1")]);
    }

    #[test]
    fn byte_ceiling_evicts_until_under_budget() {
        let policy = EvictionPolicy::new(100, 10);
        let doomed = policy.plan(&entries(&[6, 3, 4, 2]));
        // 15 total: drop k0 (6) -> 9
        assert_eq!(doomed, vec![CacheKey::new("k0")]);
    }

    #[test]
    fn both_ceilings_must_hold() {
        let policy = EvictionPolicy::new(3, 5);
        // count ok after 1 eviction, bytes need 2
        let doomed = policy.plan(&entries(&[1, 4, 2, 2]));
        assert_eq!(doomed, vec![CacheKey::new("k0"), CacheKey::new("k1")]);
    }

    #[test]
    fn within_limits_is_noop() {
        let policy = EvictionPolicy::default();
        assert!(policy.plan(&entries(&[10, 20, 30])).is_empty());
    }

    #[test]
    fn failed_delete_does_not_stop_the_pass() {
        let store = StuckKeyStore {
            inner: MemoryStore::default(),
            stuck: CacheKey::new("k1"),
        };
        for entry in entries(&[1, 1, 1, 1, 1]) {
            store
                .put(&CachedObject::new(
                    entry.key,
                    Arc::from(&b"x"[..]),
                    Metadata::new(),
                    entry.timestamp,
                ))
                .unwrap();
        }

        let report = EvictionPolicy::new(2, u64::MAX).enforce(&store).unwrap();

        assert_eq!(report.evicted, vec![CacheKey::new("k0"), CacheKey::new("k2")]);
        assert_eq!(report.failed, vec![CacheKey::new("k1")]);
        assert!(!store.inner.contains(&CacheKey::new("k0")));
        assert!(store.inner.contains(&CacheKey::new("k1")));
        assert!(!store.inner.contains(&CacheKey::new("k2")));
        assert!(store.inner.contains(&CacheKey::new("k4")));
    }
}
