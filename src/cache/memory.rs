//! Bounded in-process memory tier

use std::num::NonZeroUsize;

use lru::LruCache;

use super::key::CacheKey;
use super::object::CachedObject;

/// Small hot working set of cached objects, evicting the least recently
/// touched entry when full
pub struct MemoryTier {
    entries: LruCache<CacheKey, CachedObject>,
}

impl MemoryTier {
    /// Create a new tier with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Look up an entry, refreshing its recency
    pub fn get(&mut self, key: &CacheKey) -> Option<&CachedObject> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    /// Insert or overwrite an entry, returning the key pushed out to make room
    pub fn insert(&mut self, object: CachedObject) -> Option<CacheKey> {
        let key = object.key.clone();
        match self.entries.push(key.clone(), object) {
            Some((evicted, _)) if evicted != key => Some(evicted),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}
