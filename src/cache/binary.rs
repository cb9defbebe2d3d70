//! Two-tier binary object cache

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use chrono::Utc;
use flume::Sender;
use log::{debug, warn};

use super::disk::DiskStore;
use super::durable::{DurableStore, UnavailableStore};
use super::eviction::EvictionPolicy;
use super::key::CacheKey;
use super::memory::MemoryTier;
use super::object::{CachedObject, Metadata};
use super::writer::{WriteJob, persistence_worker};
use super::DEFAULT_MEMORY_ITEMS;

/// Cache configuration options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of objects kept in the memory tier
    pub memory_items: usize,
    /// Ceilings for the durable tier
    pub policy: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_items: DEFAULT_MEMORY_ITEMS,
            policy: EvictionPolicy::default(),
        }
    }
}

/// Occupancy snapshot of both tiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_items: usize,
    pub memory_capacity: usize,
    pub durable_items: usize,
    pub durable_bytes: u64,
    /// False when the durable tier could not be listed
    pub durable_available: bool,
}

struct Shared {
    memory: Mutex<MemoryTier>,
    store: Arc<dyn DurableStore>,
    jobs: Sender<WriteJob>,
    writer: Mutex<Option<JoinHandle<()>>>,
    config: CacheConfig,
    /// Bumped by every `clear`, under the memory lock
    generation: AtomicU64,
    /// Clear jobs queued but not yet applied by the writer
    pending_clears: Arc<AtomicUsize>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let _ = self.jobs.send(WriteJob::Shutdown);
        let handle = self
            .writer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

/// Binary cache for raw document bytes.
///
/// Memory tier in front of a durable store. Durable writes happen on a
/// background thread and durable faults are absorbed: the worst a broken
/// store can do is turn every lookup into a miss. Clones share state.
#[derive(Clone)]
pub struct BinaryCache {
    shared: Arc<Shared>,
}

impl BinaryCache {
    /// Create a cache over `store`
    #[must_use]
    pub fn new(store: Arc<dyn DurableStore>, config: CacheConfig) -> Self {
        let (jobs_tx, jobs_rx) = flume::unbounded();

        let worker_store = Arc::clone(&store);
        let pending_clears = Arc::new(AtomicUsize::new(0));
        let worker_clears = Arc::clone(&pending_clears);
        let policy = config.policy;
        let writer = std::thread::spawn(move || {
            persistence_worker(worker_store, policy, jobs_rx, worker_clears);
        });

        Self {
            shared: Arc::new(Shared {
                memory: Mutex::new(MemoryTier::new(config.memory_items)),
                store,
                jobs: jobs_tx,
                writer: Mutex::new(Some(writer)),
                config,
                generation: AtomicU64::new(0),
                pending_clears,
            }),
        }
    }

    /// Create a cache persisted under `dir`. If the directory cannot be used
    /// the cache runs memory-only.
    #[must_use]
    pub fn on_disk(dir: &Path, config: CacheConfig) -> Self {
        let store: Arc<dyn DurableStore> = match DiskStore::open(dir) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!("Durable cache at {dir:?} unavailable, running memory-only: {e}");
                Arc::new(UnavailableStore::new(e.to_string()))
            }
        };
        Self::new(store, config)
    }

    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.shared.config
    }

    fn memory(&self) -> MutexGuard<'_, MemoryTier> {
        self.shared
            .memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch a copy of the cached bytes for `key`.
    ///
    /// Memory tier first, then the durable tier; a durable hit is promoted
    /// into memory. Returns `None` on a miss in both, including when the
    /// durable tier fails. While a `clear` has not reached the durable tier
    /// yet, that tier counts as empty.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        if let Some(object) = self.memory().get(key) {
            debug!("[cache hit: memory] {key}");
            return Some(object.copy_bytes());
        }

        // read before the pending check, so a clear racing this lookup
        // always shows up as a generation change
        let generation = self.shared.generation.load(Ordering::SeqCst);
        if self.clear_pending() {
            debug!("[cache miss] {key} (durable clear pending)");
            return None;
        }

        match self.shared.store.get(key) {
            Ok(Some(object)) => {
                let mut memory = self.memory();
                if self.shared.generation.load(Ordering::SeqCst) != generation {
                    debug!("[cache miss] {key} (cleared during durable read)");
                    return None;
                }
                debug!("[cache hit: durable] {key}");
                let bytes = object.copy_bytes();
                if let Some(evicted) = memory.insert(object) {
                    debug!("Memory tier full, dropped {evicted}");
                }
                Some(bytes)
            }
            Ok(None) => {
                debug!("[cache miss] {key}");
                None
            }
            Err(e) => {
                warn!("Durable read for {key} failed, treating as miss: {e}");
                None
            }
        }
    }

    fn clear_pending(&self) -> bool {
        self.shared.pending_clears.load(Ordering::SeqCst) > 0
    }

    /// Store a copy of `bytes` under `key`.
    ///
    /// The memory tier is updated immediately; the durable write and the
    /// eviction pass that follows it run in the background.
    pub fn put(&self, key: CacheKey, bytes: &[u8], metadata: Metadata) {
        let object = CachedObject::new(key, Arc::from(bytes), metadata, Utc::now());

        if let Some(evicted) = self.memory().insert(object.clone()) {
            debug!("Memory tier full, dropped {evicted}");
        }

        let key = object.key.clone();
        if self.shared.jobs.send(WriteJob::Put(object)).is_err() {
            warn!("Cache writer stopped, {key} kept in memory only");
        }
    }

    /// Empty both tiers
    pub fn clear(&self) {
        {
            let mut memory = self.memory();
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            self.shared.pending_clears.fetch_add(1, Ordering::SeqCst);
            memory.clear();
        }
        if self.shared.jobs.send(WriteJob::Clear).is_err() {
            self.shared.pending_clears.fetch_sub(1, Ordering::SeqCst);
            warn!("Cache writer stopped, durable tier not cleared");
        }
    }

    /// Block until every durable job queued so far has been applied
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = flume::bounded(1);
        if self.shared.jobs.send(WriteJob::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let (memory_items, memory_capacity) = {
            let memory = self.memory();
            (memory.len(), memory.capacity())
        };

        match self.shared.store.entries_by_timestamp() {
            Ok(entries) => CacheStats {
                memory_items,
                memory_capacity,
                durable_items: entries.len(),
                durable_bytes: entries.iter().map(|e| e.size).sum(),
                durable_available: true,
            },
            Err(e) => {
                warn!("Could not list durable cache: {e}");
                CacheStats {
                    memory_items,
                    memory_capacity,
                    ..CacheStats::default()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use std::time::Duration;

    use super::*;
    use crate::cache::{DurableError, EntrySummary};
    use crate::test_utils::test_helpers::{FailingStore, MemoryStore};

    /// Memory store whose `clear` takes a while to land
    #[derive(Default)]
    struct SlowClearStore {
        inner: MemoryStore,
    }

    impl DurableStore for SlowClearStore {
        fn get(&self, key: &CacheKey) -> Result<Option<CachedObject>, DurableError> {
            self.inner.get(key)
        }

        fn put(&self, object: &CachedObject) -> Result<(), DurableError> {
            self.inner.put(object)
        }

        fn delete(&self, key: &CacheKey) -> Result<(), DurableError> {
            self.inner.delete(key)
        }

        fn entries_by_timestamp(&self) -> Result<Vec<EntrySummary>, DurableError> {
            self.inner.entries_by_timestamp()
        }

        fn clear(&self) -> Result<(), DurableError> {
            std::thread::sleep(Duration::from_millis(200));
            self.inner.clear()
        }
    }

    fn small_config() -> CacheConfig {
        CacheConfig {
            memory_items: 2,
            policy: EvictionPolicy::new(3, u64::MAX),
        }
    }

    #[test]
    fn get_returns_copy_not_shared_buffer() {
        let cache = BinaryCache::new(Arc::new(MemoryStore::default()), small_config());
        let key = CacheKey::new("doc_abc");
        cache.put(key.clone(), b"bytes", Metadata::new());

        let first = cache.get(&key).expect("hit");
        let second = cache.get(&key).expect("hit");
        assert_eq!(first, b"bytes");
        assert_ne!(first.as_ptr(), second.as_ptr());
    }

    #[test]
    fn durable_hit_is_promoted_to_memory() {
        let store = Arc::new(MemoryStore::default());
        let cache = BinaryCache::new(store.clone(), small_config());

        cache.put(CacheKey::new("a"), b"a", Metadata::new());
        cache.put(CacheKey::new("b"), b"b", Metadata::new());
        cache.put(CacheKey::new("c"), b"c", Metadata::new());
        cache.flush();
        assert_eq!(cache.stats().memory_items, 2);

        // "a" fell out of memory but is still durable
        let reads_before = store.reads();
        assert_eq!(cache.get(&CacheKey::new("a")).as_deref(), Some(&b"a"[..]));
        assert_eq!(store.reads(), reads_before + 1);

        // second read is served from memory
        assert_eq!(cache.get(&CacheKey::new("a")).as_deref(), Some(&b"a"[..]));
        assert_eq!(store.reads(), reads_before + 1);
    }

    #[test]
    fn eviction_runs_after_durable_write() {
        let store = Arc::new(MemoryStore::default());
        let cache = BinaryCache::new(store.clone(), small_config());

        for i in 0..5 {
            cache.put(CacheKey::new(format!("k{i}")), b"x", Metadata::new());
        }
        cache.flush();

        let stats = cache.stats();
        assert_eq!(stats.durable_items, 3);
        assert!(!store.contains(&CacheKey::new("k0")));
        assert!(!store.contains(&CacheKey::new("k1")));
        assert!(store.contains(&CacheKey::new("k4")));
    }

    #[test]
    fn failing_store_degrades_to_miss() {
        let cache = BinaryCache::new(Arc::new(FailingStore), small_config());
        let key = CacheKey::new("doc");

        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), b"data", Metadata::new());
        cache.flush();

        // memory tier still serves the put
        assert_eq!(cache.get(&key).as_deref(), Some(&b"data"[..]));
        cache.clear();
        assert!(cache.get(&key).is_none());
        assert!(!cache.stats().durable_available);
    }

    #[test]
    fn clear_empties_both_tiers() {
        let dir = TempDir::new().unwrap();
        let cache = BinaryCache::on_disk(dir.path(), small_config());
        cache.put(CacheKey::new("a"), b"a", Metadata::new());
        cache.flush();

        cache.clear();
        cache.flush();

        let stats = cache.stats();
        assert_eq!(stats.memory_items, 0);
        assert_eq!(stats.durable_items, 0);
        assert!(cache.get(&CacheKey::new("a")).is_none());
    }

    #[test]
    fn get_during_slow_clear_does_not_resurrect_entry() {
        let store = Arc::new(SlowClearStore::default());
        let cache = BinaryCache::new(store.clone(), small_config());
        let key = CacheKey::new("a");
        cache.put(key.clone(), b"stale", Metadata::new());
        cache.flush();

        cache.clear();
        // durable clear still queued behind the slow store
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().memory_items, 0);

        cache.flush();
        assert!(cache.get(&key).is_none());
        assert!(!store.inner.contains(&key));
        assert_eq!(cache.stats().memory_items, 0);
    }

    #[test]
    fn put_after_clear_survives_the_clear() {
        let store = Arc::new(SlowClearStore::default());
        let cache = BinaryCache::new(store.clone(), small_config());
        cache.put(CacheKey::new("old"), b"old", Metadata::new());
        cache.flush();

        cache.clear();
        cache.put(CacheKey::new("new"), b"new", Metadata::new());
        cache.flush();

        assert!(cache.get(&CacheKey::new("old")).is_none());
        assert_eq!(cache.get(&CacheKey::new("new")).as_deref(), Some(&b"new"[..]));
        assert!(store.inner.contains(&CacheKey::new("new")));
    }

    #[test]
    fn unusable_directory_runs_memory_only() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"occupied").unwrap();

        let cache = BinaryCache::on_disk(&file, small_config());
        cache.put(CacheKey::new("a"), b"a", Metadata::new());
        cache.flush();
        assert_eq!(cache.get(&CacheKey::new("a")).as_deref(), Some(&b"a"[..]));
        assert!(!cache.stats().durable_available);
    }
}
