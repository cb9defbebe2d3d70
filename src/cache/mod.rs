//! Two-tier cache for downloaded document bytes

mod binary;
mod disk;
mod durable;
mod eviction;
mod key;
mod memory;
mod object;
mod writer;

pub use binary::{BinaryCache, CacheConfig, CacheStats};
pub use disk::DiskStore;
pub use durable::{DurableError, DurableStore, EntrySummary, UnavailableStore, sort_oldest_first};
pub use eviction::{EvictionPolicy, EvictionReport};
pub use key::{CacheKey, DocumentIdentity};
pub use memory::MemoryTier;
pub use object::{CachedObject, Metadata, download_metadata};

/// Durable tier item ceiling
pub const DEFAULT_MAX_ITEMS: usize = 25;
/// Durable tier byte ceiling (150 MiB)
pub const DEFAULT_MAX_BYTES: u64 = 150 * 1024 * 1024;
/// Memory tier capacity
pub const DEFAULT_MEMORY_ITEMS: usize = 5;
