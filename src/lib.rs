// Export modules for the binary and integration tests
pub mod cache;
pub mod fetch;
pub mod overlay;
pub mod panic_handler;
pub mod preview;
pub mod render;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the end-to-end entry points
pub use cache::{BinaryCache, CacheConfig, CacheKey, DocumentIdentity};
pub use preview::{CacheStatus, PreviewError, PreviewLoader, PreviewPanel};
