//! Decoder seam between the render pipeline and a document engine

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::types::{Raster, Viewport};

/// Cooperative cancellation flag shared between a session and its worker
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The bytes could not be turned into a document. Terminal for a session.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("document is empty")]
    Empty,

    #[error("document has no pages")]
    NoPages,

    #[error("decoding timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("decoder: {detail}")]
    Engine { detail: String },
}

impl DecodeError {
    pub fn engine(detail: impl Into<String>) -> Self {
        Self::Engine {
            detail: detail.into(),
        }
    }
}

/// A page could not be rendered. Supersession is not an error and never
/// shows up here.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("document is not decoded")]
    NotDecoded,

    #[error("page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("render engine: {detail}")]
    Engine { detail: String },

    #[error("page surface of {width}x{height} pixels is too large")]
    SurfaceTooLarge { width: u32, height: u32 },

    #[error("render timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("render worker stopped")]
    WorkerGone,
}

impl RenderError {
    pub fn engine(detail: impl Into<String>) -> Self {
        Self::Engine {
            detail: detail.into(),
        }
    }
}

/// Result of a rasterization attempt
#[derive(Debug)]
pub enum Rasterized {
    Done(Raster),
    Cancelled,
}

/// A decoded, page-addressable document. Lives on its render worker thread.
pub trait DecodedDocument {
    fn page_count(&self) -> usize;

    /// Unscaled page size in points. `page` is 1-based.
    fn page_size(&self, page: usize) -> Result<(f32, f32), RenderError>;

    /// Rasterize `page` at `viewport.scale`, checking `cancel` at safe points
    fn rasterize(
        &self,
        page: usize,
        viewport: &Viewport,
        cancel: &CancelToken,
    ) -> Result<Rasterized, RenderError>;
}

/// Turns raw bytes into a [`DecodedDocument`].
///
/// Takes the bytes by value: a caller that needs them afterwards must keep
/// its own copy.
pub trait DocumentDecoder: Send + Sync {
    fn decode(&self, bytes: Vec<u8>) -> Result<Box<dyn DecodedDocument>, DecodeError>;
}
