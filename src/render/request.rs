//! Render request and response types

use super::decoder::{CancelToken, DecodeError, RenderError};
use super::types::Viewport;

/// Unique identifier for page render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Request sent to the render worker
#[derive(Debug)]
pub(crate) enum RenderRequest {
    /// Render a page onto the session surface
    Page {
        id: RequestId,
        page: usize,
        scale: f32,
        cancel: CancelToken,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Response from the render worker
#[derive(Debug)]
pub(crate) enum RenderResponse {
    /// Document decoded (sent once, first)
    DocumentInfo { page_count: usize },

    /// Document could not be decoded; the worker exits after sending this
    DecodeFailed(DecodeError),

    /// A page task finished, one way or another
    Page {
        id: RequestId,
        page: usize,
        outcome: PageOutcome,
    },
}

/// How a page task ended
#[derive(Clone, Debug, PartialEq)]
pub enum PageOutcome {
    /// Pixels are on the surface
    Ready(Viewport),
    /// Superseded by a newer request; not an error
    Cancelled,
    Failed(RenderError),
}

impl PageOutcome {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The error to report, if any. Cancellation is filtered out here.
    #[must_use]
    pub fn error(&self) -> Option<&RenderError> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Ready(_) | Self::Cancelled => None,
        }
    }
}

/// Notifications delivered by a render session
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Decoded { page_count: usize },
    DecodeFailed(DecodeError),
    PageReady { id: RequestId, viewport: Viewport },
    PageCancelled { id: RequestId, page: usize },
    PageFailed {
        id: RequestId,
        page: usize,
        error: RenderError,
    },
}

impl SessionEvent {
    /// Request this event settles, if it concerns a page task
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::PageReady { id, .. }
            | Self::PageCancelled { id, .. }
            | Self::PageFailed { id, .. } => Some(*id),
            Self::Decoded { .. } | Self::DecodeFailed(_) => None,
        }
    }

    /// Outcome of the page task this event settles
    #[must_use]
    pub fn page_outcome(&self) -> Option<PageOutcome> {
        match self {
            Self::PageReady { viewport, .. } => Some(PageOutcome::Ready(*viewport)),
            Self::PageCancelled { .. } => Some(PageOutcome::Cancelled),
            Self::PageFailed { error, .. } => Some(PageOutcome::Failed(error.clone())),
            Self::Decoded { .. } | Self::DecodeFailed(_) => None,
        }
    }
}
