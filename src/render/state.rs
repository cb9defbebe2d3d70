//! Render session state management

use super::decoder::{DecodeError, RenderError};
use super::request::{PageOutcome, RequestId, SessionEvent};
use super::types::{Viewport, sanitize_scale};

/// Lifecycle of the session's document
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentPhase {
    Idle,
    Loading,
    Decoded { page_count: usize },
    Failed(DecodeError),
}

/// Lifecycle of the most recent page task
#[derive(Clone, Debug, PartialEq)]
pub enum PagePhase {
    Idle,
    Rendering { id: RequestId, page: usize },
    Ready { id: RequestId, viewport: Viewport },
    Cancelled { id: RequestId, page: usize },
    Failed {
        id: RequestId,
        page: usize,
        error: RenderError,
    },
}

/// Current state of one render session
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub document: DocumentPhase,
    pub page: PagePhase,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            document: DocumentPhase::Idle,
            page: PagePhase::Idle,
        }
    }

    /// Id of the page task currently allowed to touch the surface
    #[must_use]
    pub fn active_request(&self) -> Option<RequestId> {
        match self.page {
            PagePhase::Rendering { id, .. } => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn page_count(&self) -> Option<usize> {
        match self.document {
            DocumentPhase::Decoded { page_count } => Some(page_count),
            _ => None,
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::BeginLoad => {
                if self.document == DocumentPhase::Idle {
                    self.document = DocumentPhase::Loading;
                }
                vec![]
            }

            Command::Decoded { page_count } => {
                if self.document != DocumentPhase::Loading {
                    return vec![];
                }
                self.document = DocumentPhase::Decoded { page_count };
                vec![Effect::Notify(SessionEvent::Decoded { page_count })]
            }

            Command::DecodeFailed(error) => {
                if self.document != DocumentPhase::Loading {
                    return vec![];
                }
                self.document = DocumentPhase::Failed(error.clone());

                let mut effects = vec![Effect::Notify(SessionEvent::DecodeFailed(error))];
                if let PagePhase::Rendering { id, page } = self.page {
                    effects.push(self.fail(id, page, RenderError::NotDecoded));
                }
                effects
            }

            Command::RequestPage { id, page, scale } => self.request_page(id, page, scale),

            Command::PageFinished { id, page, outcome } => {
                if self.active_request() != Some(id) {
                    // A newer request superseded this one; whatever it
                    // produced must not be reported as the current page.
                    return vec![Effect::Notify(SessionEvent::PageCancelled { id, page })];
                }

                match outcome {
                    PageOutcome::Ready(viewport) => {
                        self.page = PagePhase::Ready { id, viewport };
                        vec![Effect::Notify(SessionEvent::PageReady { id, viewport })]
                    }
                    PageOutcome::Cancelled => {
                        self.page = PagePhase::Cancelled { id, page };
                        vec![Effect::Notify(SessionEvent::PageCancelled { id, page })]
                    }
                    PageOutcome::Failed(error) => vec![self.fail(id, page, error)],
                }
            }

            Command::Teardown => {
                let mut effects = vec![];
                if let Some(id) = self.active_request() {
                    effects.push(Effect::CancelTask(id));
                }
                self.document = DocumentPhase::Idle;
                self.page = PagePhase::Idle;
                effects.push(Effect::ReleaseDocument);
                effects
            }
        }
    }

    fn request_page(&mut self, id: RequestId, page: usize, scale: f32) -> Vec<Effect> {
        match self.document {
            DocumentPhase::Idle | DocumentPhase::Failed(_) => {
                return vec![self.fail(id, page, RenderError::NotDecoded)];
            }
            DocumentPhase::Decoded { page_count } if page == 0 || page > page_count => {
                let mut effects = self.supersede();
                effects.push(self.fail(id, page, RenderError::PageOutOfRange { page, page_count }));
                return effects;
            }
            // While loading, the worker queues the task behind the decode
            DocumentPhase::Loading | DocumentPhase::Decoded { .. } => {}
        }

        let mut effects = self.supersede();
        self.page = PagePhase::Rendering { id, page };
        effects.push(Effect::StartTask {
            id,
            page,
            scale: sanitize_scale(scale),
        });
        effects
    }

    /// Cancel whatever is in flight. Its completion is reported later as a
    /// cancellation when the worker acknowledges it.
    fn supersede(&mut self) -> Vec<Effect> {
        match self.active_request() {
            Some(prev) => vec![Effect::CancelTask(prev)],
            None => vec![],
        }
    }

    fn fail(&mut self, id: RequestId, page: usize, error: RenderError) -> Effect {
        self.page = PagePhase::Failed {
            id,
            page,
            error: error.clone(),
        };
        Effect::Notify(SessionEvent::PageFailed { id, page, error })
    }
}

/// Commands that modify session state
#[derive(Clone, Debug)]
pub enum Command {
    /// Bytes handed to the worker for decoding
    BeginLoad,
    /// Worker decoded the document
    Decoded { page_count: usize },
    /// Worker could not decode the document
    DecodeFailed(DecodeError),
    /// Caller wants `page` at `scale`
    RequestPage {
        id: RequestId,
        page: usize,
        scale: f32,
    },
    /// Worker finished a page task
    PageFinished {
        id: RequestId,
        page: usize,
        outcome: PageOutcome,
    },
    /// Hosting view closed or document changed
    Teardown,
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Signal cancellation to an in-flight task
    CancelTask(RequestId),
    /// Queue a page task on the worker
    StartTask {
        id: RequestId,
        page: usize,
        scale: f32,
    },
    /// Deliver an event to the caller
    Notify(SessionEvent),
    /// Stop the worker and drop the decoded document
    ReleaseDocument,
}
