//! Render session - owns one document's worker, surface and page task

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use super::decoder::{CancelToken, DecodeError, DocumentDecoder, RenderError};
use super::request::{PageOutcome, RenderRequest, RenderResponse, RequestId, SessionEvent};
use super::state::{Command, DocumentPhase, Effect, SessionState};
use super::types::Surface;
use super::worker::render_worker;

/// Timeout for document decoding in [`RenderSession::load`]
pub const DECODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Live state of one displayed document.
///
/// The decoded document lives on a dedicated worker thread that serves page
/// requests one at a time. Requesting a page cancels whatever is in flight;
/// a superseded task always settles as [`PageOutcome::Cancelled`], even if
/// it raced to completion.
pub struct RenderSession {
    state: SessionState,
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    surface: Arc<Mutex<Surface>>,
    next_request_id: u64,
    in_flight: HashMap<RequestId, CancelToken>,
    backlog: VecDeque<SessionEvent>,
    worker: Option<JoinHandle<()>>,
}

impl RenderSession {
    /// Start decoding `bytes` in the background.
    ///
    /// Page requests may be issued right away; they run once decoding is
    /// done.
    #[must_use]
    pub fn open(decoder: Arc<dyn DocumentDecoder>, bytes: Vec<u8>) -> Self {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let surface = Arc::new(Mutex::new(Surface::new()));

        let worker_surface = Arc::clone(&surface);
        let worker = std::thread::spawn(move || {
            render_worker(decoder, bytes, request_rx, response_tx, worker_surface);
        });

        let mut session = Self {
            state: SessionState::new(),
            request_tx,
            response_rx,
            surface,
            next_request_id: 1,
            in_flight: HashMap::new(),
            backlog: VecDeque::new(),
            worker: Some(worker),
        };
        session.apply(Command::BeginLoad);
        session
    }

    /// Decode `bytes`, blocking until the document is ready or has failed
    pub fn load(decoder: Arc<dyn DocumentDecoder>, bytes: Vec<u8>) -> Result<Self, DecodeError> {
        Self::load_with_timeout(decoder, bytes, DECODE_TIMEOUT)
    }

    pub fn load_with_timeout(
        decoder: Arc<dyn DocumentDecoder>,
        bytes: Vec<u8>,
        timeout: Duration,
    ) -> Result<Self, DecodeError> {
        let mut session = Self::open(decoder, bytes);
        let deadline = Instant::now() + timeout;

        while session.state.document == DocumentPhase::Loading {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match session.response_rx.recv_timeout(remaining) {
                Ok(response) => session.handle_response(response),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(DecodeError::Timeout {
                        secs: timeout.as_secs(),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(DecodeError::engine("decoder stopped unexpectedly"));
                }
            }
        }

        match &session.state.document {
            DocumentPhase::Failed(e) => Err(e.clone()),
            _ => Ok(session),
        }
    }

    /// Get current session state
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn page_count(&self) -> Option<usize> {
        self.state.page_count()
    }

    /// Lock the drawable surface. Holding the guard stalls the worker.
    pub fn surface(&self) -> MutexGuard<'_, Surface> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the surface as it is right now
    #[must_use]
    pub fn snapshot(&self) -> Surface {
        self.surface().clone()
    }

    /// Request `page` (1-based) at `scale`, superseding any in-flight task
    pub fn request_page(&mut self, page: usize, scale: f32) -> RequestId {
        let id = self.next_id();
        self.apply(Command::RequestPage { id, page, scale });
        id
    }

    /// Drain completed work without blocking
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        while let Ok(response) = self.response_rx.try_recv() {
            self.handle_response(response);
        }
        self.backlog.drain(..).collect()
    }

    /// Block until request `id` settles or `timeout` elapses.
    ///
    /// Returns `None` on timeout. Events for other requests stay queued for
    /// [`RenderSession::poll`].
    pub fn wait_for(&mut self, id: RequestId, timeout: Duration) -> Option<PageOutcome> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(outcome) = self.take_outcome(id) {
                return Some(outcome);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => self.handle_response(response),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    if let Some(outcome) = self.take_outcome(id) {
                        return Some(outcome);
                    }
                    self.in_flight.remove(&id);
                    return Some(PageOutcome::Failed(RenderError::WorkerGone));
                }
            }
        }
    }

    /// Cancel any in-flight task, stop the worker and release the document.
    ///
    /// Blocks until the worker has exited, so nothing touches the surface
    /// afterwards. Safe to call more than once.
    pub fn teardown(&mut self) {
        self.apply(Command::Teardown);
    }

    fn take_outcome(&mut self, id: RequestId) -> Option<PageOutcome> {
        let pos = self
            .backlog
            .iter()
            .position(|event| event.request_id() == Some(id))?;
        self.backlog.remove(pos)?.page_outcome()
    }

    fn handle_response(&mut self, response: RenderResponse) {
        let cmd = match response {
            RenderResponse::DocumentInfo { page_count } => Command::Decoded { page_count },
            RenderResponse::DecodeFailed(error) => Command::DecodeFailed(error),
            RenderResponse::Page { id, page, outcome } => {
                self.in_flight.remove(&id);
                Command::PageFinished { id, page, outcome }
            }
        };
        self.apply(cmd);
    }

    fn apply(&mut self, cmd: Command) {
        let effects = self.state.apply(cmd);
        self.execute_effects(effects);
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::CancelTask(id) => {
                    if let Some(token) = self.in_flight.get(&id) {
                        debug!("Cancelling render {id:?}");
                        token.cancel();
                    }
                }

                Effect::StartTask { id, page, scale } => {
                    let cancel = CancelToken::new();
                    let request = RenderRequest::Page {
                        id,
                        page,
                        scale,
                        cancel: cancel.clone(),
                    };
                    if self.request_tx.send(request).is_ok() {
                        self.in_flight.insert(id, cancel);
                    } else {
                        warn!("Render worker gone, page {page} not rendered");
                        self.apply(Command::PageFinished {
                            id,
                            page,
                            outcome: PageOutcome::Failed(RenderError::WorkerGone),
                        });
                    }
                }

                Effect::Notify(event) => self.backlog.push_back(event),

                Effect::ReleaseDocument => self.shutdown_worker(),
            }
        }
    }

    fn shutdown_worker(&mut self) {
        for token in self.in_flight.values() {
            token.cancel();
        }
        self.in_flight.clear();

        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.request_tx.send(RenderRequest::Shutdown);
        if worker.join().is_err() {
            warn!("Render worker panicked");
        }
        while self.response_rx.try_recv().is_ok() {}
        self.backlog.clear();
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{PagePhase, Viewport};
    use crate::test_utils::test_helpers::SyntheticDecoder;

    const WAIT: Duration = Duration::from_secs(5);

    fn decoder() -> Arc<dyn DocumentDecoder> {
        Arc::new(SyntheticDecoder::default())
    }

    #[test]
    fn load_reports_page_count() {
        let session = RenderSession::load(decoder(), SyntheticDecoder::document_bytes(4)).unwrap();
        assert_eq!(session.page_count(), Some(4));
    }

    #[test]
    fn load_surfaces_decode_error() {
        let result = RenderSession::load(decoder(), b"not a document".to_vec());
        assert!(matches!(result, Err(DecodeError::Engine { .. })));

        let result = RenderSession::load(decoder(), Vec::new());
        assert_eq!(result.err(), Some(DecodeError::Empty));
    }

    #[test]
    fn request_before_decode_completes_renders() {
        let mut session = RenderSession::open(decoder(), SyntheticDecoder::document_bytes(2));
        let id = session.request_page(2, 1.0);

        let outcome = session.wait_for(id, WAIT).expect("settled");
        assert_eq!(
            outcome,
            PageOutcome::Ready(Viewport::for_page(2, SyntheticDecoder::PAGE_SIZE, 1.0))
        );
        assert_eq!(
            session.snapshot().pixel(5, 5),
            Some(SyntheticDecoder::page_color(2))
        );
    }

    #[test]
    fn poll_delivers_decoded_then_ready() {
        let mut session = RenderSession::open(decoder(), SyntheticDecoder::document_bytes(1));
        let id = session.request_page(1, 1.0);
        assert!(session.wait_for(id, WAIT).is_some());

        let events = session.poll();
        assert_eq!(events, vec![SessionEvent::Decoded { page_count: 1 }]);
    }

    #[test]
    fn out_of_range_request_fails_visibly() {
        let mut session =
            RenderSession::load(decoder(), SyntheticDecoder::document_bytes(2)).unwrap();
        let id = session.request_page(9, 1.0);
        let outcome = session.wait_for(id, WAIT).expect("settled");
        assert_eq!(
            outcome.error(),
            Some(&RenderError::PageOutOfRange {
                page: 9,
                page_count: 2,
            })
        );
    }

    #[test]
    fn absurd_scale_does_not_take_the_worker_down() {
        let mut session = RenderSession::load(decoder(), SyntheticDecoder::document_bytes(2)).unwrap();

        let huge = session.request_page(1, 1.0e9);
        let Some(PageOutcome::Ready(viewport)) = session.wait_for(huge, WAIT) else {
            panic!("clamped render should succeed");
        };
        assert_eq!(viewport.scale, crate::render::MAX_SCALE);

        let normal = session.request_page(2, 1.0);
        assert_eq!(
            session.wait_for(normal, WAIT),
            Some(PageOutcome::Ready(Viewport::for_page(
                2,
                SyntheticDecoder::PAGE_SIZE,
                1.0
            )))
        );
    }

    #[test]
    fn teardown_is_idempotent_and_stops_rendering() {
        let mut session =
            RenderSession::load(decoder(), SyntheticDecoder::document_bytes(2)).unwrap();
        session.teardown();
        session.teardown();
        assert!(matches!(session.state().page, PagePhase::Idle));

        let id = session.request_page(1, 1.0);
        assert_eq!(
            session.wait_for(id, WAIT).and_then(|o| o.error().cloned()),
            Some(RenderError::NotDecoded)
        );
    }
}
