//! Render worker - runs in a dedicated thread per session

use std::sync::{Arc, Mutex, PoisonError};

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::decoder::{CancelToken, DecodedDocument, DocumentDecoder, Rasterized, RenderError};
use super::request::{PageOutcome, RenderRequest, RenderResponse};
use super::types::{Surface, Viewport};

/// Rows copied onto the surface between cancellation checks
const BLIT_BAND_ROWS: u32 = 64;

/// Main worker function.
///
/// Decodes `bytes` once, then serves page requests strictly in order, so a
/// newer task never starts before the one it superseded has finished or
/// acknowledged its cancellation.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub(crate) fn render_worker(
    decoder: Arc<dyn DocumentDecoder>,
    bytes: Vec<u8>,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
    surface: Arc<Mutex<Surface>>,
) {
    let doc = match decoder.decode(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Document decode failed: {e}");
            let _ = responses.send(RenderResponse::DecodeFailed(e));
            return;
        }
    };

    let page_count = doc.page_count();
    debug!("Decoded document with {page_count} pages");
    let _ = responses.send(RenderResponse::DocumentInfo { page_count });

    for request in requests {
        match request {
            RenderRequest::Page {
                id,
                page,
                scale,
                cancel,
            } => {
                let outcome = render_into(doc.as_ref(), page, scale, &cancel, &surface);
                if outcome.is_cancelled() {
                    debug!("Render of page {page} ({id:?}) cancelled");
                }
                let _ = responses.send(RenderResponse::Page { id, page, outcome });
            }

            RenderRequest::Shutdown => break,
        }
    }
}

/// Render a single page onto `surface`
pub(crate) fn render_into(
    doc: &dyn DecodedDocument,
    page: usize,
    scale: f32,
    cancel: &CancelToken,
    surface: &Mutex<Surface>,
) -> PageOutcome {
    if cancel.is_cancelled() {
        return PageOutcome::Cancelled;
    }

    let page_count = doc.page_count();
    if page == 0 || page > page_count {
        return PageOutcome::Failed(RenderError::PageOutOfRange { page, page_count });
    }

    let page_size = match doc.page_size(page) {
        Ok(size) => size,
        Err(e) => return PageOutcome::Failed(e),
    };
    let viewport = Viewport::for_page(page, page_size, scale);
    if let Err(e) = viewport.check_budget() {
        warn!("Refusing to render page {page} at scale {scale}: {e}");
        return PageOutcome::Failed(e);
    }

    let raster = match doc.rasterize(page, &viewport, cancel) {
        Ok(Rasterized::Done(raster)) => raster,
        Ok(Rasterized::Cancelled) => return PageOutcome::Cancelled,
        Err(e) => return PageOutcome::Failed(e),
    };

    if cancel.is_cancelled() {
        return PageOutcome::Cancelled;
    }

    let (width, height) = viewport.pixel_size();
    let mut surface = surface.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = surface.resize(width, height) {
        return PageOutcome::Failed(e);
    }

    let mut row = 0;
    while row < height {
        if cancel.is_cancelled() {
            // Partially drawn but well-formed; the next task redraws it
            return PageOutcome::Cancelled;
        }
        let end = (row + BLIT_BAND_ROWS).min(height);
        surface.blit_rows(&raster, row..end);
        row = end;
    }

    PageOutcome::Ready(viewport)
}
