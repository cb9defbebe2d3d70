//! End-to-end document preview: cache, fetch, decode, render, overlay

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};

use crate::cache::{BinaryCache, DocumentIdentity, download_metadata};
use crate::fetch::{FetchError, RemoteFetcher};
use crate::overlay::{
    AnnotationMarker, PositionedMarker, SCROLL_OFFSET_PX, ScrollContainer, apply_highlight,
    paint_markers, project_markers, scroll_to_highlighted,
};
use crate::render::{
    DecodeError, DocumentDecoder, PageOutcome, RenderError, RenderSession, RequestId,
    SessionEvent, Surface, Viewport,
};

/// Where the bytes of a load came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Cached,
    Downloaded,
}

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl PreviewError {
    /// Message suitable for showing in place of the page
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Fetch(FetchError::Http { status, .. }) if *status >= 500 => {
                format!("Document server error ({status}). The file may be unavailable.")
            }
            Self::Fetch(FetchError::Http { status, reason }) => {
                format!("Failed to load document: {status} {reason}")
            }
            Self::Fetch(FetchError::NoSource) => "No document available".to_string(),
            Self::Fetch(_) => "Failed to load document.".to_string(),
            Self::Decode(_) | Self::Render(_) => "Failed to load preview".to_string(),
        }
    }
}

/// Loads document bytes through the cache and opens preview panels
pub struct PreviewLoader {
    cache: BinaryCache,
    fetcher: Arc<dyn RemoteFetcher>,
    decoder: Arc<dyn DocumentDecoder>,
    scroll_offset: f32,
}

impl PreviewLoader {
    pub fn new(
        cache: BinaryCache,
        fetcher: Arc<dyn RemoteFetcher>,
        decoder: Arc<dyn DocumentDecoder>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            decoder,
            scroll_offset: SCROLL_OFFSET_PX,
        }
    }

    #[must_use]
    pub fn with_scroll_offset(mut self, offset: f32) -> Self {
        self.scroll_offset = offset;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &BinaryCache {
        &self.cache
    }

    /// Bytes for `doc`, from the cache or downloaded and cached.
    ///
    /// A failed fetch leaves nothing in the cache.
    pub fn load_bytes(
        &self,
        doc: &DocumentIdentity,
    ) -> Result<(Vec<u8>, CacheStatus), PreviewError> {
        let key = doc.cache_key();
        if let Some(bytes) = self.cache.get(&key) {
            return Ok((bytes, CacheStatus::Cached));
        }

        if doc.url.is_empty() {
            return Err(FetchError::NoSource.into());
        }
        let bytes = self.fetcher.fetch(&doc.url)?;
        info!("Downloaded {} ({} bytes)", doc.name, bytes.len());
        self.cache
            .put(key, &bytes, download_metadata(doc, Utc::now()));
        Ok((bytes, CacheStatus::Downloaded))
    }

    /// Load and decode `doc`, ready for page requests
    pub fn open_panel(
        &self,
        doc: &DocumentIdentity,
        markers: Vec<AnnotationMarker>,
        highlight: Option<String>,
    ) -> Result<PreviewPanel, PreviewError> {
        let (bytes, status) = self.load_bytes(doc)?;
        let session = RenderSession::load(Arc::clone(&self.decoder), bytes)?;

        let mut panel = PreviewPanel {
            session,
            markers,
            highlight: None,
            scroll_offset: self.scroll_offset,
            status,
            current: None,
        };
        panel.set_highlight(highlight);
        Ok(panel)
    }
}

/// A page that made it onto the surface
#[derive(Debug, Clone, PartialEq)]
pub struct ShownPage {
    pub viewport: Viewport,
    pub markers: Vec<PositionedMarker>,
    /// Whether the container was scrolled to the highlighted marker
    pub scrolled: bool,
}

/// What a [`PreviewPanel::pump`] produced. Superseded pages never show up.
#[derive(Debug)]
pub enum PanelUpdate {
    Shown(ShownPage),
    Failed(PreviewError),
}

/// One open document preview with its annotations
pub struct PreviewPanel {
    session: RenderSession,
    markers: Vec<AnnotationMarker>,
    highlight: Option<String>,
    scroll_offset: f32,
    status: CacheStatus,
    current: Option<Viewport>,
}

impl PreviewPanel {
    #[must_use]
    pub fn cache_status(&self) -> CacheStatus {
        self.status
    }

    #[must_use]
    pub fn page_count(&self) -> Option<usize> {
        self.session.page_count()
    }

    #[must_use]
    pub fn markers(&self) -> &[AnnotationMarker] {
        &self.markers
    }

    /// Viewport of the page currently on the surface
    #[must_use]
    pub fn current_viewport(&self) -> Option<Viewport> {
        self.current
    }

    pub fn set_highlight(&mut self, highlight: Option<String>) {
        apply_highlight(&mut self.markers, highlight.as_deref());
        self.highlight = highlight;
    }

    pub fn request_page(&mut self, page: usize, scale: f32) -> RequestId {
        self.session.request_page(page, scale)
    }

    /// Handle everything the renderer finished since the last call
    pub fn pump(&mut self, container: &mut dyn ScrollContainer) -> Vec<PanelUpdate> {
        let mut updates = Vec::new();
        for event in self.session.poll() {
            match event {
                SessionEvent::PageReady { viewport, .. } => {
                    updates.push(PanelUpdate::Shown(self.show(viewport, container)));
                }
                SessionEvent::PageFailed { error, .. } => {
                    updates.push(PanelUpdate::Failed(error.into()));
                }
                SessionEvent::DecodeFailed(error) => {
                    updates.push(PanelUpdate::Failed(error.into()));
                }
                SessionEvent::PageCancelled { id, page } => {
                    debug!("Page {page} ({id:?}) superseded");
                }
                SessionEvent::Decoded { .. } => {}
            }
        }
        updates
    }

    /// Block until request `id` settles.
    ///
    /// `Ok(None)` means a newer request superseded it.
    pub fn wait_for(
        &mut self,
        id: RequestId,
        timeout: Duration,
        container: &mut dyn ScrollContainer,
    ) -> Result<Option<ShownPage>, PreviewError> {
        match self.session.wait_for(id, timeout) {
            Some(PageOutcome::Ready(viewport)) => Ok(Some(self.show(viewport, container))),
            Some(PageOutcome::Cancelled) => Ok(None),
            Some(PageOutcome::Failed(error)) => Err(error.into()),
            None => Err(RenderError::Timeout {
                secs: timeout.as_secs(),
            }
            .into()),
        }
    }

    /// Copy of the rendered page with the overlay painted on.
    ///
    /// Markers are only painted while the surface still has the geometry of
    /// the shown page; a newer render may already have resized it.
    #[must_use]
    pub fn render_snapshot(&self) -> Surface {
        let mut surface = self.session.snapshot();
        if let Some(viewport) = &self.current {
            if (surface.width(), surface.height()) == viewport.pixel_size() {
                paint_markers(&mut surface, &project_markers(&self.markers, viewport));
            } else {
                debug!(
                    "Surface changed since page {} was shown, skipping overlay",
                    viewport.page
                );
            }
        }
        surface
    }

    /// Release the document and stop rendering
    pub fn close(&mut self) {
        self.current = None;
        self.session.teardown();
    }

    fn show(&mut self, viewport: Viewport, container: &mut dyn ScrollContainer) -> ShownPage {
        self.current = Some(viewport);
        let scrolled = self.highlight.as_deref().is_some_and(|id| {
            scroll_to_highlighted(id, &self.markers, &viewport, container, self.scroll_offset)
        });
        ShownPage {
            viewport,
            markers: project_markers(&self.markers, &viewport),
            scrolled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::overlay::ScrollBehavior;
    use crate::test_utils::test_helpers::{
        MemoryStore, RecordingScroll, StaticFetcher, SyntheticDecoder,
    };

    const WAIT: Duration = Duration::from_secs(5);

    fn identity() -> DocumentIdentity {
        DocumentIdentity::new("case/7.report", "report.pdf", "https://files.example/7")
    }

    fn loader(fetcher: Arc<StaticFetcher>) -> PreviewLoader {
        let cache = BinaryCache::new(Arc::new(MemoryStore::default()), CacheConfig::default());
        PreviewLoader::new(cache, fetcher, Arc::new(SyntheticDecoder::default()))
    }

    #[test]
    fn second_load_is_served_from_cache() {
        let fetcher = Arc::new(StaticFetcher::ok(SyntheticDecoder::document_bytes(3)));
        let loader = loader(Arc::clone(&fetcher));

        let (first, status) = loader.load_bytes(&identity()).unwrap();
        assert_eq!(status, CacheStatus::Downloaded);
        let (second, status) = loader.load_bytes(&identity()).unwrap();
        assert_eq!(status, CacheStatus::Cached);
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn failed_fetch_caches_nothing() {
        let fetcher = Arc::new(StaticFetcher::http_error(404, "Not Found"));
        let loader = loader(Arc::clone(&fetcher));

        let err = loader.load_bytes(&identity()).unwrap_err();
        assert_eq!(err.user_message(), "Failed to load document: 404 Not Found");
        loader.cache().flush();
        assert!(loader.cache().get(&identity().cache_key()).is_none());
    }

    #[test]
    fn user_messages_follow_failure_kind() {
        let server = PreviewError::from(FetchError::Http {
            status: 502,
            reason: "Bad Gateway".to_string(),
        });
        assert_eq!(
            server.user_message(),
            "Document server error (502). The file may be unavailable."
        );
        let decode = PreviewError::from(DecodeError::NoPages);
        assert_eq!(decode.user_message(), "Failed to load preview");
        let missing = PreviewError::from(FetchError::NoSource);
        assert_eq!(missing.user_message(), "No document available");
    }

    #[test]
    fn shown_page_scrolls_to_highlight() {
        let fetcher = Arc::new(StaticFetcher::ok(SyntheticDecoder::document_bytes(2)));
        let markers = vec![
            AnnotationMarker::new("m1", 1, 50.0, 50.0),
            AnnotationMarker::new("m2", 2, 50.0, 80.0).with_category("Review"),
        ];
        let mut panel = loader(fetcher)
            .open_panel(&identity(), markers, Some("m2".to_string()))
            .unwrap();
        let mut scroll = RecordingScroll::default();

        let id = panel.request_page(1, 1.0);
        let shown = panel.wait_for(id, WAIT, &mut scroll).unwrap().unwrap();
        assert!(!shown.scrolled);
        assert_eq!(shown.markers.len(), 1);
        assert!(scroll.calls.is_empty());

        let id = panel.request_page(2, 1.0);
        let shown = panel.wait_for(id, WAIT, &mut scroll).unwrap().unwrap();
        assert!(shown.scrolled);
        assert!(shown.markers[0].highlighted);
        // 80% of a 50px page sits above the offset
        assert_eq!(scroll.calls, vec![(0.0, ScrollBehavior::Smooth)]);
    }

    #[test]
    fn snapshot_carries_overlay() {
        let fetcher = Arc::new(StaticFetcher::ok(SyntheticDecoder::document_bytes(1)));
        let markers = vec![AnnotationMarker::new("m1", 1, 50.0, 50.0).with_category("Medical")];
        let mut panel = loader(fetcher)
            .open_panel(&identity(), markers, None)
            .unwrap();
        let mut scroll = RecordingScroll::default();

        let id = panel.request_page(1, 1.0);
        panel.wait_for(id, WAIT, &mut scroll).unwrap();
        let surface = panel.render_snapshot();
        assert_eq!(surface.pixel(50, 25), Some([239, 68, 68]));
    }

    #[test]
    fn snapshot_skips_overlay_once_surface_moves_on() {
        let fetcher = Arc::new(StaticFetcher::ok(SyntheticDecoder::document_bytes(2)));
        let markers = vec![AnnotationMarker::new("m1", 1, 50.0, 50.0).with_category("Medical")];
        let mut panel = loader(fetcher)
            .open_panel(&identity(), markers, None)
            .unwrap();
        let mut scroll = RecordingScroll::default();

        let id = panel.request_page(1, 1.0);
        panel.wait_for(id, WAIT, &mut scroll).unwrap();

        // page 2 lands on the surface but has not been shown yet
        panel.request_page(2, 2.0);
        let deadline = std::time::Instant::now() + WAIT;
        let drawn = Some(SyntheticDecoder::page_color(2));
        while panel.session.snapshot().pixel(199, 99) != drawn {
            assert!(std::time::Instant::now() < deadline, "page 2 never rendered");
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(panel.current_viewport().map(|v| v.page), Some(1));
        assert_eq!(panel.render_snapshot(), panel.session.snapshot());
    }

    #[test]
    fn closed_panel_reports_not_decoded() {
        let fetcher = Arc::new(StaticFetcher::ok(SyntheticDecoder::document_bytes(1)));
        let mut panel = loader(fetcher)
            .open_panel(&identity(), Vec::new(), None)
            .unwrap();
        panel.close();
        assert_eq!(panel.current_viewport(), None);

        let id = panel.request_page(1, 1.0);
        let err = panel
            .wait_for(id, WAIT, &mut RecordingScroll::default())
            .unwrap_err();
        assert!(matches!(err, PreviewError::Render(RenderError::NotDecoded)));
    }
}
