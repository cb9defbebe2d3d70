pub mod test_helpers {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::thread;
    use std::time::{Duration, Instant};

    use flume::Sender;

    use crate::cache::{
        CacheKey, CachedObject, DurableError, DurableStore, EntrySummary, sort_oldest_first,
    };
    use crate::fetch::{FetchError, RemoteFetcher};
    use crate::overlay::{ScrollBehavior, ScrollContainer};
    use crate::render::{
        CancelToken, DecodeError, DecodedDocument, DocumentDecoder, Raster, Rasterized,
        RenderError, Viewport,
    };

    /// In-memory durable store that counts reads
    #[derive(Default)]
    pub struct MemoryStore {
        entries: Mutex<HashMap<CacheKey, CachedObject>>,
        reads: AtomicUsize,
    }

    impl MemoryStore {
        /// Number of `get` calls so far
        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        pub fn contains(&self, key: &CacheKey) -> bool {
            self.lock().contains_key(key)
        }

        pub fn len(&self) -> usize {
            self.lock().len()
        }

        pub fn is_empty(&self) -> bool {
            self.lock().is_empty()
        }

        pub fn total_bytes(&self) -> u64 {
            self.lock().values().map(|o| o.size).sum()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, CachedObject>> {
            self.entries.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl DurableStore for MemoryStore {
        fn get(&self, key: &CacheKey) -> Result<Option<CachedObject>, DurableError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.lock().get(key).cloned())
        }

        fn put(&self, object: &CachedObject) -> Result<(), DurableError> {
            self.lock().insert(object.key.clone(), object.clone());
            Ok(())
        }

        fn delete(&self, key: &CacheKey) -> Result<(), DurableError> {
            self.lock().remove(key);
            Ok(())
        }

        fn entries_by_timestamp(&self) -> Result<Vec<EntrySummary>, DurableError> {
            let mut entries: Vec<_> = self.lock().values().map(CachedObject::summary).collect();
            sort_oldest_first(&mut entries);
            Ok(entries)
        }

        fn clear(&self) -> Result<(), DurableError> {
            self.lock().clear();
            Ok(())
        }
    }

    /// Durable store whose every operation fails, like a disabled backend
    pub struct FailingStore;

    impl FailingStore {
        fn fail<T>() -> Result<T, DurableError> {
            Err(DurableError::Unavailable {
                detail: "store disabled".to_string(),
            })
        }
    }

    impl DurableStore for FailingStore {
        fn get(&self, _key: &CacheKey) -> Result<Option<CachedObject>, DurableError> {
            Self::fail()
        }

        fn put(&self, _object: &CachedObject) -> Result<(), DurableError> {
            Self::fail()
        }

        fn delete(&self, _key: &CacheKey) -> Result<(), DurableError> {
            Self::fail()
        }

        fn entries_by_timestamp(&self) -> Result<Vec<EntrySummary>, DurableError> {
            Self::fail()
        }

        fn clear(&self) -> Result<(), DurableError> {
            Self::fail()
        }
    }

    const SYNTHETIC_MAGIC: &str = "SYNTH:";
    const POLL_STEP: Duration = Duration::from_millis(2);

    /// Decoder for fake documents whose pages are solid colours.
    ///
    /// Bytes look like `SYNTH:<page count>`. Rasterization can be slowed down
    /// and reports each page it starts on the start signal, so tests can
    /// supersede a task while it is provably in flight.
    #[derive(Clone, Default)]
    pub struct SyntheticDecoder {
        slow_page: Option<(usize, Duration)>,
        start_signal: Option<Sender<usize>>,
    }

    impl SyntheticDecoder {
        /// Unscaled size of every page, in points
        pub const PAGE_SIZE: (f32, f32) = (100.0, 50.0);

        /// Make rasterizing `page` take `delay` unless cancelled
        pub fn with_slow_page(mut self, page: usize, delay: Duration) -> Self {
            self.slow_page = Some((page, delay));
            self
        }

        pub fn with_start_signal(mut self, signal: Sender<usize>) -> Self {
            self.start_signal = Some(signal);
            self
        }

        pub fn document_bytes(pages: usize) -> Vec<u8> {
            format!("{SYNTHETIC_MAGIC}{pages}").into_bytes()
        }

        /// Fill colour of `page`
        pub fn page_color(page: usize) -> [u8; 3] {
            [(page * 37 % 200) as u8, 90, 160]
        }
    }

    impl DocumentDecoder for SyntheticDecoder {
        fn decode(&self, bytes: Vec<u8>) -> Result<Box<dyn DecodedDocument>, DecodeError> {
            if bytes.is_empty() {
                return Err(DecodeError::Empty);
            }
            let text = String::from_utf8(bytes).map_err(|_| DecodeError::engine("not text"))?;
            let page_count: usize = text
                .strip_prefix(SYNTHETIC_MAGIC)
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| DecodeError::engine("unrecognized document"))?;
            if page_count == 0 {
                return Err(DecodeError::NoPages);
            }
            Ok(Box::new(SyntheticDocument {
                page_count,
                slow_page: self.slow_page,
                start_signal: self.start_signal.clone(),
            }))
        }
    }

    struct SyntheticDocument {
        page_count: usize,
        slow_page: Option<(usize, Duration)>,
        start_signal: Option<Sender<usize>>,
    }

    impl DecodedDocument for SyntheticDocument {
        fn page_count(&self) -> usize {
            self.page_count
        }

        fn page_size(&self, page: usize) -> Result<(f32, f32), RenderError> {
            if page == 0 || page > self.page_count {
                return Err(RenderError::PageOutOfRange {
                    page,
                    page_count: self.page_count,
                });
            }
            Ok(SyntheticDecoder::PAGE_SIZE)
        }

        fn rasterize(
            &self,
            page: usize,
            viewport: &Viewport,
            cancel: &CancelToken,
        ) -> Result<Rasterized, RenderError> {
            if let Some(signal) = &self.start_signal {
                let _ = signal.send(page);
            }

            let delay = match self.slow_page {
                Some((slow, delay)) if slow == page => delay,
                _ => Duration::ZERO,
            };
            let deadline = Instant::now() + delay;
            while Instant::now() < deadline {
                if cancel.is_cancelled() {
                    return Ok(Rasterized::Cancelled);
                }
                thread::sleep(POLL_STEP);
            }

            let (width, height) = viewport.pixel_size();
            let pixels = SyntheticDecoder::page_color(page)
                .repeat(width as usize * height as usize);
            Ok(Rasterized::Done(Raster {
                pixels,
                width,
                height,
            }))
        }
    }

    /// Scroll container that records every request
    #[derive(Debug, Default)]
    pub struct RecordingScroll {
        pub calls: Vec<(f32, ScrollBehavior)>,
    }

    impl ScrollContainer for RecordingScroll {
        fn scroll_to(&mut self, top: f32, behavior: ScrollBehavior) {
            self.calls.push((top, behavior));
        }
    }

    /// Fetcher with a canned answer that counts calls
    pub struct StaticFetcher {
        answer: Result<Vec<u8>, (u16, String)>,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        pub fn ok(bytes: Vec<u8>) -> Self {
            Self {
                answer: Ok(bytes),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn http_error(status: u16, reason: &str) -> Self {
            Self {
                answer: Err((status, reason.to_string())),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RemoteFetcher for StaticFetcher {
        fn fetch(&self, _source: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Ok(bytes) => Ok(bytes.clone()),
                Err((status, reason)) => Err(FetchError::Http {
                    status: *status,
                    reason: reason.clone(),
                }),
            }
        }
    }
}
