//! Retrieval of document bytes from their source location

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
#[cfg(feature = "http")]
use std::time::Duration;

use log::debug;

/// Timeout for a single HTTP download
#[cfg(feature = "http")]
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no document available")]
    NoSource,

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("failed to read document: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP {status} {reason}")]
    Http { status: u16, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unsupported source: {0}")]
    Unsupported(String),
}

impl FetchError {
    /// HTTP status of a server response, if the server answered
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Fetches the raw bytes behind a source location
pub trait RemoteFetcher: Send + Sync {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, FetchError>;
}

/// Reads local paths and `file://` URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl FileFetcher {
    fn resolve(source: &str) -> PathBuf {
        Path::new(source.strip_prefix("file://").unwrap_or(source)).to_path_buf()
    }
}

impl RemoteFetcher for FileFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, FetchError> {
        if source.is_empty() {
            return Err(FetchError::NoSource);
        }
        let path = Self::resolve(source);
        debug!("Reading document from {}", path.display());
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(path.display().to_string()),
            _ => FetchError::Io(e),
        })
    }
}

/// Downloads `http://` and `https://` sources with a blocking client
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl RemoteFetcher for HttpFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, FetchError> {
        debug!("Downloading document from {source}");
        let response = self
            .client
            .get(source)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let bytes = response
            .bytes()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Routes each source to the file or HTTP fetcher. The HTTP client is built
/// once and shared by every download.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    #[cfg(feature = "http")]
    http: HttpFetcher,
}

impl SourceFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            #[cfg(feature = "http")]
            http: HttpFetcher::new()?,
        })
    }

    /// Pick the fetcher able to handle `source`
    pub fn fetcher_for(&self, source: &str) -> Result<&dyn RemoteFetcher, FetchError> {
        if source.is_empty() {
            return Err(FetchError::NoSource);
        }
        if is_http(source) {
            return self.http_fetcher(source);
        }
        Ok(&FileFetcher)
    }

    #[cfg(feature = "http")]
    fn http_fetcher(&self, _source: &str) -> Result<&dyn RemoteFetcher, FetchError> {
        Ok(&self.http)
    }

    #[cfg(not(feature = "http"))]
    fn http_fetcher(&self, source: &str) -> Result<&dyn RemoteFetcher, FetchError> {
        Err(FetchError::Unsupported(source.to_string()))
    }
}

impl RemoteFetcher for SourceFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, FetchError> {
        self.fetcher_for(source)?.fetch(source)
    }
}

fn is_http(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
