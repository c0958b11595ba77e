//! Download seam for the image cache.

use std::time::Duration;

use tracing::debug;

use crate::domain::entities::ImageContentType;
use crate::domain::ports::{CacheError, CacheResult};

/// Hard timeout on one cache fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Raw bytes downloaded for a key, with the content type the server named.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// Image bytes as served.
    pub bytes: Vec<u8>,
    /// Content type derived from the response.
    pub content_type: ImageContentType,
}

/// Source of image bytes, keyed by URL.
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Downloads one image.
    ///
    /// # Errors
    /// Returns [`CacheError::Miss`] on HTTP >= 400, transport failure, or an
    /// unusable content type.
    async fn fetch(&self, url: &str) -> CacheResult<FetchedImage>;
}

/// HTTP fetcher used in production.
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    /// Creates a fetcher with the cache fetch timeout applied.
    ///
    /// # Errors
    /// Returns [`CacheError::Io`] if the HTTP client cannot be built.
    pub fn new() -> CacheResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| CacheError::Io(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> CacheResult<FetchedImage> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CacheError::Miss(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CacheError::Miss(format!("HTTP {}", response.status())));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(ImageContentType::from_mime)
            .unwrap_or(ImageContentType::Png);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CacheError::Miss(format!("failed to read body: {e}")))?;

        debug!(url = %url, len = bytes.len(), content_type = content_type.as_str(), "Fetched image");

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
