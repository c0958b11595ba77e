//! Port definition for image resolution.

use crate::domain::entities::{ImageKey, ResolvedImage};

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while resolving an image key.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The image could not be fetched; the key stays unresolved.
    #[error("image could not be resolved: {0}")]
    Miss(String),
    /// Local filesystem failure while writing or reading the cache.
    #[error("cache io error: {0}")]
    Io(String),
}

/// Port for resolving an [`ImageKey`] to local file bytes.
///
/// Implementations must coalesce concurrent resolves of the same key onto a
/// single fetch.
#[async_trait::async_trait]
pub trait ImageResolverPort: Send + Sync {
    /// Resolves a key to a ready cache entry, fetching it if necessary.
    ///
    /// # Errors
    /// Returns [`CacheError::Miss`] when the image cannot be fetched and
    /// [`CacheError::Io`] on local filesystem failure.
    async fn resolve(&self, key: &ImageKey) -> CacheResult<ResolvedImage>;
}
