//! On-disk image cache with coalesced fetches.
//!
//! Maps an [`ImageKey`] fingerprint to a file under the cache directory.
//! Concurrent resolves of the same key share a single in-flight fetch
//! through a per-key completion handle; at any moment at most one fetch per
//! key is running.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, trace, warn};

use crate::domain::entities::{ImageContentType, ImageKey, ResolvedImage};
use crate::domain::ports::{CacheError, CacheResult, ImageResolverPort};

use super::cdn;
use super::fetch::ImageFetcher;

/// Cache directory name under the OS temp path.
///
/// Shared with the legacy controller so both tools reuse each other's
/// downloads.
pub const CACHE_DIR_NAME: &str = "python_matrix_reloaded_cache";

/// Returns the default cache directory.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join(CACHE_DIR_NAME)
}

type FetchResult = Option<CacheResult<ResolvedImage>>;

enum Slot {
    Ready(ResolvedImage),
    Fetching(watch::Receiver<FetchResult>),
}

/// Image cache keyed by fingerprint.
pub struct ImageCache {
    cache_dir: PathBuf,
    fetcher: Arc<dyn ImageFetcher>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ImageCache {
    /// Opens the cache, creating the directory if needed.
    ///
    /// # Errors
    /// Returns [`CacheError::Io`] when the cache directory cannot be
    /// created; the caller treats this as fatal.
    pub async fn open(cache_dir: PathBuf, fetcher: Arc<dyn ImageFetcher>) -> CacheResult<Self> {
        tokio::fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| CacheError::Io(format!("failed to create cache dir: {e}")))?;

        Ok(Self {
            cache_dir,
            fetcher,
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Resolves a key, fetching on miss.
    ///
    /// Concurrent callers for the same key await the one in-flight fetch.
    ///
    /// # Errors
    /// [`CacheError::Miss`] when the image cannot be fetched;
    /// [`CacheError::Io`] on filesystem failure.
    pub async fn resolve(&self, key: &ImageKey) -> CacheResult<ResolvedImage> {
        let fingerprint = key.fingerprint();

        loop {
            let mut slots = self.slots.lock().await;
            let waiter = match slots.get(&fingerprint) {
                Some(Slot::Ready(image)) => {
                    trace!(key = %fingerprint, "Cache hit");
                    return Ok(image.clone());
                }
                Some(Slot::Fetching(rx)) => Some(rx.clone()),
                None => None,
            };

            let Some(mut rx) = waiter else {
                // This caller owns the fetch.
                let (tx, rx) = watch::channel(None);
                slots.insert(fingerprint.clone(), Slot::Fetching(rx));
                drop(slots);

                let result = self.fetch_and_store(key, &fingerprint).await;

                let mut slots = self.slots.lock().await;
                match &result {
                    Ok(image) => {
                        slots.insert(fingerprint.clone(), Slot::Ready(image.clone()));
                    }
                    Err(_) => {
                        slots.remove(&fingerprint);
                    }
                }
                drop(slots);

                let _ = tx.send(Some(result.clone()));
                return result;
            };

            drop(slots);
            loop {
                if let Some(result) = rx.borrow_and_update().clone() {
                    return result;
                }
                if rx.changed().await.is_err() {
                    // The fetching caller was cancelled before completing.
                    // Drop its stale slot and retry.
                    let mut slots = self.slots.lock().await;
                    if matches!(slots.get(&fingerprint), Some(Slot::Fetching(_))) {
                        slots.remove(&fingerprint);
                    }
                    break;
                }
            }
        }
    }

    /// Deletes the cache directory and all in-memory state.
    ///
    /// Must not run concurrently with resolves; only used during cold
    /// startup under `--purge`.
    ///
    /// # Errors
    /// Returns [`CacheError::Io`] when the directory cannot be removed.
    pub async fn purge_all(&self) -> CacheResult<()> {
        self.slots.lock().await.clear();

        match tokio::fs::remove_dir_all(&self.cache_dir).await {
            Ok(()) => {
                debug!(dir = %self.cache_dir.display(), "Purged cache directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(format!("failed to purge cache dir: {e}"))),
        }
    }

    /// Returns the number of entries known in memory.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Returns true when no entries are known in memory.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn entry_path(&self, fingerprint: &str, content_type: ImageContentType) -> PathBuf {
        self.cache_dir
            .join(format!("{fingerprint}.{}", content_type.extension()))
    }

    /// Looks for a file left by a previous run before going to the network.
    async fn probe_disk(&self, fingerprint: &str) -> Option<ResolvedImage> {
        for content_type in [ImageContentType::Png, ImageContentType::Gif] {
            let path = self.entry_path(fingerprint, content_type);
            if let Ok(meta) = tokio::fs::metadata(&path).await
                && meta.is_file()
            {
                trace!(key = %fingerprint, path = %path.display(), "Disk cache hit");
                return Some(ResolvedImage {
                    path,
                    bytes_len: meta.len(),
                    content_type,
                });
            }
        }
        None
    }

    async fn fetch_and_store(&self, key: &ImageKey, fingerprint: &str) -> CacheResult<ResolvedImage> {
        if let Some(image) = self.probe_disk(fingerprint).await {
            return Ok(image);
        }

        let url = cdn::image_url(key);
        debug!(key = %fingerprint, url = %url, "Downloading image");

        let fetched = self.fetcher.fetch(&url).await.inspect_err(|e| {
            warn!(key = %fingerprint, error = %e, "Image fetch failed");
        })?;

        let path = self.entry_path(fingerprint, fetched.content_type);
        let bytes_len = fetched.bytes.len() as u64;

        write_atomic(&self.cache_dir, &path, fetched.bytes).await?;

        debug!(key = %fingerprint, path = %path.display(), len = bytes_len, "Stored image in cache");

        Ok(ResolvedImage {
            path,
            bytes_len,
            content_type: fetched.content_type,
        })
    }
}

#[async_trait::async_trait]
impl ImageResolverPort for ImageCache {
    async fn resolve(&self, key: &ImageKey) -> CacheResult<ResolvedImage> {
        Self::resolve(self, key).await
    }
}

/// Writes bytes to `path` via a temp file in the same directory, so a
/// crashed write never leaves a partial cache entry under the final name.
async fn write_atomic(dir: &Path, path: &Path, bytes: Vec<u8>) -> CacheResult<()> {
    let dir = dir.to_path_buf();
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| CacheError::Io(format!("write task panicked: {e}")))?
    .map_err(|e| CacheError::Io(format!("failed to write cache file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::image::fetch::FetchedImage;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct CountingFetcher {
        calls: AtomicU32,
        fail: bool,
        content_type: ImageContentType,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: false,
                content_type: ImageContentType::Png,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn gif() -> Self {
            Self {
                content_type: ImageContentType::Gif,
                ..Self::new()
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ImageFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> CacheResult<FetchedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(CacheError::Miss("HTTP 404".to_string()));
            }
            Ok(FetchedImage {
                bytes: b"imagebytes".to_vec(),
                content_type: self.content_type,
            })
        }
    }

    async fn open_cache(fetcher: Arc<CountingFetcher>) -> (Arc<ImageCache>, TempDir) {
        let temp = TempDir::new().unwrap();
        let cache = ImageCache::open(temp.path().to_path_buf(), fetcher)
            .await
            .unwrap();
        (Arc::new(cache), temp)
    }

    #[tokio::test]
    async fn test_resolve_fetches_once_and_caches() {
        let fetcher = Arc::new(CountingFetcher::new());
        let (cache, _temp) = open_cache(fetcher.clone()).await;
        let key = ImageKey::twitch_emote("25");

        let first = cache.resolve(&key).await.unwrap();
        let second = cache.resolve(&key).await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(first.bytes_len, 10);
        assert!(first.path.ends_with("twitch-25-dark-3.0-animated.png"));
        assert_eq!(tokio::fs::read(&first.path).await.unwrap(), b"imagebytes");
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_fetch() {
        let fetcher = Arc::new(CountingFetcher::new());
        let (cache, _temp) = open_cache(fetcher.clone()).await;
        let key = ImageKey::emoji(vec![0x1F600]);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move { cache.resolve(&key).await }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_evicts_entry() {
        let fetcher = Arc::new(CountingFetcher::failing());
        let (cache, _temp) = open_cache(fetcher.clone()).await;
        let key = ImageKey::twitch_emote("404");

        assert!(matches!(
            cache.resolve(&key).await,
            Err(CacheError::Miss(_))
        ));
        assert!(cache.is_empty().await);

        // A later resolve starts a fresh fetch rather than replaying the
        // failure.
        let _ = cache.resolve(&key).await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_disk_probe_skips_network() {
        let fetcher = Arc::new(CountingFetcher::new());
        let temp = TempDir::new().unwrap();
        let key = ImageKey::twitch_emote("25");
        let filename = format!("{}.png", key.fingerprint());
        std::fs::write(temp.path().join(&filename), b"leftover").unwrap();

        let cache = ImageCache::open(temp.path().to_path_buf(), fetcher.clone())
            .await
            .unwrap();
        let image = cache.resolve(&key).await.unwrap();

        assert_eq!(fetcher.calls(), 0);
        assert_eq!(image.bytes_len, 8);
        assert_eq!(image.content_type, ImageContentType::Png);
    }

    #[tokio::test]
    async fn test_extension_follows_content_type() {
        let fetcher = Arc::new(CountingFetcher::gif());
        let (cache, _temp) = open_cache(fetcher).await;

        let image = cache.resolve(&ImageKey::twitch_emote("303")).await.unwrap();
        assert_eq!(image.content_type, ImageContentType::Gif);
        assert!(image.path.extension().is_some_and(|ext| ext == "gif"));
    }

    #[tokio::test]
    async fn test_purge_all_removes_directory() {
        let fetcher = Arc::new(CountingFetcher::new());
        let (cache, temp) = open_cache(fetcher).await;

        cache.resolve(&ImageKey::twitch_emote("25")).await.unwrap();
        cache.purge_all().await.unwrap();

        assert!(cache.is_empty().await);
        assert!(!temp.path().exists());
    }
}
