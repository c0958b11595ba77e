//! Image handling infrastructure.
//!
//! This module provides:
//! - CDN URL derivation for emotes and emojis
//! - Disk caching with coalesced downloads
//! - The HTTP fetcher used in production

pub mod cache;
pub mod cdn;
pub mod fetch;

pub use cache::{CACHE_DIR_NAME, ImageCache, default_cache_dir};
pub use cdn::image_url;
pub use fetch::{FetchedImage, HttpImageFetcher, ImageFetcher};
