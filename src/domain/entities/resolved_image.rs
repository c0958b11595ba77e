//! A cache entry that is ready to be uploaded.

use std::path::PathBuf;

/// Content type of a resolved image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageContentType {
    /// `image/png`.
    Png,
    /// `image/gif`.
    Gif,
}

impl ImageContentType {
    /// MIME type string sent as the upload `Content-Type` header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }

    /// Cache filename extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }

    /// Maps an HTTP `Content-Type` header value to a known type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split(';').next().map(str::trim) {
            Some("image/png") => Some(Self::Png),
            Some("image/gif") => Some(Self::Gif),
            _ => None,
        }
    }

    /// Maps a cache filename extension back to a known type.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }
}

/// A key resolved to a local file, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// Path of the cached file.
    pub path: PathBuf,
    /// Size of the cached file in bytes.
    pub bytes_len: u64,
    /// Content type of the cached file.
    pub content_type: ImageContentType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_mapping() {
        assert_eq!(
            ImageContentType::from_mime("image/png"),
            Some(ImageContentType::Png)
        );
        assert_eq!(
            ImageContentType::from_mime("image/gif; charset=binary"),
            Some(ImageContentType::Gif)
        );
        assert_eq!(ImageContentType::from_mime("text/html"), None);
    }

    #[test]
    fn test_extension_roundtrip() {
        for ct in [ImageContentType::Png, ImageContentType::Gif] {
            assert_eq!(ImageContentType::from_extension(ct.extension()), Some(ct));
        }
    }
}
