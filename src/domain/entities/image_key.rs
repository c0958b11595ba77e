//! Identity of one addressable image on the display.

/// Background theme an emote is rasterized against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EmoteTheme {
    /// Light background raster.
    Light,
    /// Dark background raster.
    #[default]
    Dark,
}

impl EmoteTheme {
    /// CDN path segment for this theme.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// Raster scale of an emote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EmoteScale {
    /// 1.0 (28x28).
    Small,
    /// 2.0 (56x56).
    Medium,
    /// 3.0 (112x112).
    #[default]
    Large,
}

impl EmoteScale {
    /// CDN path segment for this scale.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Small => "1.0",
            Self::Medium => "2.0",
            Self::Large => "3.0",
        }
    }
}

/// Animation preference for an emote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EmoteFormat {
    /// First frame only.
    Static,
    /// Animated raster where the emote has one.
    #[default]
    Animated,
}

impl EmoteFormat {
    /// CDN path segment for this format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Animated => "animated",
        }
    }
}

/// Tagged identity of one visual token extracted from chat.
///
/// Equality is structural; two keys with the same fields address the same
/// cache entry and the same ranking slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageKey {
    /// A Twitch emote, addressed by its emote id.
    TwitchEmote {
        /// Emote id from the `emotes` message tag.
        id: String,
        /// Background theme.
        theme: EmoteTheme,
        /// Raster scale.
        scale: EmoteScale,
        /// Animation preference.
        format: EmoteFormat,
    },
    /// A Unicode emoji, addressed by its normalized code-point sequence.
    Emoji {
        /// Code points after ZWJ normalization (U+FE0F stripped).
        codepoints: Vec<u32>,
    },
}

impl ImageKey {
    /// Creates a Twitch emote key with default theme, scale and format.
    #[must_use]
    pub fn twitch_emote(id: impl Into<String>) -> Self {
        Self::TwitchEmote {
            id: id.into(),
            theme: EmoteTheme::default(),
            scale: EmoteScale::default(),
            format: EmoteFormat::default(),
        }
    }

    /// Creates an emoji key from a normalized code-point sequence.
    #[must_use]
    pub const fn emoji(codepoints: Vec<u32>) -> Self {
        Self::Emoji { codepoints }
    }

    /// Stable string fingerprint.
    ///
    /// Used as the cache filename stem and as identity in the ranking
    /// buffer. Derived purely from the key fields, so equal keys always
    /// produce equal fingerprints.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        match self {
            Self::TwitchEmote {
                id,
                theme,
                scale,
                format,
            } => format!(
                "twitch-{id}-{}-{}-{}",
                theme.as_str(),
                scale.as_str(),
                format.as_str()
            ),
            Self::Emoji { codepoints } => {
                let mut out = String::from("emoji");
                for cp in codepoints {
                    out.push('-');
                    out.push_str(&format!("{cp:x}"));
                }
                out
            }
        }
    }
}

impl std::fmt::Display for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twitch_fingerprint_uses_defaults() {
        let key = ImageKey::twitch_emote("25");
        assert_eq!(key.fingerprint(), "twitch-25-dark-3.0-animated");
    }

    #[test]
    fn test_emoji_fingerprint_is_hex_sequence() {
        let key = ImageKey::emoji(vec![0x1F468, 0x200D, 0x1F469]);
        assert_eq!(key.fingerprint(), "emoji-1f468-200d-1f469");
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(ImageKey::twitch_emote("25"), ImageKey::twitch_emote("25"));
        assert_ne!(ImageKey::twitch_emote("25"), ImageKey::twitch_emote("26"));
        assert_ne!(
            ImageKey::twitch_emote("25"),
            ImageKey::emoji(vec![0x1F600])
        );
    }

    #[test]
    fn test_fingerprint_is_stable_across_clones() {
        let key = ImageKey::emoji(vec![0x1F3F3, 0x200D, 0x1F308]);
        assert_eq!(key.fingerprint(), key.clone().fingerprint());
    }
}
