//! CDN URL derivation for image keys.

use crate::domain::entities::ImageKey;

/// Twitch static emote CDN, v2 template.
pub const TWITCH_EMOTE_CDN: &str = "https://static-cdn.jtvnw.net/emoticons/v2";

/// Twemoji 72x72 bitmap CDN.
pub const TWEMOJI_CDN: &str = "https://cdn.jsdelivr.net/gh/jdecked/twemoji@latest/assets/72x72";

/// Derives the download URL for a key.
///
/// Pure function of the key fields; equal keys always produce equal URLs.
#[must_use]
pub fn image_url(key: &ImageKey) -> String {
    match key {
        ImageKey::TwitchEmote {
            id,
            theme,
            scale,
            format,
        } => format!(
            "{TWITCH_EMOTE_CDN}/{id}/{}/{}/{}",
            format.as_str(),
            theme.as_str(),
            scale.as_str()
        ),
        ImageKey::Emoji { codepoints } => {
            let joined = codepoints
                .iter()
                .map(|cp| format!("{cp:x}"))
                .collect::<Vec<_>>()
                .join("-");
            format!("{TWEMOJI_CDN}/{joined}.png")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{EmoteFormat, EmoteScale, EmoteTheme};

    #[test]
    fn test_twitch_emote_url_defaults() {
        let key = ImageKey::twitch_emote("25");
        assert_eq!(
            image_url(&key),
            "https://static-cdn.jtvnw.net/emoticons/v2/25/animated/dark/3.0"
        );
    }

    #[test]
    fn test_twitch_emote_url_explicit_fields() {
        let key = ImageKey::TwitchEmote {
            id: "emotesv2_abc".to_string(),
            theme: EmoteTheme::Light,
            scale: EmoteScale::Small,
            format: EmoteFormat::Static,
        };
        assert_eq!(
            image_url(&key),
            "https://static-cdn.jtvnw.net/emoticons/v2/emotesv2_abc/static/light/1.0"
        );
    }

    #[test]
    fn test_emoji_url_joins_codepoints() {
        let key = ImageKey::emoji(vec![0x1F468, 0x200D, 0x1F469, 0x200D, 0x1F466]);
        assert_eq!(
            image_url(&key),
            "https://cdn.jsdelivr.net/gh/jdecked/twemoji@latest/assets/72x72/1f468-200d-1f469-200d-1f466.png"
        );
    }

    #[test]
    fn test_single_codepoint_emoji_url() {
        let key = ImageKey::emoji(vec![0x1F600]);
        assert!(image_url(&key).ends_with("/1f600.png"));
    }
}
