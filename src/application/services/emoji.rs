//! Emoji grapheme classification.
//!
//! Classifies one extended grapheme cluster as an emoji and produces the
//! normalized code-point sequence that names its Twemoji bitmap: U+FE0F
//! presentation selectors are stripped, U+200D joiners are kept.

const VARIATION_SELECTOR_16: u32 = 0xFE0F;
const COMBINING_KEYCAP: u32 = 0x20E3;

/// Code points that are emoji on their own.
const fn is_pictographic(cp: u32) -> bool {
    matches!(
        cp,
        0x231A..=0x231B          // watches
        | 0x23E9..=0x23FA        // av controls
        | 0x25FB..=0x25FE        // geometric squares
        | 0x2600..=0x27BF        // misc symbols, dingbats
        | 0x2934..=0x2935
        | 0x2B00..=0x2BFF        // arrows, stars
        | 0x3030 | 0x303D | 0x3297 | 0x3299
        | 0x1F000..=0x1FAFF      // all emoji planes incl. modifiers
    )
}

/// Text-default code points that only render as emoji with U+FE0F.
const fn needs_presentation_selector(cp: u32) -> bool {
    matches!(
        cp,
        0xA9 | 0xAE              // copyright, registered
        | 0x203C | 0x2049        // double/interrobang punctuation
        | 0x2122 | 0x2139        // trademark, information
        | 0x2194..=0x2199
        | 0x21A9..=0x21AA
        | 0x24C2
        | 0x25AA..=0x25AB
        | 0x25B6 | 0x25C0
    )
}

const fn is_regional_indicator(cp: u32) -> bool {
    matches!(cp, 0x1F1E6..=0x1F1FF)
}

/// Classifies a grapheme; returns the normalized code-point sequence when
/// it is an emoji.
#[must_use]
pub fn match_emoji(grapheme: &str) -> Option<Vec<u32>> {
    let codepoints: Vec<u32> = grapheme.chars().map(u32::from).collect();
    if codepoints.is_empty() {
        return None;
    }

    let has_selector = codepoints.contains(&VARIATION_SELECTOR_16);
    let keycap = codepoints.last() == Some(&COMBINING_KEYCAP);
    let flag = is_regional_indicator(codepoints[0]);
    let pictographic = codepoints.iter().any(|&cp| is_pictographic(cp));
    let selected = has_selector && codepoints.iter().any(|&cp| needs_presentation_selector(cp));

    if !(keycap || flag || pictographic || selected) {
        return None;
    }

    let normalized: Vec<u32> = codepoints
        .into_iter()
        .filter(|&cp| cp != VARIATION_SELECTOR_16)
        .collect();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
