//! Extraction of visual tokens from chat messages.
//!
//! Walks a message left to right and emits an ordered sequence of image
//! keys: Twitch emotes where the `emotes` tag names a span, Unicode emoji
//! graphemes everywhere else.

use std::collections::HashSet;

use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::entities::{ChatMessage, ImageKey};

use super::emoji::match_emoji;

/// One emote span from the `emotes` tag. Indices are UTF-16 code units,
/// inclusive on both ends, matching Twitch's character-counting convention.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EmoteSpan {
    id: String,
    start: usize,
    end: usize,
}

/// Message analyzer with emission policy baked in at construction.
#[derive(Debug, Clone)]
pub struct MessageAnalyzer {
    forbidden_emotes: HashSet<String>,
    no_summation: bool,
}

impl MessageAnalyzer {
    /// Creates an analyzer.
    ///
    /// With `no_summation` set, repeats of the same key within one message
    /// collapse to a single occurrence.
    #[must_use]
    pub fn new(forbidden_emotes: HashSet<String>, no_summation: bool) -> Self {
        Self {
            forbidden_emotes,
            no_summation,
        }
    }

    /// Extracts the ordered token sequence of one message.
    ///
    /// A malformed `emotes` tag drops the whole message.
    #[must_use]
    pub fn analyze(&self, message: &ChatMessage) -> Vec<ImageKey> {
        let spans = match message.emotes_tag() {
            Some(tag) if !tag.is_empty() => match parse_emote_spans(tag) {
                Some(spans) => spans,
                None => {
                    warn!(tag = %tag, "Dropping message with malformed emotes tag");
                    return Vec::new();
                }
            },
            _ => Vec::new(),
        };

        let mut keys = Vec::new();
        let mut seen = HashSet::new();

        let mut span_index = 0;
        let mut inside_span_until: Option<usize> = None;
        let mut utf16_pos = 0;

        for grapheme in message.text.graphemes(true) {
            let width: usize = grapheme.chars().map(char::len_utf16).sum();

            if let Some(end) = inside_span_until {
                if utf16_pos <= end {
                    utf16_pos += width;
                    continue;
                }
                inside_span_until = None;
            }

            // Overlapping or out-of-order spans never match a position we
            // already passed.
            while span_index < spans.len() && spans[span_index].start < utf16_pos {
                span_index += 1;
            }

            if span_index < spans.len() && spans[span_index].start == utf16_pos {
                let span = &spans[span_index];
                span_index += 1;
                inside_span_until = Some(span.end);
                self.push(ImageKey::twitch_emote(&span.id), &mut seen, &mut keys);
                utf16_pos += width;
                continue;
            }

            if let Some(codepoints) = match_emoji(grapheme) {
                self.push(ImageKey::emoji(codepoints), &mut seen, &mut keys);
            }
            utf16_pos += width;
        }

        keys
    }

    fn push(&self, key: ImageKey, seen: &mut HashSet<ImageKey>, out: &mut Vec<ImageKey>) {
        if let ImageKey::TwitchEmote { id, .. } = &key
            && self.forbidden_emotes.contains(id)
        {
            debug!(emote = %id, "Filtered forbidden emote");
            return;
        }
        if self.no_summation && !seen.insert(key.clone()) {
            return;
        }
        out.push(key);
    }
}

/// Parses `<id>:<start>-<end>{,<start>-<end>}{/…}`, sorted by start.
fn parse_emote_spans(tag: &str) -> Option<Vec<EmoteSpan>> {
    let mut spans = Vec::new();
    for entry in tag.split('/') {
        if entry.is_empty() {
            continue;
        }
        let (id, ranges) = entry.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        for range in ranges.split(',') {
            let (start, end) = range.split_once('-')?;
            let start: usize = start.parse().ok()?;
            let end: usize = end.parse().ok()?;
            if end < start {
                return None;
            }
            spans.push(EmoteSpan {
                id: id.to_string(),
                start,
                end,
            });
        }
    }
    spans.sort_by_key(|span| span.start);
    Some(spans)
}
