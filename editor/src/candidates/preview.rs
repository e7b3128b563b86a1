//! Review context for a candidate: the sentence it sits in, windowed when long.

use shared_types::CandidateLocation;

use crate::document::Document;
use crate::segmenter::{unit_at, Segmenter};

/// Sentences longer than this (in chars) are windowed around the match
pub const MAX_CONTEXT_CHARS: usize = 150;
/// Chars kept on either side of the match in a windowed context
pub const CONTEXT_WINDOW_CHARS: usize = 40;

fn floor_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn back_chars(text: &str, from: usize, count: usize) -> usize {
    text[..from]
        .char_indices()
        .rev()
        .take(count)
        .last()
        .map(|(offset, _)| offset)
        .unwrap_or(from)
}

fn forward_chars(text: &str, from: usize, count: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(count)
        .map(|(offset, _)| from + offset)
        .unwrap_or(text.len())
}

/// Display context for `location` in the live document.
///
/// Returns an empty string when the paragraph no longer exists.
pub fn context_for(document: &Document, segmenter: &Segmenter, location: &CandidateLocation) -> String {
    let Some(paragraph) = document.paragraph(location.paragraph) else {
        return String::new();
    };
    let text = paragraph.text();
    let start = floor_boundary(&text, location.start);
    let end = floor_boundary(&text, location.end).max(start);

    let units = segmenter.segment(location.paragraph, &text);
    let (unit_start, unit_end) = unit_at(&units, location.paragraph, start)
        .map(|unit| (unit.start.min(start), unit.end.max(end)))
        .unwrap_or((0, text.len()));

    let sentence = &text[unit_start..unit_end];
    if sentence.chars().count() <= MAX_CONTEXT_CHARS {
        return sentence.to_string();
    }

    let window_start = back_chars(&text, start, CONTEXT_WINDOW_CHARS).max(unit_start);
    let window_end = forward_chars(&text, end, CONTEXT_WINDOW_CHARS).min(unit_end);
    let mut context = String::new();
    if window_start > unit_start {
        context.push_str("...");
    }
    context.push_str(&text[window_start..window_end]);
    if window_end < unit_end {
        context.push_str("...");
    }
    context
}
