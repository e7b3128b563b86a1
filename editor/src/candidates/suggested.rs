//! Mapping free-text suggestions onto document locations.
//!
//! Each suggestion is located by, in order:
//! 1. exact match of the excerpt,
//! 2. normalized match (case folded, whitespace collapsed),
//! 3. fuzzy match of word windows scored with normalized Levenshtein
//!    similarity, searching the sentence unit nearest the hint first.
//!
//! Spans already claimed by an earlier suggestion are not reused. A suggestion
//! that finds no span above the threshold is counted as unmapped.

use shared_types::{CandidateLocation, CandidateSource, ParagraphId, Suggestion};

use super::{into_candidates, CandidateDraft, CandidateSet};
use crate::document::Document;
use crate::segmenter::{unit_at, Segmenter, SentenceUnit};

/// Lowercased text with whitespace runs collapsed to one space and trimmed.
///
/// `spans[i]` is the original byte range that produced normalized byte `i`.
fn normalize_with_spans(text: &str) -> (String, Vec<(usize, usize)>) {
    let mut normalized = String::with_capacity(text.len());
    let mut spans = Vec::with_capacity(text.len());
    let mut pending_space: Option<(usize, usize)> = None;

    for (offset, ch) in text.char_indices() {
        let ch_end = offset + ch.len_utf8();
        if ch.is_whitespace() {
            if !normalized.is_empty() {
                pending_space = Some(match pending_space {
                    Some((start, _)) => (start, ch_end),
                    None => (offset, ch_end),
                });
            }
            continue;
        }
        if let Some(space) = pending_space.take() {
            normalized.push(' ');
            spans.push(space);
        }
        for lower in ch.to_lowercase() {
            let before = normalized.len();
            normalized.push(lower);
            spans.extend(std::iter::repeat((offset, ch_end)).take(normalized.len() - before));
        }
    }

    (normalized, spans)
}

fn normalize(text: &str) -> String {
    normalize_with_spans(text).0
}

fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// How well a unit matches a location hint, in [0, 1]
fn hint_score(unit: &SentenceUnit, hint: &str) -> f64 {
    let unit_text = normalize(&unit.text);
    let hint = normalize(hint);
    if hint.is_empty() {
        return 0.0;
    }
    if unit_text.contains(&hint) || hint.contains(&unit_text) {
        return 1.0;
    }
    similarity(&unit_text, &hint)
}

struct Located {
    location: CandidateLocation,
    original_text: String,
}

struct Mapper<'a> {
    document: &'a Document,
    units: Vec<SentenceUnit>,
    texts: Vec<String>,
    threshold: f64,
    claimed: Vec<CandidateLocation>,
}

impl<'a> Mapper<'a> {
    fn new(document: &'a Document, segmenter: &Segmenter, threshold: f64) -> Self {
        Self {
            document,
            units: segmenter.segment_document(document),
            texts: document.paragraphs().iter().map(|p| p.text()).collect(),
            threshold,
            claimed: Vec::new(),
        }
    }

    fn is_free(&self, location: &CandidateLocation) -> bool {
        !self
            .claimed
            .iter()
            .any(|claimed| claimed == location || claimed.overlaps(location))
    }

    fn located(&self, paragraph: ParagraphId, start: usize, end: usize) -> Located {
        Located {
            location: CandidateLocation::new(paragraph, start, end),
            original_text: self.texts[paragraph.0][start..end].to_string(),
        }
    }

    /// Among several spans, the one whose sentence best matches the hint;
    /// the earliest one when there is no hint or scores tie.
    fn pick_by_hint(
        &self,
        spans: Vec<(ParagraphId, usize, usize)>,
        hint: Option<&str>,
    ) -> Option<(ParagraphId, usize, usize)> {
        let Some(hint) = hint else {
            return spans.into_iter().next();
        };
        let mut best: Option<((ParagraphId, usize, usize), f64)> = None;
        for span in spans {
            let score = unit_at(&self.units, span.0, span.1)
                .map(|unit| hint_score(unit, hint))
                .unwrap_or(0.0);
            if best.as_ref().map_or(true, |(_, top)| score > *top) {
                best = Some((span, score));
            }
        }
        best.map(|(span, _)| span)
    }

    fn exact(&self, excerpt: &str, hint: Option<&str>) -> Option<Located> {
        let spans = self
            .document
            .paragraph_ids()
            .flat_map(|id| {
                self.texts[id.0]
                    .match_indices(excerpt)
                    .map(move |(start, found)| (id, start, start + found.len()))
            })
            .filter(|&(id, start, end)| self.is_free(&CandidateLocation::new(id, start, end)))
            .collect();
        self.pick_by_hint(spans, hint)
            .map(|(id, start, end)| self.located(id, start, end))
    }

    fn normalized(&self, excerpt: &str, hint: Option<&str>) -> Option<Located> {
        let needle = normalize(excerpt);
        if needle.is_empty() {
            return None;
        }
        let mut spans = Vec::new();
        for id in self.document.paragraph_ids() {
            let (haystack, map) = normalize_with_spans(&self.texts[id.0]);
            for (start, found) in haystack.match_indices(&needle) {
                let end = start + found.len();
                let span = (id, map[start].0, map[end - 1].1);
                if self.is_free(&CandidateLocation::new(span.0, span.1, span.2)) {
                    spans.push(span);
                }
            }
        }
        self.pick_by_hint(spans, hint)
            .map(|(id, start, end)| self.located(id, start, end))
    }

    /// Best word window of roughly the excerpt's length inside one unit
    fn fuzzy_in_unit(&self, unit: &SentenceUnit, needle: &str, words: usize) -> Option<(Located, f64)> {
        let text = &self.texts[unit.paragraph.0];
        let bounds = word_bounds(&text[unit.start..unit.end], unit.start);
        if bounds.is_empty() {
            return None;
        }

        let mut best: Option<(usize, usize, f64)> = None;
        for size in words.saturating_sub(1).max(1)..=words + 1 {
            for window in bounds.windows(size.min(bounds.len())) {
                let (start, end) = (window[0].0, window[window.len() - 1].1);
                if !self.is_free(&CandidateLocation::new(unit.paragraph, start, end)) {
                    continue;
                }
                let score = similarity(&normalize(&text[start..end]), needle);
                if best.map_or(true, |(_, _, top)| score > top) {
                    best = Some((start, end, score));
                }
            }
        }

        best.map(|(start, end, score)| (self.located(unit.paragraph, start, end), score))
    }

    fn fuzzy(&self, excerpt: &str, hint: Option<&str>) -> Option<Located> {
        let needle = normalize(excerpt);
        let words = needle.split(' ').filter(|w| !w.is_empty()).count();
        if words == 0 {
            return None;
        }

        if let Some(hint) = hint {
            let nearest = self
                .units
                .iter()
                .map(|unit| (unit, hint_score(unit, hint)))
                .fold(None::<(&SentenceUnit, f64)>, |best, (unit, score)| match best {
                    Some((_, top)) if top >= score => best,
                    _ => Some((unit, score)),
                });
            if let Some((unit, _)) = nearest {
                if let Some((found, score)) = self.fuzzy_in_unit(unit, &needle, words) {
                    if score >= self.threshold {
                        return Some(found);
                    }
                }
            }
        }

        let mut best: Option<(Located, f64)> = None;
        for unit in &self.units {
            if let Some((found, score)) = self.fuzzy_in_unit(unit, &needle, words) {
                if best.as_ref().map_or(true, |(_, top)| score > *top) {
                    best = Some((found, score));
                }
            }
        }
        best.filter(|(_, score)| *score >= self.threshold)
            .map(|(found, _)| found)
    }

    fn locate(&self, suggestion: &Suggestion) -> Option<Located> {
        let excerpt = suggestion.excerpt.trim();
        if excerpt.is_empty() {
            return None;
        }
        let hint = suggestion
            .location_hint
            .as_deref()
            .map(str::trim)
            .filter(|hint| !hint.is_empty());

        self.exact(excerpt, hint)
            .or_else(|| self.normalized(excerpt, hint))
            .or_else(|| self.fuzzy(excerpt, hint))
    }
}

/// Byte bounds of whitespace-separated words, offset by `base`
fn word_bounds(text: &str, base: usize) -> Vec<(usize, usize)> {
    let mut bounds = Vec::new();
    let mut start = None;
    for (offset, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                bounds.push((base + s, base + offset));
                start = None;
            }
            (false, None) => start = Some(offset),
            _ => {}
        }
    }
    if let Some(s) = start {
        bounds.push((base + s, base + text.len()));
    }
    bounds
}

/// Locate every suggestion in `document`; unlocatable ones are counted, not
/// returned as errors.
pub fn map_suggestions(
    document: &Document,
    segmenter: &Segmenter,
    suggestions: &[Suggestion],
    threshold: f64,
) -> CandidateSet {
    let mut mapper = Mapper::new(document, segmenter, threshold);
    let mut drafts = Vec::new();
    let mut unmapped = 0;

    for suggestion in suggestions {
        let Some(found) = mapper.locate(suggestion) else {
            tracing::debug!(excerpt = %suggestion.excerpt, "Suggestion could not be located");
            unmapped += 1;
            continue;
        };
        if found.original_text == suggestion.replacement {
            tracing::debug!(excerpt = %suggestion.excerpt, "Suggestion already matches the document");
            continue;
        }
        mapper.claimed.push(found.location);
        drafts.push(CandidateDraft {
            location: found.location,
            original_text: found.original_text,
            proposed_text: suggestion.replacement.clone(),
            source: CandidateSource::Ai,
            rationale: suggestion.rationale.clone(),
        });
    }

    tracing::debug!(
        suggestions = suggestions.len(),
        mapped = drafts.len(),
        unmapped,
        "Mapped suggestions onto document"
    );

    CandidateSet {
        candidates: into_candidates(drafts, document.revision()),
        unmapped,
        warnings: Vec::new(),
    }
}
