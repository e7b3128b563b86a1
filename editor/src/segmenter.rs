//! Sentence segmentation over paragraph flat text.
//!
//! Splits on terminal punctuation followed by whitespace or paragraph end.
//! Ambiguous boundaries (abbreviations, initials, a following lowercase word)
//! are not split: two sentences reviewed as one unit is harmless, a sentence
//! cut in half can truncate a suggested replacement.

use std::collections::HashSet;

use shared_types::ParagraphId;

use crate::document::Document;

/// Abbreviations that never end a sentence, compared lowercase without the
/// trailing period.
pub const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "e.g", "i.e", "etc", "vs", "cf", "al",
    "no", "fig", "vol", "inc", "ltd", "co",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceUnit {
    pub paragraph: ParagraphId,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl SentenceUnit {
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

#[derive(Debug, Clone)]
pub struct Segmenter {
    abbreviations: HashSet<String>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(DEFAULT_ABBREVIATIONS.iter().copied())
    }
}

fn is_terminal(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '…')
}

fn is_closer(ch: char) -> bool {
    matches!(ch, '"' | '\'' | ')' | ']' | '”' | '’' | '»')
}

fn is_opener(ch: char) -> bool {
    matches!(ch, '"' | '\'' | '(' | '[' | '“' | '‘' | '«')
}

impl Segmenter {
    pub fn new<I, S>(abbreviations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let abbreviations = abbreviations
            .into_iter()
            .map(|abbr| abbr.as_ref().trim().trim_end_matches('.').to_lowercase())
            .filter(|abbr| !abbr.is_empty())
            .collect();
        Self { abbreviations }
    }

    /// Split one paragraph's text into ordered, non-overlapping units.
    ///
    /// Pure over `text`: the same input always yields the same units.
    pub fn segment(&self, paragraph: ParagraphId, text: &str) -> Vec<SentenceUnit> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut units = Vec::new();
        let mut unit_start: Option<usize> = None;
        let mut i = 0;

        while i < chars.len() {
            let (pos, ch) = chars[i];
            let Some(start) = unit_start else {
                if !ch.is_whitespace() {
                    unit_start = Some(pos);
                    continue;
                }
                i += 1;
                continue;
            };

            if !is_terminal(ch) {
                i += 1;
                continue;
            }

            let mut j = i + 1;
            while j < chars.len() && (is_terminal(chars[j].1) || is_closer(chars[j].1)) {
                j += 1;
            }
            let end = chars.get(j).map(|&(offset, _)| offset).unwrap_or(text.len());
            let at_end = j >= chars.len();
            let followed_by_space = chars.get(j).is_some_and(|&(_, next)| next.is_whitespace());

            if (at_end || followed_by_space) && self.is_boundary(text, start, pos, ch, &chars[j..])
            {
                units.push(SentenceUnit {
                    paragraph,
                    start,
                    end,
                    text: text[start..end].to_string(),
                });
                unit_start = None;
            }
            i = j;
        }

        if let Some(start) = unit_start {
            let end = text.trim_end().len().max(start);
            units.push(SentenceUnit {
                paragraph,
                start,
                end,
                text: text[start..end].to_string(),
            });
        }

        units
    }

    /// Units of every paragraph in document order
    pub fn segment_document(&self, document: &Document) -> Vec<SentenceUnit> {
        document
            .paragraph_ids()
            .zip(document.paragraphs())
            .flat_map(|(id, paragraph)| self.segment(id, &paragraph.text()))
            .collect()
    }

    fn is_boundary(
        &self,
        text: &str,
        unit_start: usize,
        terminal_pos: usize,
        terminal: char,
        rest: &[(usize, char)],
    ) -> bool {
        let next_visible = rest.iter().map(|&(_, c)| c).find(|c| !c.is_whitespace());
        if next_visible.is_some_and(char::is_lowercase) {
            return false;
        }
        if terminal != '.' {
            return true;
        }

        let before = &text[unit_start..terminal_pos];
        let word = before
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .trim_start_matches(is_opener);
        let mut word_chars = word.chars();
        if let (Some(only), None) = (word_chars.next(), word_chars.next()) {
            if only.is_alphabetic() {
                return false;
            }
        }
        !self.abbreviations.contains(&word.to_lowercase())
    }
}

/// Unit containing `offset` in `paragraph`, or the nearest unit before it
pub fn unit_at(units: &[SentenceUnit], paragraph: ParagraphId, offset: usize) -> Option<&SentenceUnit> {
    units
        .iter()
        .filter(|unit| unit.paragraph == paragraph)
        .take_while(|unit| unit.start <= offset)
        .last()
}
