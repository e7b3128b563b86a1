//! Paragraph/run document model.
//!
//! A document is an ordered list of paragraphs, each an ordered list of styled
//! runs. Offsets are UTF-8 byte offsets into a paragraph's flat text (the
//! concatenation of its run texts). Mutations touch the minimal set of runs
//! overlapping the replaced range; every other run is left as it was.

mod codec;

pub use codec::{CodecError, DocumentCodec, JsonCodec, PlainTextCodec};

use serde::{Deserialize, Serialize};
use shared_types::{CandidateLocation, ParagraphId};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStyle {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
}

/// Contiguous span of text sharing one style
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    #[serde(default)]
    pub style: RunStyle,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: RunStyle::default(),
        }
    }

    pub fn styled(text: impl Into<String>, style: RunStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paragraph {
    runs: Vec<Run>,
}

impl Paragraph {
    pub fn new(runs: Vec<Run>) -> Self {
        Self { runs }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            runs: vec![Run::plain(text)],
        }
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Flat text: run texts concatenated in order
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.runs.iter().map(|run| run.text.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte bounds `[start, end)` of each run within the flat text
    fn run_bounds(&self) -> Vec<(usize, usize)> {
        let mut offset = 0;
        self.runs
            .iter()
            .map(|run| {
                let start = offset;
                offset += run.text.len();
                (start, offset)
            })
            .collect()
    }

    /// Index of the run whose style the inserted text inherits.
    ///
    /// A replacement takes the style of the run holding the byte at `start`.
    /// A pure insertion on a run boundary takes the preceding run's style.
    fn style_anchor(&self, bounds: &[(usize, usize)], start: usize, end: usize) -> usize {
        if start < end {
            return bounds
                .iter()
                .position(|&(rs, re)| rs <= start && start < re)
                .unwrap_or(0);
        }
        if start == 0 {
            return 0;
        }
        bounds
            .iter()
            .rposition(|&(rs, re)| rs < start && start <= re)
            .unwrap_or(0)
    }

    fn replace_range(&mut self, start: usize, end: usize, new_text: &str) {
        if self.runs.is_empty() {
            self.runs.push(Run::plain(new_text));
            return;
        }

        let bounds = self.run_bounds();
        let anchor = self.style_anchor(&bounds, start, end);

        // (source run index, text, untouched) fragments in output order
        let mut fragments: Vec<(usize, String, bool)> = Vec::with_capacity(self.runs.len() + 2);
        for (index, (run, &(rs, re))) in self.runs.iter().zip(bounds.iter()).enumerate() {
            if index == anchor {
                let prefix_end = start.clamp(rs, re) - rs;
                fragments.push((index, run.text[..prefix_end].to_string(), false));
                fragments.push((index, new_text.to_string(), false));
                if end < re {
                    fragments.push((index, run.text[end.max(rs) - rs..].to_string(), false));
                }
            } else if re <= start || rs >= end {
                fragments.push((index, run.text.clone(), true));
            } else {
                if rs < start {
                    fragments.push((index, run.text[..start - rs].to_string(), false));
                }
                if re > end {
                    fragments.push((index, run.text[end - rs..].to_string(), false));
                }
            }
        }

        let mut rebuilt: Vec<(usize, String)> = Vec::with_capacity(fragments.len());
        for (index, text, untouched) in fragments {
            if text.is_empty() && !untouched {
                continue;
            }
            match rebuilt.last_mut() {
                Some((last_index, last_text)) if *last_index == index && !untouched => {
                    last_text.push_str(&text);
                }
                _ => rebuilt.push((index, text)),
            }
        }

        if rebuilt.is_empty() {
            rebuilt.push((anchor, String::new()));
        }

        let runs = rebuilt
            .into_iter()
            .map(|(index, text)| Run::styled(text, self.runs[index].style.clone()))
            .collect();
        self.runs = runs;
    }
}

/// Result of one committed replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedEdit {
    pub location: CandidateLocation,
    /// Byte length of the inserted text
    pub inserted_len: usize,
    /// Document revision after the edit
    pub revision: u64,
}

impl AppliedEdit {
    pub fn delta(&self) -> isize {
        self.inserted_len as isize - self.location.len() as isize
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Unknown paragraph: {0}")]
    UnknownParagraph(ParagraphId),

    #[error("Invalid range {start}..{end} in paragraph {paragraph} (length {len})")]
    Range {
        paragraph: ParagraphId,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("Offset {offset} in paragraph {paragraph} is not on a character boundary")]
    CharBoundary { paragraph: ParagraphId, offset: usize },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    paragraphs: Vec<Paragraph>,
    #[serde(default)]
    revision: u64,
}

impl Document {
    pub fn new(paragraphs: Vec<Paragraph>) -> Self {
        Self {
            paragraphs,
            revision: 0,
        }
    }

    /// One unstyled paragraph per line
    pub fn from_plain_text(text: &str) -> Self {
        Self::new(text.split('\n').map(Paragraph::plain).collect())
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn paragraph(&self, id: ParagraphId) -> Option<&Paragraph> {
        self.paragraphs.get(id.0)
    }

    pub fn paragraph_ids(&self) -> impl Iterator<Item = ParagraphId> + '_ {
        (0..self.paragraphs.len()).map(ParagraphId)
    }

    /// Full document text, paragraphs joined with `\n`
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text currently at `location`, validating the range first
    pub fn slice(&self, location: &CandidateLocation) -> Result<String, DocumentError> {
        let text = self.validated_text(location.paragraph, location.start, location.end)?;
        Ok(text[location.start..location.end].to_string())
    }

    fn validated_text(
        &self,
        paragraph: ParagraphId,
        start: usize,
        end: usize,
    ) -> Result<String, DocumentError> {
        let para = self
            .paragraph(paragraph)
            .ok_or(DocumentError::UnknownParagraph(paragraph))?;
        let text = para.text();
        if start > end || end > text.len() {
            return Err(DocumentError::Range {
                paragraph,
                start,
                end,
                len: text.len(),
            });
        }
        for offset in [start, end] {
            if !text.is_char_boundary(offset) {
                return Err(DocumentError::CharBoundary { paragraph, offset });
            }
        }
        Ok(text)
    }

    /// Replace `[start, end)` of a paragraph's flat text with `new_text`.
    ///
    /// Inserted text takes the style of the run at `start` (the preceding run
    /// when `start` is on a run boundary). Runs outside the range are kept
    /// byte-for-byte. Subsequent offsets in the paragraph shift by
    /// [`AppliedEdit::delta`].
    pub fn apply_replacement(
        &mut self,
        paragraph: ParagraphId,
        start: usize,
        end: usize,
        new_text: &str,
    ) -> Result<AppliedEdit, DocumentError> {
        self.validated_text(paragraph, start, end)?;
        self.paragraphs[paragraph.0].replace_range(start, end, new_text);
        self.revision += 1;

        tracing::trace!(
            paragraph = %paragraph,
            start,
            end,
            inserted = new_text.len(),
            revision = self.revision,
            "Applied replacement"
        );

        Ok(AppliedEdit {
            location: CandidateLocation::new(paragraph, start, end),
            inserted_len: new_text.len(),
            revision: self.revision,
        })
    }
}
