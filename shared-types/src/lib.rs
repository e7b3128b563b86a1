//! Shared types between the edit engine and its callers
//!
//! These types cross the session transport surface:
//! - the engine produces them (candidates, review items, summaries)
//! - a chat/command front end renders them and sends decisions back
//!
//! Serializable with serde so sessions can be snapshotted or sent over JSON.

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Session identifier (ULID string)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable paragraph identity (position in document order, never reused)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParagraphId(pub usize);

impl std::fmt::Display for ParagraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Candidate identifier, unique within one session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateId(pub u32);

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Half-open byte range `[start, end)` within one paragraph's flat text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CandidateLocation {
    pub paragraph: ParagraphId,
    pub start: usize,
    pub end: usize,
}

impl CandidateLocation {
    pub fn new(paragraph: ParagraphId, start: usize, end: usize) -> Self {
        Self {
            paragraph,
            start,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// True if both ranges are in the same paragraph and share at least one
    /// byte, or if one is an empty range strictly inside the other.
    pub fn overlaps(&self, other: &CandidateLocation) -> bool {
        if self.paragraph != other.paragraph {
            return false;
        }
        if self.is_empty() {
            return other.start < self.start && self.start < other.end;
        }
        if other.is_empty() {
            return self.start < other.start && other.start < self.end;
        }
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    #[default]
    Literal,
    Ai,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Applied,
    Stale,
}

/// Why a candidate was passed over without being applied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Location overlapped an edit applied earlier in the session
    OverlappedPriorEdit,
    /// Live text no longer matches the candidate's original text
    TextChanged,
    /// Candidate missed a reconciliation pass and can't be placed safely
    OutOfDate,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::OverlappedPriorEdit => "skipped: overlapped a prior edit",
            Self::TextChanged => "skipped: text changed since the candidate was found",
            Self::OutOfDate => "skipped: location could not be reconciled",
        }
    }
}

/// A proposed, not-yet-committed replacement at a specific location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditCandidate {
    pub id: CandidateId,
    pub location: CandidateLocation,
    pub original_text: String,
    pub proposed_text: String,
    pub source: CandidateSource,
    pub status: CandidateStatus,
    /// Document revision the location is valid against
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl EditCandidate {
    pub fn is_pending(&self) -> bool {
        self.status == CandidateStatus::Pending
    }

    /// Length change applying this candidate causes in its paragraph
    pub fn delta(&self) -> isize {
        self.proposed_text.len() as isize - self.location.len() as isize
    }
}

// ============================================================================
// Matching
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            whole_word: false,
        }
    }
}

/// One find/replace pair for the literal strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiteralRule {
    pub search: String,
    pub replace: String,
}

impl LiteralRule {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }
}

/// A free-text correction proposed by the suggestion backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Suggestion {
    /// Text as the backend quoted it from the document
    pub excerpt: String,
    pub replacement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// Free-text hint of where the excerpt lives (surrounding words, sentence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_hint: Option<String>,
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    ManualStep,
    AutoApply,
}

impl std::str::FromStr for SessionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manual" | "manual_step" | "manual-step" => Ok(Self::ManualStep),
            "auto" | "auto_apply" | "auto-apply" => Ok(Self::AutoApply),
            other => Err(format!(
                "invalid session mode '{other}', expected 'manual_step' or 'auto_apply'"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Collecting,
    Reviewing,
    Applying,
    Completed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
    AcceptAll,
    Cancel,
}

/// What the reviewer sees for the candidate under the cursor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewItem {
    pub candidate: EditCandidate,
    /// 1-based position among all candidates of the session
    pub position: usize,
    pub total: usize,
    /// Sentence around the candidate, trimmed for display
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedCandidate {
    pub id: CandidateId,
    pub original_text: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReviewSummary {
    pub total: usize,
    pub applied: usize,
    pub rejected: usize,
    pub stale: usize,
    pub pending: usize,
    pub unmapped_suggestions: usize,
    pub warnings: Vec<String>,
    pub skipped: Vec<SkippedCandidate>,
}
