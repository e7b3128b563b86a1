//! Edit session state.

use serde::{Deserialize, Serialize};
use shared_types::{
    CandidateStatus, EditCandidate, ReviewSummary, SessionId, SessionMode, SessionState,
    SkippedCandidate,
};

use crate::document::Document;

/// One in-flight edit session: the working document, its candidates, and
/// where review currently stands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditSession {
    pub(super) id: SessionId,
    pub(super) mode: SessionMode,
    pub(super) state: SessionState,
    pub(super) document: Document,
    pub(super) candidates: Vec<EditCandidate>,
    /// Index of the candidate under review
    pub(super) cursor: usize,
    pub(super) unmapped: usize,
    pub(super) warnings: Vec<String>,
}

impl EditSession {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Working copy, including every edit committed so far
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn candidates(&self) -> &[EditCandidate] {
        &self.candidates
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(super) fn count(&self, status: CandidateStatus) -> usize {
        self.candidates
            .iter()
            .filter(|candidate| candidate.status == status)
            .count()
    }

    pub fn summary(&self) -> ReviewSummary {
        ReviewSummary {
            total: self.candidates.len(),
            applied: self.count(CandidateStatus::Applied),
            rejected: self.count(CandidateStatus::Rejected),
            stale: self.count(CandidateStatus::Stale),
            pending: self.count(CandidateStatus::Pending),
            unmapped_suggestions: self.unmapped,
            warnings: self.warnings.clone(),
            skipped: self
                .candidates
                .iter()
                .filter_map(|candidate| {
                    candidate.skip_reason.map(|reason| SkippedCandidate {
                        id: candidate.id,
                        original_text: candidate.original_text.clone(),
                        reason,
                    })
                })
                .collect(),
        }
    }
}
