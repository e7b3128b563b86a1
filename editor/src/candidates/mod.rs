//! Candidate generation strategies.
//!
//! Both strategies return candidates in document order (paragraph, then start
//! offset) with ids assigned in that order, valid against the document
//! revision they were generated from.

pub mod literal;
pub mod preview;
pub mod suggested;

pub use literal::{find_occurrences, generate_literal};
pub use preview::context_for;
pub use suggested::map_suggestions;

use shared_types::{
    CandidateId, CandidateLocation, CandidateSource, CandidateStatus, EditCandidate,
};

/// Located edit before ordering and id assignment
#[derive(Debug, Clone)]
pub struct CandidateDraft {
    pub location: CandidateLocation,
    pub original_text: String,
    pub proposed_text: String,
    pub source: CandidateSource,
    pub rationale: Option<String>,
}

/// Output of one generation pass
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    pub candidates: Vec<EditCandidate>,
    /// Suggestions that could not be located in the document
    pub unmapped: usize,
    pub warnings: Vec<String>,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Sort drafts into document order and number them from 1.
///
/// The sort is stable, so drafts at the same position keep generation order.
pub(crate) fn into_candidates(mut drafts: Vec<CandidateDraft>, revision: u64) -> Vec<EditCandidate> {
    drafts.sort_by_key(|draft| (draft.location.paragraph, draft.location.start));
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| EditCandidate {
            id: CandidateId(index as u32 + 1),
            location: draft.location,
            original_text: draft.original_text,
            proposed_text: draft.proposed_text,
            source: draft.source,
            status: CandidateStatus::Pending,
            revision,
            skip_reason: None,
            rationale: draft.rationale,
        })
        .collect()
}
