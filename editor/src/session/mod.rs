//! Edit session state machine.
//!
//! `Idle -> Collecting -> Reviewing <-> Applying -> Completed | Cancelled`.
//!
//! The machine is synchronous: candidate generation happens outside and is
//! handed in with [`EditSession::install`]. The cursor only ever rests on a
//! pending candidate; stale candidates are passed over and reported in the
//! summary with their skip reason.

mod messages;
mod state;

pub use messages::{SessionError, Strategy};
pub use state::EditSession;

use shared_types::{
    CandidateStatus, Decision, EditCandidate, ReviewItem, SessionId, SessionMode, SessionState,
    SkipReason,
};

use crate::candidates::{context_for, CandidateSet};
use crate::document::{Document, DocumentError};
use crate::reconcile::reconcile;
use crate::segmenter::Segmenter;

enum Commit {
    Applied,
    Skipped,
}

impl EditSession {
    pub fn new(id: SessionId, document: Document, mode: SessionMode) -> Self {
        Self {
            id,
            mode,
            state: SessionState::Idle,
            document,
            candidates: Vec::new(),
            cursor: 0,
            unmapped: 0,
            warnings: Vec::new(),
        }
    }

    /// `Idle -> Collecting`
    pub fn begin_collecting(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::Terminal(self.state));
        }
        self.transition(SessionState::Collecting);
        Ok(())
    }

    /// `Collecting -> Reviewing`, or straight to `Completed` when nothing
    /// needs review.
    pub fn install(&mut self, set: CandidateSet) -> Result<SessionState, SessionError> {
        if self.state != SessionState::Collecting {
            return Err(SessionError::Terminal(self.state));
        }
        self.candidates = set.candidates;
        self.unmapped = set.unmapped;
        self.warnings.extend(set.warnings);
        self.cursor = 0;

        tracing::info!(
            session_id = %self.id,
            candidates = self.candidates.len(),
            unmapped = self.unmapped,
            warnings = self.warnings.len(),
            "Candidates ready for review"
        );

        self.advance();
        Ok(self.state)
    }

    /// Record a recovered collaborator failure
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Candidate under the cursor, if the session is reviewing
    pub fn current(&self) -> Option<&EditCandidate> {
        if self.state != SessionState::Reviewing {
            return None;
        }
        self.candidates.get(self.cursor)
    }

    pub fn review_item(&self, segmenter: &Segmenter) -> Option<ReviewItem> {
        let candidate = self.current()?;
        Some(ReviewItem {
            candidate: candidate.clone(),
            position: self.cursor + 1,
            total: self.candidates.len(),
            context: context_for(&self.document, segmenter, &candidate.location),
        })
    }

    pub fn decide(&mut self, decision: Decision) -> Result<SessionState, SessionError> {
        match self.state {
            SessionState::Completed | SessionState::Cancelled => {
                return Err(SessionError::Terminal(self.state));
            }
            SessionState::Reviewing => {}
            state if decision == Decision::Cancel => {
                tracing::debug!(session_id = %self.id, ?state, "Cancelling before review");
            }
            state => {
                return Err(SessionError::InvalidDecision {
                    decision,
                    state,
                    reason: "no candidate is under review".to_string(),
                });
            }
        }

        match decision {
            Decision::Accept => self.accept_current(),
            Decision::Reject => {
                if let Some(candidate) = self.candidates.get_mut(self.cursor) {
                    candidate.status = CandidateStatus::Rejected;
                    tracing::debug!(session_id = %self.id, candidate = %candidate.id, "Rejected candidate");
                }
                self.advance();
                Ok(self.state)
            }
            Decision::AcceptAll => self.accept_all(),
            Decision::Cancel => {
                self.cancel();
                Ok(self.state)
            }
        }
    }

    /// Any non-terminal state -> `Cancelled`
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.transition(SessionState::Cancelled);
        }
    }

    fn accept_current(&mut self) -> Result<SessionState, SessionError> {
        self.transition(SessionState::Applying);
        let index = self.cursor;
        match self.commit(index) {
            Ok(_) => {
                self.advance();
                Ok(self.state)
            }
            Err(e) => {
                tracing::error!(session_id = %self.id, error = %e, "Failed to apply candidate");
                self.transition(SessionState::Reviewing);
                Err(SessionError::Range(e))
            }
        }
    }

    fn accept_all(&mut self) -> Result<SessionState, SessionError> {
        if self.mode != SessionMode::AutoApply {
            return Err(SessionError::InvalidDecision {
                decision: Decision::AcceptAll,
                state: self.state,
                reason: "accept_all requires auto-apply mode".to_string(),
            });
        }

        self.transition(SessionState::Applying);
        let mut applied = 0;
        let mut skipped = 0;

        while let Some(index) = self.next_pending(self.cursor) {
            self.cursor = index;
            match self.commit(index) {
                Ok(Commit::Applied) => applied += 1,
                Ok(Commit::Skipped) => skipped += 1,
                Err(source) => {
                    let remaining = self.count(CandidateStatus::Pending);
                    tracing::error!(
                        session_id = %self.id,
                        applied,
                        remaining,
                        error = %source,
                        "Batch apply halted"
                    );
                    self.transition(SessionState::Reviewing);
                    return Err(SessionError::BatchHalted {
                        applied,
                        remaining,
                        source,
                    });
                }
            }
        }

        tracing::info!(session_id = %self.id, applied, skipped, "Applied all candidates");
        self.advance();
        Ok(self.state)
    }

    /// Apply candidate `index` if its live text still matches.
    ///
    /// Errors only on an invalid range; the document is unchanged then.
    fn commit(&mut self, index: usize) -> Result<Commit, DocumentError> {
        let revision = self.document.revision();
        let candidate = &self.candidates[index];
        let location = candidate.location;
        let proposed = candidate.proposed_text.clone();

        let skip = if candidate.revision != revision {
            Some(SkipReason::OutOfDate)
        } else if self.document.slice(&location)? != candidate.original_text {
            Some(SkipReason::TextChanged)
        } else {
            None
        };
        if let Some(reason) = skip {
            let candidate = &mut self.candidates[index];
            candidate.status = CandidateStatus::Stale;
            candidate.skip_reason = Some(reason);
            tracing::debug!(session_id = %self.id, candidate = %candidate.id, ?reason, "Skipped candidate");
            return Ok(Commit::Skipped);
        }

        let applied = self.document.apply_replacement(
            location.paragraph,
            location.start,
            location.end,
            &proposed,
        )?;

        let candidate = &mut self.candidates[index];
        candidate.status = CandidateStatus::Applied;
        candidate.revision = applied.revision;
        tracing::debug!(
            session_id = %self.id,
            candidate = %candidate.id,
            revision = applied.revision,
            "Applied candidate"
        );

        reconcile(&applied, &mut self.candidates);
        Ok(Commit::Applied)
    }

    fn next_pending(&self, from: usize) -> Option<usize> {
        self.candidates
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, candidate)| candidate.is_pending())
            .map(|(index, _)| index)
    }

    /// Move the cursor to the next pending candidate, completing the session
    /// when none is left.
    fn advance(&mut self) {
        match self.next_pending(self.cursor) {
            Some(index) => {
                self.cursor = index;
                self.transition(SessionState::Reviewing);
            }
            None => {
                self.cursor = self.candidates.len();
                self.transition(SessionState::Completed);
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        tracing::debug!(session_id = %self.id, from = ?self.state, to = ?next, "Session transition");
        self.state = next;
    }
}
