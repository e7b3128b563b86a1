//! Offset reconciliation after a committed edit.
//!
//! Every candidate carries the document revision its location is valid
//! against. Reconciling against an [`AppliedEdit`] moves candidates from
//! revision `n - 1` to `n`: later candidates in the same paragraph shift by the
//! edit's delta, overlapping ones go stale. Candidates already at `n` are left
//! alone, so running the same pass twice changes nothing.

use shared_types::{CandidateStatus, EditCandidate, SkipReason};

use crate::document::AppliedEdit;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub shifted: usize,
    pub staled: usize,
}

pub fn reconcile(applied: &AppliedEdit, remaining: &mut [EditCandidate]) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    let delta = applied.delta();
    let target = &applied.location;

    for candidate in remaining.iter_mut() {
        if !matches!(
            candidate.status,
            CandidateStatus::Pending | CandidateStatus::Accepted
        ) {
            continue;
        }
        if candidate.revision >= applied.revision {
            continue;
        }

        if candidate.revision + 1 < applied.revision {
            mark_stale(candidate, SkipReason::OutOfDate);
            outcome.staled += 1;
        } else if candidate.location.overlaps(target) {
            mark_stale(candidate, SkipReason::OverlappedPriorEdit);
            outcome.staled += 1;
        } else if candidate.location.paragraph == target.paragraph
            && candidate.location.start >= target.end
            && delta != 0
        {
            candidate.location.start = shift(candidate.location.start, delta);
            candidate.location.end = shift(candidate.location.end, delta);
            outcome.shifted += 1;
        }
        candidate.revision = applied.revision;
    }

    if outcome.staled > 0 {
        tracing::debug!(
            paragraph = %target.paragraph,
            start = target.start,
            end = target.end,
            staled = outcome.staled,
            "Candidates overlapped an applied edit"
        );
    }

    outcome
}

fn mark_stale(candidate: &mut EditCandidate, reason: SkipReason) {
    candidate.status = CandidateStatus::Stale;
    candidate.skip_reason = Some(reason);
}

fn shift(offset: usize, delta: isize) -> usize {
    offset.saturating_add_signed(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{CandidateId, CandidateLocation, CandidateSource, ParagraphId};

    fn candidate(id: u32, paragraph: usize, start: usize, end: usize) -> EditCandidate {
        EditCandidate {
            id: CandidateId(id),
            location: CandidateLocation::new(ParagraphId(paragraph), start, end),
            original_text: "x".repeat(end - start),
            proposed_text: String::new(),
            source: CandidateSource::Literal,
            status: CandidateStatus::Pending,
            revision: 0,
            skip_reason: None,
            rationale: None,
        }
    }

    fn applied(paragraph: usize, start: usize, end: usize, inserted_len: usize) -> AppliedEdit {
        AppliedEdit {
            location: CandidateLocation::new(ParagraphId(paragraph), start, end),
            inserted_len,
            revision: 1,
        }
    }

    #[test]
    fn test_later_candidates_shift_by_delta() {
        let mut remaining = vec![candidate(1, 0, 0, 2), candidate(2, 0, 10, 13)];
        let outcome = reconcile(&applied(0, 4, 7, 5), &mut remaining);

        assert_eq!(outcome, ReconcileOutcome { shifted: 1, staled: 0 });
        assert_eq!((remaining[0].location.start, remaining[0].location.end), (0, 2));
        assert_eq!((remaining[1].location.start, remaining[1].location.end), (12, 15));
        assert!(remaining.iter().all(|c| c.revision == 1));
    }

    #[test]
    fn test_overlapping_candidates_go_stale() {
        let mut remaining = vec![candidate(1, 0, 5, 9), candidate(2, 0, 7, 8)];
        let outcome = reconcile(&applied(0, 4, 7, 1), &mut remaining);

        assert_eq!(outcome.staled, 1);
        assert_eq!(remaining[0].status, CandidateStatus::Stale);
        assert_eq!(
            remaining[0].skip_reason,
            Some(SkipReason::OverlappedPriorEdit)
        );
        assert_eq!(remaining[1].status, CandidateStatus::Pending);
        assert_eq!((remaining[1].location.start, remaining[1].location.end), (5, 6));
    }

    #[test]
    fn test_other_paragraphs_keep_offsets() {
        let mut remaining = vec![candidate(1, 1, 0, 3)];
        reconcile(&applied(0, 0, 3, 10), &mut remaining);
        assert_eq!((remaining[0].location.start, remaining[0].location.end), (0, 3));
        assert_eq!(remaining[0].revision, 1);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let edit = applied(0, 0, 3, 6);
        let mut remaining = vec![candidate(1, 0, 4, 6), candidate(2, 0, 1, 2)];
        reconcile(&edit, &mut remaining);
        let once = remaining.clone();
        let second = reconcile(&edit, &mut remaining);

        assert_eq!(second, ReconcileOutcome::default());
        assert_eq!(remaining, once);
    }

    #[test]
    fn test_candidates_behind_by_more_than_one_revision_go_stale() {
        let mut remaining = vec![candidate(1, 0, 20, 22)];
        let edit = AppliedEdit {
            revision: 3,
            ..applied(0, 0, 1, 1)
        };
        reconcile(&edit, &mut remaining);
        assert_eq!(remaining[0].status, CandidateStatus::Stale);
        assert_eq!(remaining[0].skip_reason, Some(SkipReason::OutOfDate));
    }

    #[test]
    fn test_decided_candidates_are_ignored() {
        let mut rejected = candidate(1, 0, 10, 12);
        rejected.status = CandidateStatus::Rejected;
        let mut remaining = vec![rejected];
        reconcile(&applied(0, 0, 2, 8), &mut remaining);
        assert_eq!(remaining[0].location.start, 10);
        assert_eq!(remaining[0].revision, 0);
    }
}
