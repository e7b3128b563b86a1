//! Session request/error value types.

use serde::{Deserialize, Serialize};
use shared_types::{Decision, LiteralRule, MatchOptions, SessionId, SessionState};

use crate::document::DocumentError;
use crate::suggestions::Instruction;

/// How candidates are generated for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    Literal {
        rules: Vec<LiteralRule>,
        /// Falls back to the configured case/whole-word policy
        #[serde(default)]
        options: Option<MatchOptions>,
    },
    Suggested { instruction: Instruction },
}

impl Strategy {
    pub fn literal(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self::Literal {
            rules: vec![LiteralRule::new(search, replace)],
            options: None,
        }
    }

    pub fn suggested(instruction: Instruction) -> Self {
        Self::Suggested { instruction }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Session {0} is busy, retry later")]
    Busy(SessionId),

    #[error("Decision {decision:?} not allowed in state {state:?}: {reason}")]
    InvalidDecision {
        decision: Decision,
        state: SessionState,
        reason: String,
    },

    #[error("Session {0} has not completed")]
    NotCompleted(SessionId),

    #[error("Session already finished ({0:?})")]
    Terminal(SessionState),

    #[error("Edit could not be applied: {0}")]
    Range(#[from] DocumentError),

    #[error("Batch halted after {applied} applied edits, {remaining} remaining: {source}")]
    BatchHalted {
        applied: usize,
        remaining: usize,
        source: DocumentError,
    },
}

impl SessionError {
    /// The caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}
