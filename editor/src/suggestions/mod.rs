//! Suggestion backend capability.
//!
//! The engine only needs `suggest(text, instruction) -> suggestions`. Any
//! failure is a [`SuggestionError`], which sessions recover from as zero
//! candidates plus a warning.

mod completion;
mod parse;

pub use completion::{CompletionSuggestionProvider, TextCompletion};
pub use parse::parse_fixes;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::Suggestion;
use std::sync::Arc;
use std::time::Duration;

pub type SharedSuggestionProvider = Arc<dyn SuggestionProvider>;

const FIX_FORMAT: &str = "Respond with a JSON array inside a ```json block. Each element is an object with \"search\" (the exact text as it appears in the document), \"replace\" (the corrected text), an optional \"rationale\", and an optional \"location\" (a few surrounding words). Return [] if nothing needs fixing.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    /// Spelling, grammar and punctuation only
    Grammar,
    /// Clarity, consistency and structure, as well as grammar
    FullReview,
    /// Concrete fixes for issues found in an earlier review
    Fixes,
    Custom(String),
}

impl Instruction {
    pub fn system_prompt(&self) -> String {
        let task = match self {
            Self::Grammar => "You are a meticulous copy editor. Find spelling, grammar and punctuation errors in the document. Do not rewrite style or content.",
            Self::FullReview => "You are an experienced editor. Review the document for grammar, clarity, consistency and awkward phrasing. Propose minimal edits that keep the author's voice.",
            Self::Fixes => "You are an editor applying an approved review. Turn each issue into a precise text replacement.",
            Self::Custom(request) => request.as_str(),
        };
        format!("{task}\n\n{FIX_FORMAT}")
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SuggestionError {
    #[error("Suggestion backend unavailable: {0}")]
    Unavailable(String),

    #[error("Suggestion backend timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid suggestion response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    async fn suggest(
        &self,
        text: &str,
        instruction: &Instruction,
    ) -> Result<Vec<Suggestion>, SuggestionError>;
}

/// Returns a fixed list, optionally after a delay
#[derive(Debug, Clone, Default)]
pub struct StaticSuggestionProvider {
    suggestions: Vec<Suggestion>,
    delay: Option<Duration>,
}

impl StaticSuggestionProvider {
    pub fn new(suggestions: Vec<Suggestion>) -> Self {
        Self {
            suggestions,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SuggestionProvider for StaticSuggestionProvider {
    async fn suggest(
        &self,
        _text: &str,
        _instruction: &Instruction,
    ) -> Result<Vec<Suggestion>, SuggestionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.suggestions.clone())
    }
}

/// Used when no backend is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSuggestions;

#[async_trait]
impl SuggestionProvider for DisabledSuggestions {
    async fn suggest(
        &self,
        _text: &str,
        _instruction: &Instruction,
    ) -> Result<Vec<Suggestion>, SuggestionError> {
        Err(SuggestionError::Unavailable(
            "no suggestion backend configured".to_string(),
        ))
    }
}
