//! Adapter from a raw text-completion backend to [`SuggestionProvider`].

use async_trait::async_trait;
use shared_types::Suggestion;
use std::time::Duration;

use super::{parse_fixes, Instruction, SuggestionError, SuggestionProvider};

const TRUNCATION_MARKER: &str = "\n\n[... document truncated ...]";

/// A chat/completion model that turns a system prompt and user text into a
/// reply
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String, SuggestionError>;
}

pub struct CompletionSuggestionProvider<C> {
    backend: C,
    max_chars: usize,
    timeout: Duration,
}

impl<C: TextCompletion> CompletionSuggestionProvider<C> {
    pub fn new(backend: C, max_chars: usize, timeout: Duration) -> Self {
        Self {
            backend,
            max_chars,
            timeout,
        }
    }

    /// Cut `text` to at most `max_chars` characters, marking the cut
    fn truncate<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        match text.char_indices().nth(self.max_chars) {
            Some((cut, _)) => {
                tracing::debug!(
                    max_chars = self.max_chars,
                    total_bytes = text.len(),
                    "Truncating document for suggestion request"
                );
                format!("{}{TRUNCATION_MARKER}", &text[..cut]).into()
            }
            None => text.into(),
        }
    }
}

#[async_trait]
impl<C: TextCompletion> SuggestionProvider for CompletionSuggestionProvider<C> {
    async fn suggest(
        &self,
        text: &str,
        instruction: &Instruction,
    ) -> Result<Vec<Suggestion>, SuggestionError> {
        let body = self.truncate(text);
        let system_prompt = instruction.system_prompt();

        let reply = tokio::time::timeout(self.timeout, self.backend.complete(&system_prompt, &body))
            .await
            .map_err(|_| SuggestionError::Timeout(self.timeout.as_secs()))??;

        let fixes = parse_fixes(&reply)?;
        tracing::info!(
            instruction = ?instruction,
            fixes = fixes.len(),
            "Suggestion backend returned fixes"
        );
        Ok(fixes)
    }
}
