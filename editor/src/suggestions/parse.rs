//! Extracting fixes from a completion response.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use shared_types::Suggestion;

use super::SuggestionError;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\[.*?\])\s*```").expect("valid regex"));

static RAW_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[\s*\{.*\}\s*\]").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct RawFix {
    #[serde(default, alias = "excerpt", alias = "original", alias = "find")]
    search: String,
    #[serde(default, alias = "replacement", alias = "fix")]
    replace: String,
    #[serde(default, alias = "reason", alias = "explanation")]
    rationale: Option<String>,
    #[serde(default, alias = "context", alias = "location_hint")]
    location: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a JSON array of fixes out of free-form model output.
///
/// A fenced ```json block is preferred; otherwise the outermost bare
/// `[{...}]` array is used. Entries with an empty search or an unchanged
/// replacement are dropped.
pub fn parse_fixes(response: &str) -> Result<Vec<Suggestion>, SuggestionError> {
    let json = FENCED_JSON
        .captures(response)
        .and_then(|caps| caps.get(1))
        .or_else(|| RAW_ARRAY.find(response))
        .map(|m| m.as_str())
        .or_else(|| {
            let trimmed = response.trim();
            (trimmed == "[]").then_some(trimmed)
        })
        .ok_or_else(|| SuggestionError::InvalidResponse("no JSON array of fixes found".to_string()))?;

    let raw: Vec<RawFix> = serde_json::from_str(json)
        .map_err(|e| SuggestionError::InvalidResponse(format!("malformed fixes JSON: {e}")))?;

    Ok(raw
        .into_iter()
        .filter_map(|fix| {
            let search = fix.search.trim().to_string();
            let replace = fix.replace.trim().to_string();
            if search.is_empty() || search == replace {
                return None;
            }
            Some(Suggestion {
                excerpt: search,
                replacement: replace,
                rationale: non_empty(fix.rationale),
                location_hint: non_empty(fix.location),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_fenced_block() {
        let response = r#"Here you go:
```json
[{"search": "teh", "replace": "the", "rationale": "typo"}]
```
Also consider [{"search": "ignored", "replace": "x"}]"#;
        let fixes = parse_fixes(response).unwrap();
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].excerpt, "teh");
        assert_eq!(fixes[0].rationale.as_deref(), Some("typo"));
    }

    #[test]
    fn test_falls_back_to_bare_array() {
        let response = r#"Fixes: [{"original": " recieve ", "replacement": "receive", "context": "to recieve it"}] done"#;
        let fixes = parse_fixes(response).unwrap();
        assert_eq!(fixes[0].excerpt, "recieve");
        assert_eq!(fixes[0].replacement, "receive");
        assert_eq!(fixes[0].location_hint.as_deref(), Some("to recieve it"));
    }

    #[test]
    fn test_drops_noop_and_empty_entries() {
        let response = r#"```json
[{"search": "", "replace": "x"}, {"search": "same", "replace": "same"}, {"search": "a", "replace": "b"}]
```"#;
        let fixes = parse_fixes(response).unwrap();
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].excerpt, "a");
    }

    #[test]
    fn test_empty_array_is_valid() {
        assert!(parse_fixes("[]").unwrap().is_empty());
        assert!(parse_fixes("```json\n[]\n```").unwrap().is_empty());
    }

    #[test]
    fn test_prose_without_json_is_invalid() {
        assert!(matches!(
            parse_fixes("Looks great, no changes needed!"),
            Err(SuggestionError::InvalidResponse(_))
        ));
    }
}
