use serde::Deserialize;
use shared_types::{MatchOptions, SessionMode};
use std::time::Duration;

use crate::segmenter::DEFAULT_ABBREVIATIONS;

/// Upper bound for the idle warning and timeout settings (one year)
pub const MAX_SESSION_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Literal matches respect case
    pub case_sensitive: bool,
    /// Literal matches must not touch a letter, digit or underscore
    pub whole_word: bool,
    pub mode: SessionMode,
    /// Minimum similarity (0..=1) for a fuzzy suggestion match
    pub suggestion_match_threshold: f64,
    /// Idle time after which a session is cancelled
    pub session_timeout_seconds: u64,
    /// Idle time after which the owner is warned of the coming timeout
    pub session_warning_seconds: u64,
    /// Words that never end a sentence (lowercase, no trailing period)
    pub abbreviations: Vec<String>,
    /// Document text sent to the suggestion backend is cut at this many chars
    pub max_suggestion_chars: usize,
    pub suggestion_timeout_seconds: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            whole_word: false,
            mode: SessionMode::ManualStep,
            suggestion_match_threshold: 0.8,
            session_timeout_seconds: 420,
            session_warning_seconds: 300,
            abbreviations: DEFAULT_ABBREVIATIONS.iter().map(|s| (*s).to_string()).collect(),
            max_suggestion_chars: 15_000,
            suggestion_timeout_seconds: 120,
        }
    }
}

impl EditorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, falling back to defaults for missing keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let default_abbreviations: Vec<&str> =
            defaults.abbreviations.iter().map(String::as_str).collect();

        let config = Self {
            case_sensitive: env_parse(&lookup, "EDITOR_CASE_SENSITIVE", defaults.case_sensitive)?,
            whole_word: env_parse(&lookup, "EDITOR_WHOLE_WORD", defaults.whole_word)?,
            mode: env_parse(&lookup, "EDITOR_MODE", defaults.mode)?,
            suggestion_match_threshold: env_parse(
                &lookup,
                "EDITOR_SUGGESTION_MATCH_THRESHOLD",
                defaults.suggestion_match_threshold,
            )?,
            session_timeout_seconds: env_parse(
                &lookup,
                "EDITOR_SESSION_TIMEOUT_SECS",
                defaults.session_timeout_seconds,
            )?,
            session_warning_seconds: env_parse(
                &lookup,
                "EDITOR_SESSION_WARNING_SECS",
                defaults.session_warning_seconds,
            )?,
            abbreviations: env_csv(&lookup, "EDITOR_ABBREVIATIONS", &default_abbreviations),
            max_suggestion_chars: env_parse(
                &lookup,
                "EDITOR_MAX_SUGGESTION_CHARS",
                defaults.max_suggestion_chars,
            )?,
            suggestion_timeout_seconds: env_parse(
                &lookup,
                "EDITOR_SUGGESTION_TIMEOUT_SECS",
                defaults.suggestion_timeout_seconds,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| anyhow::anyhow!("Invalid editor config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.suggestion_match_threshold) {
            anyhow::bail!(
                "suggestion_match_threshold must be within [0, 1], got {}",
                self.suggestion_match_threshold
            );
        }
        if self.session_timeout_seconds == 0 {
            anyhow::bail!("session_timeout_seconds must be positive");
        }
        if self.session_timeout_seconds > MAX_SESSION_SECONDS {
            anyhow::bail!(
                "session_timeout_seconds must be at most {MAX_SESSION_SECONDS}, got {}",
                self.session_timeout_seconds
            );
        }
        if self.session_warning_seconds >= self.session_timeout_seconds {
            anyhow::bail!(
                "session_warning_seconds ({}) must be less than session_timeout_seconds ({})",
                self.session_warning_seconds,
                self.session_timeout_seconds
            );
        }
        Ok(())
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            case_sensitive: self.case_sensitive,
            whole_word: self.whole_word,
        }
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_seconds)
    }

    pub fn session_warning(&self) -> Duration {
        Duration::from_secs(self.session_warning_seconds)
    }

    pub fn suggestion_timeout(&self) -> Duration {
        Duration::from_secs(self.suggestion_timeout_seconds)
    }
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        None => Ok(default),
    }
}

fn env_csv(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &[&str]) -> Vec<String> {
    match lookup(key) {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        None => default.iter().map(|s| (*s).to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = EditorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.session_timeout(), Duration::from_secs(420));
        assert!(config.abbreviations.iter().any(|a| a == "dr"));
    }

    #[test]
    fn test_env_overrides() {
        let config = EditorConfig::from_lookup(lookup(&[
            ("EDITOR_CASE_SENSITIVE", "false"),
            ("EDITOR_WHOLE_WORD", "true"),
            ("EDITOR_MODE", "auto"),
            ("EDITOR_SUGGESTION_MATCH_THRESHOLD", "0.65"),
            ("EDITOR_ABBREVIATIONS", "approx, ca ,"),
        ]))
        .unwrap();
        assert!(!config.case_sensitive);
        assert!(config.whole_word);
        assert_eq!(config.mode, SessionMode::AutoApply);
        assert_eq!(config.suggestion_match_threshold, 0.65);
        assert_eq!(config.abbreviations, vec!["approx", "ca"]);
    }

    #[test]
    fn test_bad_values_are_reported() {
        let err = EditorConfig::from_lookup(lookup(&[("EDITOR_SESSION_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("EDITOR_SESSION_TIMEOUT_SECS"));

        assert!(EditorConfig::from_lookup(lookup(&[("EDITOR_SUGGESTION_MATCH_THRESHOLD", "1.5")]))
            .is_err());
        assert!(EditorConfig::from_lookup(lookup(&[("EDITOR_SESSION_WARNING_SECS", "500")])).is_err());
    }

    #[test]
    fn test_oversized_timeouts_are_rejected() {
        let huge = EditorConfig {
            session_timeout_seconds: u64::MAX,
            ..Default::default()
        };
        assert!(huge.validate().is_err());

        let past_chrono_range = EditorConfig {
            session_timeout_seconds: 10_000_000_000_000_000,
            ..Default::default()
        };
        assert!(past_chrono_range.validate().is_err());

        assert!(EditorConfig::from_lookup(lookup(&[(
            "EDITOR_SESSION_TIMEOUT_SECS",
            "18446744073709551615"
        )]))
        .is_err());

        let at_cap = EditorConfig {
            session_timeout_seconds: MAX_SESSION_SECONDS,
            ..Default::default()
        };
        assert!(at_cap.validate().is_ok());
    }

    #[test]
    fn test_toml_fills_missing_fields_with_defaults() {
        let config = EditorConfig::from_toml_str(
            r#"
mode = "auto_apply"
whole_word = true
session_timeout_seconds = 900
"#,
        )
        .unwrap();
        assert_eq!(config.mode, SessionMode::AutoApply);
        assert!(config.whole_word);
        assert_eq!(config.session_timeout_seconds, 900);
        assert_eq!(config.session_warning_seconds, 300);
        assert_eq!(config.max_suggestion_chars, 15_000);
    }
}
