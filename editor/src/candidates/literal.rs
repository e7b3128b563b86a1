//! Literal find/replace strategy.

use regex::{Regex, RegexBuilder};
use shared_types::{CandidateLocation, CandidateSource, LiteralRule, MatchOptions};

use super::{into_candidates, CandidateDraft, CandidateSet};
use crate::document::Document;

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn build_matcher(search: &str, options: MatchOptions) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&regex::escape(search))
        .case_insensitive(!options.case_sensitive)
        .build()
}

fn stands_alone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

fn scan(matcher: &Regex, text: &str, whole_word: bool) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut pos = 0;

    while pos <= text.len() {
        let Some(found) = matcher.find_at(text, pos) else {
            break;
        };
        if found.start() == found.end() {
            break;
        }
        if whole_word && !stands_alone(text, found.start(), found.end()) {
            // Retry one character further so a shorter standalone match
            // starting inside this one is still found.
            pos = text[found.start()..]
                .char_indices()
                .nth(1)
                .map(|(offset, _)| found.start() + offset)
                .unwrap_or(text.len() + 1);
            continue;
        }
        spans.push((found.start(), found.end()));
        pos = found.end();
    }

    spans
}

/// Non-overlapping byte spans of `search` in `text`, left to right.
pub fn find_occurrences(text: &str, search: &str, options: MatchOptions) -> Vec<(usize, usize)> {
    if search.is_empty() {
        return Vec::new();
    }
    match build_matcher(search, options) {
        Ok(matcher) => scan(&matcher, text, options.whole_word),
        Err(e) => {
            tracing::warn!(search, error = %e, "Failed to build literal matcher");
            Vec::new()
        }
    }
}

/// One candidate per occurrence of each rule, merged into document order.
///
/// Rules are scanned independently, so occurrences of different rules may
/// overlap; the reconciler marks the later ones stale once an earlier one is
/// applied.
pub fn generate_literal(
    document: &Document,
    rules: &[LiteralRule],
    options: MatchOptions,
) -> CandidateSet {
    let mut drafts = Vec::new();
    let mut warnings = Vec::new();

    for rule in rules {
        if rule.search.is_empty() {
            warnings.push("Skipped a rule with empty search text".to_string());
            continue;
        }
        if rule.search == rule.replace {
            warnings.push(format!(
                "Skipped rule '{}': replacement is identical",
                rule.search
            ));
            continue;
        }
        let matcher = match build_matcher(&rule.search, options) {
            Ok(matcher) => matcher,
            Err(e) => {
                warnings.push(format!("Skipped rule '{}': {e}", rule.search));
                continue;
            }
        };

        for (id, paragraph) in document.paragraph_ids().zip(document.paragraphs()) {
            let text = paragraph.text();
            for (start, end) in scan(&matcher, &text, options.whole_word) {
                drafts.push(CandidateDraft {
                    location: CandidateLocation::new(id, start, end),
                    original_text: text[start..end].to_string(),
                    proposed_text: rule.replace.clone(),
                    source: CandidateSource::Literal,
                    rationale: None,
                });
            }
        }
    }

    tracing::debug!(
        rules = rules.len(),
        candidates = drafts.len(),
        warnings = warnings.len(),
        "Generated literal candidates"
    );

    CandidateSet {
        candidates: into_candidates(drafts, document.revision()),
        unmapped: 0,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ParagraphId;

    fn opts(case_sensitive: bool, whole_word: bool) -> MatchOptions {
        MatchOptions {
            case_sensitive,
            whole_word,
        }
    }

    #[test]
    fn test_finds_all_non_overlapping_occurrences() {
        assert_eq!(
            find_occurrences("aaaa", "aa", MatchOptions::default()),
            vec![(0, 2), (2, 4)]
        );
        assert_eq!(
            find_occurrences("The cat sat. The cat ran.", "cat", MatchOptions::default()),
            vec![(4, 7), (17, 20)]
        );
    }

    #[test]
    fn test_case_policy() {
        let text = "Cat cat CAT";
        assert_eq!(find_occurrences(text, "cat", opts(true, false)), vec![(4, 7)]);
        assert_eq!(find_occurrences(text, "cat", opts(false, false)).len(), 3);
    }

    #[test]
    fn test_whole_word_policy() {
        let text = "cat concat cat_like cats cat.";
        assert_eq!(
            find_occurrences(text, "cat", opts(true, true)),
            vec![(0, 3), (25, 28)]
        );
        assert_eq!(find_occurrences(text, "cat", opts(true, false)).len(), 5);
    }

    #[test]
    fn test_whole_word_retries_inside_rejected_match() {
        // First "aa" at 0 is glued to the next "a"; the standalone one is at 4.
        assert_eq!(
            find_occurrences("aaa aa", "aa", opts(true, true)),
            vec![(4, 6)]
        );
    }

    #[test]
    fn test_search_is_literal_not_a_pattern() {
        assert_eq!(
            find_occurrences("cost is $5.00 (net)", "$5.00 (net)", MatchOptions::default()),
            vec![(8, 19)]
        );
        assert!(find_occurrences("abc", "a.c", MatchOptions::default()).is_empty());
    }

    #[test]
    fn test_generate_orders_candidates_across_rules() {
        let doc = Document::from_plain_text("alpha beta\ngamma alpha");
        let set = generate_literal(
            &doc,
            &[LiteralRule::new("alpha", "A"), LiteralRule::new("beta", "B")],
            MatchOptions::default(),
        );

        let spans: Vec<_> = set
            .candidates
            .iter()
            .map(|c| (c.location.paragraph, c.location.start, c.proposed_text.as_str()))
            .collect();
        assert_eq!(
            spans,
            vec![
                (ParagraphId(0), 0, "A"),
                (ParagraphId(0), 6, "B"),
                (ParagraphId(1), 6, "A"),
            ]
        );
        assert_eq!(
            set.candidates.iter().map(|c| c.id.0).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(set.warnings.is_empty());
    }

    #[test]
    fn test_case_insensitive_keeps_live_text_as_original() {
        let doc = Document::from_plain_text("Teh end");
        let set = generate_literal(&doc, &[LiteralRule::new("teh", "The")], opts(false, false));
        assert_eq!(set.candidates[0].original_text, "Teh");
    }

    #[test]
    fn test_degenerate_rules_become_warnings() {
        let doc = Document::from_plain_text("same text");
        let set = generate_literal(
            &doc,
            &[LiteralRule::new("", "x"), LiteralRule::new("same", "same")],
            MatchOptions::default(),
        );
        assert!(set.is_empty());
        assert_eq!(set.warnings.len(), 2);
    }
}
