//! Lexical semantic similarity via keyword-set Jaccard overlap
//!
//! Cheap stand-in for embedding similarity: always computed for every prompt
//! group with at least two responses.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{preview, IssueSeverity, PROMPT_PREVIEW_LEN};
use crate::records::{PromptGroups, ResponseRecord};
use crate::stats;

/// Average similarity below which a group is reported
pub const LOW_SIMILARITY_THRESHOLD: f64 = 0.6;
/// Average similarity below which the report is high severity
pub const VERY_LOW_SIMILARITY_THRESHOLD: f64 = 0.4;

/// Minimum token length (exclusive) kept as a keyword
const MIN_KEYWORD_LEN: usize = 3;

const STOPWORDS: [&str; 18] = [
    "the", "is", "are", "and", "or", "but", "with", "for", // english
    "el", "la", "de", "que", "es", "un", "una", "para", "con", "por", // spanish
];

/// Lowercased word runs longer than three characters, minus stop words
///
/// Words are ASCII `[A-Za-z0-9_]` runs; accented letters act as separators.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() > MIN_KEYWORD_LEN)
        .filter(|token| !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Intersection over union; 0.0 when both sets are empty
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Mean Jaccard similarity over all unordered pairs
///
/// Returns 1.0 for fewer than two sets (nothing to disagree with).
pub fn average_pairwise_similarity(sets: &[HashSet<String>]) -> f64 {
    if sets.len() < 2 {
        return 1.0;
    }

    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            total += jaccard_similarity(&sets[i], &sets[j]);
            pairs += 1;
        }
    }
    total / pairs as f64
}

/// Lexical similarity of one prompt group
pub fn group_similarity(records: &[&ResponseRecord]) -> f64 {
    let sets: Vec<HashSet<String>> = records.iter().map(|r| extract_keywords(r.response())).collect();
    average_pairwise_similarity(&sets)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticIssue {
    pub prompt: String,
    pub description: String,
    pub severity: IssueSeverity,
    pub similarity_score: f64,
    pub response_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalResult {
    /// Mean of evaluated group similarities; 1.0 when no group qualified
    pub score: f64,
    pub evaluated_groups: usize,
    pub issues: Vec<SemanticIssue>,
}

pub fn score_semantics(groups: &PromptGroups<'_>) -> LexicalResult {
    let mut scores = Vec::new();
    let mut issues = Vec::new();

    for (prompt, records) in groups {
        if records.len() < 2 {
            continue;
        }

        let similarity = group_similarity(records);
        scores.push(similarity);

        if similarity < LOW_SIMILARITY_THRESHOLD {
            issues.push(SemanticIssue {
                prompt: preview(prompt, PROMPT_PREVIEW_LEN),
                description: format!(
                    "Low lexical similarity ({:.2}) across {} responses",
                    similarity,
                    records.len()
                ),
                severity: if similarity < VERY_LOW_SIMILARITY_THRESHOLD {
                    IssueSeverity::High
                } else {
                    IssueSeverity::Medium
                },
                similarity_score: similarity,
                response_count: records.len(),
            });
        }
    }

    LexicalResult {
        score: if scores.is_empty() { 1.0 } else { stats::mean(&scores) },
        evaluated_groups: scores.len(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{by_prompt, RecordDraft};

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_extract_keywords() {
        let keywords = extract_keywords("The Ownership model: borrowing, ownership and lifetimes for_each!");
        assert_eq!(keywords, set(&["ownership", "model", "borrowing", "lifetimes", "for_each"]));
    }

    #[test]
    fn test_extract_keywords_drops_stopwords_and_short_tokens() {
        assert!(extract_keywords("the is are and or but with for a an").is_empty());
        assert_eq!(extract_keywords("para canción"), set(&["canci"]));
    }

    #[test]
    fn test_accented_letters_split_words() {
        let a = extract_keywords("el niño feliz");
        let b = extract_keywords("el niña feliz");
        assert_eq!(a, set(&["feliz"]));
        assert_eq!(jaccard_similarity(&a, &b), 1.0);
    }

    #[test]
    fn test_jaccard() {
        let a = set(&["rust", "memory"]);
        let b = set(&["python", "garbage"]);
        assert_eq!(jaccard_similarity(&a, &b), 0.0);
        assert_eq!(jaccard_similarity(&a, &a), 1.0);
        assert_eq!(jaccard_similarity(&HashSet::new(), &HashSet::new()), 0.0);

        let c = set(&["rust", "safety"]);
        assert!((jaccard_similarity(&a, &c) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_average_pairwise_similarity() {
        let sets = vec![set(&["alpha", "beta"]), set(&["alpha", "beta"]), set(&["gamma"])];
        // pairs: 1.0, 0.0, 0.0
        assert!((average_pairwise_similarity(&sets) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(average_pairwise_similarity(&sets[..1]), 1.0);
    }

    #[test]
    fn test_order_independent() {
        let responses = ["memory safety without garbage", "ownership gives memory safety", "borrow checker rules"];
        let forward: Vec<ResponseRecord> = responses
            .iter()
            .map(|t| RecordDraft::new("p").with_response(*t).build().unwrap())
            .collect();
        let mut reversed = forward.clone();
        reversed.reverse();

        let a: Vec<&ResponseRecord> = forward.iter().collect();
        let b: Vec<&ResponseRecord> = reversed.iter().collect();
        assert!((group_similarity(&a) - group_similarity(&b)).abs() < 1e-12);
    }

    #[test]
    fn test_score_semantics_issues() {
        let records = vec![
            RecordDraft::new("same").with_response("identical keywords here").build().unwrap(),
            RecordDraft::new("same").with_response("identical keywords here").build().unwrap(),
            RecordDraft::new("diff").with_response("completely unrelated").build().unwrap(),
            RecordDraft::new("diff").with_response("nothing shared whatsoever").build().unwrap(),
            RecordDraft::new("solo").with_response("ignored").build().unwrap(),
        ];
        let result = score_semantics(&by_prompt(&records));

        assert_eq!(result.evaluated_groups, 2);
        assert!((result.score - 0.5).abs() < 1e-12);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].prompt, "diff");
        assert_eq!(result.issues[0].severity, IssueSeverity::High);
        assert_eq!(result.issues[0].response_count, 2);
    }

    #[test]
    fn test_no_qualifying_groups() {
        let records = vec![RecordDraft::new("solo").with_response("x").build().unwrap()];
        let result = score_semantics(&by_prompt(&records));
        assert_eq!(result.score, 1.0);
        assert!(result.issues.is_empty());
    }
}
