//! Structural consistency: length spread, markup usage, language mixing
//!
//! Scored per prompt group. Groups with fewer than two responses are skipped
//! and do not count toward the dimension mean.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{preview, IssueSeverity, PROMPT_PREVIEW_LEN};
use crate::records::{PromptGroups, ResponseRecord};
use crate::stats;

/// Relative length spread above which a group is penalized
pub const LENGTH_VARIATION_THRESHOLD: f64 = 0.5;
/// Relative length spread above which the length issue is high severity
pub const LENGTH_VARIATION_HIGH: f64 = 0.8;

const LENGTH_PENALTY: f64 = 0.10;
const MARKUP_PENALTY: f64 = 0.15;
const LANGUAGE_PENALTY: f64 = 0.20;

const MARKUP_MARKERS: [&str; 4] = ["```", "**", "##", "- "];

const SPANISH_MARKERS: [&str; 11] = ["el", "la", "los", "las", "de", "que", "es", "un", "una", "para", "con"];
const ENGLISH_MARKERS: [&str; 10] = ["the", "is", "are", "of", "to", "and", "a", "in", "that", "have"];

/// Dominant language of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Spanish,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Spanish => "spanish",
        }
    }
}

/// Classify by counting space-delimited function words; ties go to English
pub fn detect_language(text: &str) -> Language {
    let lowered = text.to_lowercase();
    let hits = |markers: &[&str]| {
        markers
            .iter()
            .filter(|word| lowered.contains(&format!(" {} ", word)))
            .count()
    };

    if hits(&SPANISH_MARKERS) > hits(&ENGLISH_MARKERS) {
        Language::Spanish
    } else {
        Language::English
    }
}

/// Whether the text uses fenced code, bold, headings or bullets
pub fn contains_markup(text: &str) -> bool {
    MARKUP_MARKERS.iter().any(|marker| text.contains(marker))
}

/// What a structural issue found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralFinding {
    LengthVariation {
        min_length: usize,
        max_length: usize,
        avg_length: f64,
        variation: f64,
    },
    InconsistentMarkup {
        markup_count: usize,
        total_count: usize,
    },
    LanguageMixing {
        /// Responses per detected language
        languages: BTreeMap<String, usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralIssue {
    pub prompt: String,
    pub description: String,
    pub severity: IssueSeverity,
    pub finding: StructuralFinding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralResult {
    /// Mean of evaluated group scores; 1.0 when no group qualified
    pub score: f64,
    pub evaluated_groups: usize,
    pub issues: Vec<StructuralIssue>,
}

/// Score one prompt group, returning the clamped score and its issues
pub fn score_group(prompt: &str, records: &[&ResponseRecord]) -> (f64, Vec<StructuralIssue>) {
    let prompt_preview = preview(prompt, PROMPT_PREVIEW_LEN);
    let mut score = 1.0;
    let mut issues = Vec::new();

    // Length spread
    let lengths: Vec<usize> = records.iter().map(|r| r.response_length()).collect();
    let as_f64: Vec<f64> = lengths.iter().map(|&l| l as f64).collect();
    let avg_length = stats::mean(&as_f64);
    let min_length = lengths.iter().copied().min().unwrap_or(0);
    let max_length = lengths.iter().copied().max().unwrap_or(0);
    let variation = if avg_length > 0.0 {
        (max_length - min_length) as f64 / avg_length
    } else {
        0.0
    };

    if variation > LENGTH_VARIATION_THRESHOLD {
        score -= LENGTH_PENALTY;
        issues.push(StructuralIssue {
            prompt: prompt_preview.clone(),
            description: format!(
                "Response length varies by {:.0}% of the mean ({}..{} chars)",
                variation * 100.0,
                min_length,
                max_length
            ),
            severity: if variation > LENGTH_VARIATION_HIGH {
                IssueSeverity::High
            } else {
                IssueSeverity::Medium
            },
            finding: StructuralFinding::LengthVariation {
                min_length,
                max_length,
                avg_length,
                variation,
            },
        });
    }

    // Markup usage
    let markup_count = records.iter().filter(|r| contains_markup(r.response())).count();
    if markup_count > 0 && markup_count < records.len() {
        score -= MARKUP_PENALTY;
        issues.push(StructuralIssue {
            prompt: prompt_preview.clone(),
            description: format!(
                "Inconsistent formatting: {} of {} responses use markup",
                markup_count,
                records.len()
            ),
            severity: IssueSeverity::Medium,
            finding: StructuralFinding::InconsistentMarkup {
                markup_count,
                total_count: records.len(),
            },
        });
    }

    // Language mixing
    let mut languages: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        *languages
            .entry(detect_language(record.response()).name().to_string())
            .or_insert(0) += 1;
    }
    if languages.len() > 1 {
        score -= LANGUAGE_PENALTY;
        let breakdown: Vec<String> = languages.iter().map(|(lang, n)| format!("{}={}", lang, n)).collect();
        issues.push(StructuralIssue {
            prompt: prompt_preview,
            description: format!("Mixed response languages: {}", breakdown.join(", ")),
            severity: IssueSeverity::High,
            finding: StructuralFinding::LanguageMixing { languages },
        });
    }

    (f64::max(score, 0.0), issues)
}

pub fn score_structure(groups: &PromptGroups<'_>) -> StructuralResult {
    let mut scores = Vec::new();
    let mut issues = Vec::new();

    for (prompt, records) in groups {
        if records.len() < 2 {
            continue;
        }
        let (score, group_issues) = score_group(prompt, records);
        scores.push(score);
        issues.extend(group_issues);
    }

    StructuralResult {
        score: if scores.is_empty() { 1.0 } else { stats::mean(&scores) },
        evaluated_groups: scores.len(),
        issues,
    }
}
