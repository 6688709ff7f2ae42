//! Heuristic consistency scorers
//!
//! Each dimension scorer is a pure function from records (or record groups) to a
//! result struct with a `score` in [0, 1]. [`consistency::ConsistencyReport`]
//! combines the five dimensions into one weighted score.

pub mod category;
pub mod completeness;
pub mod consistency;
pub mod lexical;
pub mod structural;
pub mod temporal;

use serde::{Deserialize, Serialize};

pub use category::{score_categories, CategoryResult, CategoryScore};
pub use completeness::{score_completeness, CompletenessIssue, CompletenessResult};
pub use consistency::{ConsistencyReport, ConsistencyTier, DimensionScores, SemanticSelection, SemanticSource};
pub use lexical::{score_semantics, LexicalResult, SemanticIssue};
pub use structural::{score_structure, Language, StructuralFinding, StructuralIssue, StructuralResult};
pub use temporal::{score_temporal, TemporalResult};

/// Severity attached to dimension issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Medium,
    High,
}

impl IssueSeverity {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Maximum prompt characters quoted in issue reports
pub const PROMPT_PREVIEW_LEN: usize = 60;

/// Shorten text to `max_chars` characters, appending "..." when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
