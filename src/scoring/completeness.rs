//! Completeness: how many responses arrived in full

use std::borrow::Borrow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::IssueSeverity;
use crate::records::{ResponseRecord, TruncationReason, TruncationStats};

/// Truncation share above which the issue is reported as high severity
pub const HIGH_SEVERITY_TRUNCATION_RATE: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessIssue {
    pub description: String,
    pub severity: IssueSeverity,
    pub affected_count: usize,
    /// Truncated records per reason
    pub reasons: BTreeMap<TruncationReason, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessResult {
    /// `1 - truncation_rate`; 1.0 for an empty input
    pub score: f64,
    pub total_count: usize,
    pub truncated_count: usize,
    pub truncation_rate: f64,
    pub issues: Vec<CompletenessIssue>,
}

pub fn score_completeness<R: Borrow<ResponseRecord>>(records: &[R]) -> CompletenessResult {
    let stats = TruncationStats::from_records(records);

    let mut issues = Vec::new();
    if stats.truncated > 0 {
        let severity = if stats.truncated as f64 > stats.total as f64 * HIGH_SEVERITY_TRUNCATION_RATE {
            IssueSeverity::High
        } else {
            IssueSeverity::Medium
        };

        issues.push(CompletenessIssue {
            description: format!(
                "{} of {} responses truncated ({:.1}%)",
                stats.truncated,
                stats.total,
                stats.truncation_rate * 100.0
            ),
            severity,
            affected_count: stats.truncated,
            reasons: stats.by_reason.clone(),
        });
    }

    CompletenessResult {
        score: 1.0 - stats.truncation_rate,
        total_count: stats.total,
        truncated_count: stats.truncated,
        truncation_rate: stats.truncation_rate,
        issues,
    }
}
