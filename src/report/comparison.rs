//! Cross-run comparison of two saved quality reports

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The headline numbers of a saved quality report
///
/// Only these fields are read back, so reports written by older builds with a
/// different section layout still compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportHeadline {
    pub global_consistency_score: f64,
    pub summary: HeadlineSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineSummary {
    pub truncation_rate: f64,
}

impl ReportHeadline {
    pub fn new(global_consistency_score: f64, truncation_rate: f64) -> Self {
        Self {
            global_consistency_score,
            summary: HeadlineSummary { truncation_rate },
        }
    }

    /// Read the headline from a saved report JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read quality report: {}", path.display()))?;
        let headline: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse quality report: {}", path.display()))?;
        Ok(headline)
    }

    pub fn truncation_rate(&self) -> f64 {
        self.summary.truncation_rate
    }
}

/// Baseline run vs current run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunComparison {
    pub baseline_truncation_rate: f64,
    pub current_truncation_rate: f64,
    /// Relative truncation-rate reduction in percent; 0 when the baseline had none
    pub improvement_percentage: f64,
    pub baseline_score: f64,
    pub current_score: f64,
    pub score_delta: f64,
}

impl RunComparison {
    pub fn between(baseline: &ReportHeadline, current: &ReportHeadline) -> Self {
        let baseline_rate = baseline.truncation_rate();
        let current_rate = current.truncation_rate();
        let improvement_percentage = if baseline_rate > 0.0 {
            (baseline_rate - current_rate) / baseline_rate * 100.0
        } else {
            0.0
        };

        Self {
            baseline_truncation_rate: baseline_rate,
            current_truncation_rate: current_rate,
            improvement_percentage,
            baseline_score: baseline.global_consistency_score,
            current_score: current.global_consistency_score,
            score_delta: current.global_consistency_score - baseline.global_consistency_score,
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Truncation: {:.1}% -> {:.1}% ({:+.1}% improvement) | Score: {:.3} -> {:.3} ({:+.3})",
            self.baseline_truncation_rate * 100.0,
            self.current_truncation_rate * 100.0,
            self.improvement_percentage,
            self.baseline_score,
            self.current_score,
            self.score_delta
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improvement() {
        let baseline = ReportHeadline::new(0.70, 0.40);
        let current = ReportHeadline::new(0.85, 0.10);
        let cmp = RunComparison::between(&baseline, &current);

        assert!((cmp.improvement_percentage - 75.0).abs() < 1e-9);
        assert!((cmp.score_delta - 0.15).abs() < 1e-9);
        assert_eq!(cmp.baseline_truncation_rate, 0.40);
        assert_eq!(cmp.current_truncation_rate, 0.10);
    }

    #[test]
    fn test_zero_baseline_truncation() {
        let cmp = RunComparison::between(&ReportHeadline::new(0.9, 0.0), &ReportHeadline::new(0.8, 0.05));
        assert_eq!(cmp.improvement_percentage, 0.0);
        assert!(cmp.score_delta < 0.0);
    }

    #[test]
    fn test_load_ignores_other_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(
            &path,
            r#"{"timestamp":"2026-01-01T00:00:00Z","global_consistency_score":0.812,
               "summary":{"truncation_rate":0.05,"prompts_analyzed":3},"by_prompt":[]}"#,
        )
        .unwrap();

        let headline = ReportHeadline::load(&path).unwrap();
        assert_eq!(headline, ReportHeadline::new(0.812, 0.05));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ReportHeadline::load(&dir.path().join("absent.json")).is_err());
    }
}
