//! Weighted global consistency score and narrative summary

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{
    score_categories, score_completeness, score_semantics, score_structure, score_temporal, CategoryResult,
    CompletenessResult, LexicalResult, StructuralResult, TemporalResult,
};
use crate::records::RecordStore;

// =============================================================================
// WEIGHTS
// =============================================================================

pub const COMPLETENESS_WEIGHT: f64 = 0.25;
pub const STRUCTURAL_WEIGHT: f64 = 0.25;
pub const SEMANTIC_WEIGHT: f64 = 0.40;
pub const TEMPORAL_WEIGHT: f64 = 0.05;
pub const CATEGORY_WEIGHT: f64 = 0.05;

/// The five dimension scores feeding the global score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub completeness: f64,
    pub structural: f64,
    pub semantic: f64,
    pub temporal: f64,
    pub category: f64,
}

impl DimensionScores {
    pub fn global_score(&self) -> f64 {
        COMPLETENESS_WEIGHT * self.completeness
            + STRUCTURAL_WEIGHT * self.structural
            + SEMANTIC_WEIGHT * self.semantic
            + TEMPORAL_WEIGHT * self.temporal
            + CATEGORY_WEIGHT * self.category
    }
}

// =============================================================================
// SUMMARY
// =============================================================================

/// Qualitative band of a global score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyTier {
    Excellent,
    Acceptable,
    Concerning,
    Critical,
}

impl ConsistencyTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.90 {
            Self::Excellent
        } else if score >= 0.75 {
            Self::Acceptable
        } else if score >= 0.60 {
            Self::Concerning
        } else {
            Self::Critical
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Acceptable => "acceptable",
            Self::Concerning => "concerning",
            Self::Critical => "critical",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent consistency: responses are complete and uniform",
            Self::Acceptable => "Acceptable consistency with minor variations",
            Self::Concerning => "Concerning consistency: noticeable variation between responses",
            Self::Critical => "Critical consistency problems: responses diverge or are incomplete",
        }
    }
}

pub fn generate_summary(
    global_score: f64,
    total_responses: usize,
    truncated_count: usize,
    degradation_detected: bool,
) -> String {
    let mut summary = format!(
        "{} (score {:.1}%). Analyzed {} responses.",
        ConsistencyTier::from_score(global_score).description(),
        global_score * 100.0,
        total_responses
    );

    if truncated_count > 0 {
        summary.push_str(&format!(" {} responses were truncated.", truncated_count));
    }
    if degradation_detected {
        summary.push_str(" Quality degraded between the ramp and steady phases.");
    }

    summary
}

// =============================================================================
// REPORT
// =============================================================================

/// Which semantic scorer fed the global score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticSource {
    Lexical,
    Embedding,
}

/// Semantic input chosen by the calling pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SemanticSelection {
    /// Use the keyword-overlap score
    Lexical,
    /// Use a mean embedding similarity computed elsewhere
    Embedding { score: f64 },
}

/// One heuristic analysis of a full record set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// RFC 3339 time the analysis ran
    pub analysis_timestamp: String,
    pub total_responses: usize,
    pub unique_prompts: usize,
    pub completeness_analysis: CompletenessResult,
    pub structural_analysis: StructuralResult,
    pub semantic_analysis: LexicalResult,
    pub temporal_analysis: TemporalResult,
    pub category_analysis: CategoryResult,
    /// Semantic score actually weighted into the global score
    pub semantic_score: f64,
    pub semantic_source: SemanticSource,
    pub global_consistency_score: f64,
    pub summary: String,
}

impl ConsistencyReport {
    /// Heuristic-only analysis (lexical semantic dimension)
    pub fn analyze(store: &RecordStore) -> Self {
        Self::analyze_with(store, SemanticSelection::Lexical)
    }

    pub fn analyze_with(store: &RecordStore, selection: SemanticSelection) -> Self {
        let by_prompt = store.by_prompt();

        let completeness = score_completeness(store.records());
        let structural = score_structure(&by_prompt);
        let lexical = score_semantics(&by_prompt);
        let temporal = score_temporal(&store.by_phase());
        let category = score_categories(&store.by_category());

        let (semantic_score, semantic_source) = match selection {
            SemanticSelection::Lexical => (lexical.score, SemanticSource::Lexical),
            SemanticSelection::Embedding { score } => (score, SemanticSource::Embedding),
        };

        let dimensions = DimensionScores {
            completeness: completeness.score,
            structural: structural.score,
            semantic: semantic_score,
            temporal: temporal.score,
            category: category.score,
        };
        let global = dimensions.global_score();

        tracing::info!(
            "Consistency: completeness={:.3} structural={:.3} semantic={:.3} ({:?}) temporal={:.3} category={:.3} -> {:.3}",
            dimensions.completeness,
            dimensions.structural,
            dimensions.semantic,
            semantic_source,
            dimensions.temporal,
            dimensions.category,
            global
        );

        let summary = generate_summary(
            global,
            store.len(),
            completeness.truncated_count,
            temporal.degradation_detected,
        );

        Self {
            analysis_timestamp: Utc::now().to_rfc3339(),
            total_responses: store.len(),
            unique_prompts: by_prompt.len(),
            completeness_analysis: completeness,
            structural_analysis: structural,
            semantic_analysis: lexical,
            temporal_analysis: temporal,
            category_analysis: category,
            semantic_score,
            semantic_source,
            global_consistency_score: global,
            summary,
        }
    }

    pub fn dimension_scores(&self) -> DimensionScores {
        DimensionScores {
            completeness: self.completeness_analysis.score,
            structural: self.structural_analysis.score,
            semantic: self.semantic_score,
            temporal: self.temporal_analysis.score,
            category: self.category_analysis.score,
        }
    }

    pub fn tier(&self) -> ConsistencyTier {
        ConsistencyTier::from_score(self.global_consistency_score)
    }

    /// Save as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize consistency report")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write consistency report: {}", path.display()))?;

        Ok(())
    }

    pub fn format_summary(&self) -> String {
        let d = self.dimension_scores();
        format!(
            "Global: {:.3} [{}] | Completeness: {:.3} | Structural: {:.3} | Semantic ({}): {:.3} | Temporal: {:.3} | Category: {:.3}",
            self.global_consistency_score,
            self.tier().name(),
            d.completeness,
            d.structural,
            match self.semantic_source {
                SemanticSource::Lexical => "lexical",
                SemanticSource::Embedding => "embedding",
            },
            d.semantic,
            d.temporal,
            d.category
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{RecordDraft, ResponseRecord, TestPhase, TruncationReason};

    #[test]
    fn test_global_score_weighting() {
        let dims = DimensionScores {
            completeness: 0.8,
            structural: 0.9,
            semantic: 0.7,
            temporal: 1.0,
            category: 1.0,
        };
        assert!((dims.global_score() - 0.805).abs() < 1e-12);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total = COMPLETENESS_WEIGHT + STRUCTURAL_WEIGHT + SEMANTIC_WEIGHT + TEMPORAL_WEIGHT + CATEGORY_WEIGHT;
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tiers() {
        assert_eq!(ConsistencyTier::from_score(0.95), ConsistencyTier::Excellent);
        assert_eq!(ConsistencyTier::from_score(0.90), ConsistencyTier::Excellent);
        assert_eq!(ConsistencyTier::from_score(0.75), ConsistencyTier::Acceptable);
        assert_eq!(ConsistencyTier::from_score(0.60), ConsistencyTier::Concerning);
        assert_eq!(ConsistencyTier::from_score(0.59), ConsistencyTier::Critical);
    }

    #[test]
    fn test_summary_notes() {
        let plain = generate_summary(0.95, 40, 0, false);
        assert!(plain.starts_with("Excellent"));
        assert!(plain.contains("40 responses"));
        assert!(!plain.contains("truncated"));

        let noisy = generate_summary(0.5, 40, 6, true);
        assert!(noisy.starts_with("Critical"));
        assert!(noisy.contains("6 responses were truncated"));
        assert!(noisy.contains("degraded"));
    }

    fn sample_store() -> RecordStore {
        let mut records: Vec<ResponseRecord> = Vec::new();
        for i in 0..4 {
            records.push(
                RecordDraft::new("Explain borrowing")
                    .with_category("short")
                    .with_response("Borrowing lends references without moving ownership")
                    .with_phase(if i < 2 { TestPhase::Ramp } else { TestPhase::Steady })
                    .build()
                    .unwrap(),
            );
        }
        records.push(
            RecordDraft::new("Describe async")
                .with_category("long")
                .with_response("Futures are polled")
                .with_phase(TestPhase::Steady)
                .truncated_by(TruncationReason::Timeout)
                .build()
                .unwrap(),
        );
        RecordStore::from_records(records)
    }

    #[test]
    fn test_analyze_lexical() {
        let report = ConsistencyReport::analyze(&sample_store());
        assert_eq!(report.total_responses, 5);
        assert_eq!(report.unique_prompts, 2);
        assert_eq!(report.semantic_source, SemanticSource::Lexical);
        assert_eq!(report.semantic_score, 1.0);
        assert_eq!(report.completeness_analysis.truncated_count, 1);
        // Steady: 1 of 3 truncated, ramp: 0 of 2
        assert!(report.temporal_analysis.degradation_detected);
        assert!((report.global_consistency_score - report.dimension_scores().global_score()).abs() < 1e-12);
        assert!(report.summary.contains("1 responses were truncated"));
    }

    #[test]
    fn test_analyze_with_embedding_score() {
        let store = sample_store();
        let lexical = ConsistencyReport::analyze(&store);
        let embedded = ConsistencyReport::analyze_with(&store, SemanticSelection::Embedding { score: 0.5 });

        assert_eq!(embedded.semantic_source, SemanticSource::Embedding);
        assert_eq!(embedded.semantic_analysis, lexical.semantic_analysis);
        let expected = lexical.global_consistency_score - SEMANTIC_WEIGHT * 0.5;
        assert!((embedded.global_consistency_score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_save_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("analysis.json");
        let report = ConsistencyReport::analyze(&sample_store());
        report.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["total_responses"], 5);
        assert_eq!(value["semantic_source"], "lexical");
    }
}
