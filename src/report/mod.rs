//! Quality report model
//!
//! The quality report combines the heuristic consistency dimensions with the
//! sampled embedding and judge analyses, per-category and per-phase breakdowns,
//! anomalies and descriptive statistics.

pub mod comparison;
pub mod generator;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::anomaly::{AnomalyReport, RecordStatistics};
use crate::records::{CategoryGroups, PhaseGroups, ResponseRecord, TestPhase};
use crate::scoring::{preview, ConsistencyReport};
use crate::stats;

pub use comparison::{HeadlineSummary, ReportHeadline, RunComparison};
pub use generator::QualityReportGenerator;

/// Latency at which the category latency score reaches zero
pub const CATEGORY_LATENCY_CEILING_MS: f64 = 20_000.0;

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub truncation_rate: f64,
    /// Aggregate keyword-overlap similarity
    pub avg_similarity_jaccard: f64,
    /// Mean embedding similarity over groups with sufficient data
    pub avg_similarity_embeddings: Option<f64>,
    /// Mean judge score (0-10) over judged prompts
    pub avg_llm_judge_score: Option<f64>,
    pub prompts_analyzed: usize,
    pub prompts_judged: usize,
}

/// Quality entry for one sampled prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptQualityScore {
    pub prompt: String,
    pub category: String,
    pub responses_count: usize,
    pub truncation_rate: f64,
    pub avg_response_time_ms: f64,
    pub similarity_jaccard: f64,
    pub similarity_embeddings: Option<f64>,
    pub min_similarity: Option<f64>,
    pub max_similarity: Option<f64>,
    pub is_consistent: Option<bool>,
    pub llm_judge_score: Option<f64>,
    pub issues: Vec<String>,
}

impl PromptQualityScore {
    pub fn format_line(&self) -> String {
        let embedding = self
            .similarity_embeddings
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "-".to_string());
        let judge = self
            .llm_judge_score
            .map(|s| format!("{:.1}/10", s))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{:<42} {:>4} resp | trunc {:>5.1}% | jaccard {:.3} | embed {} | judge {}",
            preview(&self.prompt, 40),
            self.responses_count,
            self.truncation_rate * 100.0,
            self.similarity_jaccard,
            embedding,
            judge
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub response_count: usize,
    pub truncation_rate: f64,
    pub avg_response_time_ms: f64,
    /// Mean embedding similarity of this category's analyzed prompts
    pub avg_similarity: Option<f64>,
    /// `(0.7 * (1 - truncation) + 0.3 * latency_score) * 10`
    pub score: f64,
}

/// Category quality on a 0-10 scale, penalizing truncation and latency
pub fn category_quality_score(truncation_rate: f64, avg_response_time_ms: f64) -> f64 {
    let truncation_score = 1.0 - truncation_rate;
    let latency_score = (1.0 - avg_response_time_ms / CATEGORY_LATENCY_CEILING_MS).max(0.0);
    (truncation_score * 0.7 + latency_score * 0.3) * 10.0
}

/// Per-category stats, joined with the embedding similarity of analyzed prompts
pub fn category_stats(groups: &CategoryGroups<'_>, prompt_scores: &[PromptQualityScore]) -> BTreeMap<String, CategoryStats> {
    groups
        .iter()
        .map(|(category, records)| {
            let truncation_rate = stats::truncation_rate(records);
            let avg_response_time_ms = stats::average_latency_ms(records);
            let similarities: Vec<f64> = prompt_scores
                .iter()
                .filter(|p| &p.category == category)
                .filter_map(|p| p.similarity_embeddings)
                .collect();

            let entry = CategoryStats {
                response_count: records.len(),
                truncation_rate,
                avg_response_time_ms,
                avg_similarity: (!similarities.is_empty()).then(|| stats::mean(&similarities)),
                score: category_quality_score(truncation_rate, avg_response_time_ms),
            };
            (category.clone(), entry)
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseStats {
    pub response_count: usize,
    pub avg_response_time_ms: f64,
    pub avg_ttft_ms: f64,
    pub truncation_rate: f64,
}

impl PhaseStats {
    pub fn from_records(records: &[&ResponseRecord]) -> Self {
        Self {
            response_count: records.len(),
            avg_response_time_ms: stats::average_latency_ms(records),
            avg_ttft_ms: stats::average_ttft_ms(records),
            truncation_rate: stats::truncation_rate(records),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseComparison {
    pub ramp: PhaseStats,
    pub steady: PhaseStats,
    /// `(steady - ramp) / ramp * 100` over average latency; 0 without ramp latency
    pub latency_degradation_percent: f64,
}

impl PhaseComparison {
    pub fn from_phases(phases: &PhaseGroups<'_>) -> Self {
        let ramp = phases
            .get(&Some(TestPhase::Ramp))
            .map(|records| PhaseStats::from_records(records))
            .unwrap_or_default();
        let steady = phases
            .get(&Some(TestPhase::Steady))
            .map(|records| PhaseStats::from_records(records))
            .unwrap_or_default();

        let latency_degradation_percent = if ramp.avg_response_time_ms > 0.0 {
            (steady.avg_response_time_ms - ramp.avg_response_time_ms) / ramp.avg_response_time_ms * 100.0
        } else {
            0.0
        };

        Self {
            ramp,
            steady,
            latency_degradation_percent,
        }
    }
}

// =============================================================================
// REPORT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// RFC 3339 generation time
    pub timestamp: String,
    pub global_consistency_score: f64,
    pub total_requests: usize,
    pub unique_prompts: usize,
    pub summary: ReportSummary,
    pub dimensions: ConsistencyReport,
    pub by_prompt: Vec<PromptQualityScore>,
    pub by_category: BTreeMap<String, CategoryStats>,
    pub by_phase: PhaseComparison,
    pub anomalies: AnomalyReport,
    pub statistics: RecordStatistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_comparison: Option<RunComparison>,
}

impl QualityReport {
    pub fn headline(&self) -> ReportHeadline {
        ReportHeadline::new(self.global_consistency_score, self.summary.truncation_rate)
    }

    /// Save as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize quality report")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write quality report: {}", path.display()))?;

        Ok(())
    }

    /// Multi-line console summary
    pub fn format_summary(&self) -> String {
        let mut lines = vec![
            format!(
                "Global consistency: {:.3} [{}]",
                self.global_consistency_score,
                self.dimensions.tier().name()
            ),
            format!(
                "Responses: {} across {} prompts | Truncation: {:.1}%",
                self.total_requests,
                self.unique_prompts,
                self.summary.truncation_rate * 100.0
            ),
            format!("Dimensions: {}", self.dimensions.format_summary()),
            format!(
                "Jaccard similarity: {:.3} | Embedding similarity: {} ({} prompts analyzed)",
                self.summary.avg_similarity_jaccard,
                self.summary
                    .avg_similarity_embeddings
                    .map(|s| format!("{:.3}", s))
                    .unwrap_or_else(|| "n/a".to_string()),
                self.summary.prompts_analyzed
            ),
        ];

        if let Some(score) = self.summary.avg_llm_judge_score {
            lines.push(format!(
                "Judge score: {:.1}/10 ({} prompts judged)",
                score, self.summary.prompts_judged
            ));
        }

        lines.push(format!(
            "Phases: ramp {:.0} ms / steady {:.0} ms ({:+.1}%)",
            self.by_phase.ramp.avg_response_time_ms,
            self.by_phase.steady.avg_response_time_ms,
            self.by_phase.latency_degradation_percent
        ));
        lines.push(format!("Anomalies: {}", self.anomalies.format_summary()));

        if let Some(cmp) = &self.run_comparison {
            lines.push(format!("Baseline: {}", cmp.format_summary()));
        }

        lines.push(self.dimensions.summary.clone());
        lines.join("\n")
    }

    /// Lowest-scoring analyzed prompts first
    pub fn weakest_prompts(&self, limit: usize) -> Vec<&PromptQualityScore> {
        let mut scored: Vec<&PromptQualityScore> = self
            .by_prompt
            .iter()
            .filter(|p| p.similarity_embeddings.is_some() || p.llm_judge_score.is_some())
            .collect();
        scored.sort_by(|a, b| {
            let key = |p: &PromptQualityScore| p.similarity_embeddings.unwrap_or(p.similarity_jaccard);
            key(a).total_cmp(&key(b))
        });
        scored.truncate(limit);
        scored
    }
}
