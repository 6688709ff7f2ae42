//! Quality report orchestration
//!
//! Heuristic dimensions are computed over every record. Embedding similarity is
//! computed over a random sample of prompt groups, and the judge over a sample
//! of those, to bound the cost of external calls. A failing group is logged and
//! skipped; only an unreadable input aborts the run.

use anyhow::Result;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;

use super::{category_stats, PhaseComparison, PromptQualityScore, QualityReport, ReportHeadline, ReportSummary, RunComparison};
use crate::anomaly::{AnomalyReport, RecordStatistics};
use crate::config::QualityConfig;
use crate::embedders::{create_embedder, EmbedderBackend};
use crate::judge::{JudgeBackend, OpenAiJudge};
use crate::records::{PromptGroups, RecordStore, ResponseRecord};
use crate::scoring::{lexical, preview, ConsistencyReport, SemanticSelection, PROMPT_PREVIEW_LEN};
use crate::semantic::{EmbeddingSemanticScorer, SemanticAnalysisResult};
use crate::stats;

/// Fraction of prompts sampled for each expensive analysis
pub const SAMPLING_RATE: f64 = 0.30;
/// Sample floor, capped by the population size
pub const MIN_SAMPLE_SIZE: usize = 5;
/// Groups smaller than this are skipped by the sampled analyses
pub const MIN_RESPONSES_FOR_ANALYSIS: usize = 2;

/// `max(MIN_SAMPLE_SIZE, floor(population * SAMPLING_RATE))`, at most `population`
pub fn sample_size(population: usize) -> usize {
    let fraction = (population as f64 * SAMPLING_RATE).floor() as usize;
    fraction.max(MIN_SAMPLE_SIZE).min(population)
}

/// Shuffle-and-take sample
pub fn sample<T: Clone>(items: &[T], rng: &mut StdRng) -> Vec<T> {
    let mut shuffled = items.to_vec();
    shuffled.shuffle(rng);
    shuffled.truncate(sample_size(items.len()));
    shuffled
}

pub struct QualityReportGenerator {
    embedder: Option<Box<dyn EmbedderBackend>>,
    judge: Option<Box<dyn JudgeBackend>>,
    seed: Option<u64>,
    baseline: Option<ReportHeadline>,
}

impl Default for QualityReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityReportGenerator {
    /// Generator with no collaborators: heuristic dimensions only
    pub fn new() -> Self {
        Self {
            embedder: None,
            judge: None,
            seed: None,
            baseline: None,
        }
    }

    /// Build collaborators from configuration
    ///
    /// An enabled collaborator whose API key is missing is an error.
    pub fn from_config(config: &QualityConfig) -> Result<Self> {
        let mut generator = Self::new();

        if config.embedding.enabled {
            generator = generator.with_embedder(create_embedder(&config.embedding)?);
        }

        if config.judge.enabled {
            let settings = &config.judge;
            let judge = OpenAiJudge::new(
                settings.api_key()?,
                settings.endpoint.clone(),
                settings.model.clone(),
                settings.max_tokens,
                settings.timeout(),
            )?;
            tracing::info!("Judge model: {}", judge.model());
            generator = generator.with_judge(Box::new(judge));
        }

        generator.seed = config.sampling.seed;
        Ok(generator)
    }

    pub fn with_embedder(mut self, embedder: Box<dyn EmbedderBackend>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_judge(mut self, judge: Box<dyn JudgeBackend>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_baseline(mut self, baseline: ReportHeadline) -> Self {
        self.baseline = Some(baseline);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Load a JSONL file and generate its report
    pub async fn generate_from_path(&self, path: &Path) -> Result<QualityReport> {
        let store = RecordStore::load(path)?;
        Ok(self.generate(&store).await)
    }

    pub async fn generate(&self, store: &RecordStore) -> QualityReport {
        let mut rng = self.rng();
        let by_prompt = store.by_prompt();
        tracing::info!(
            "Generating quality report for {} responses across {} prompts",
            store.len(),
            by_prompt.len()
        );

        // Sampled embedding analysis
        let prompts: Vec<&str> = by_prompt.keys().map(String::as_str).collect();
        let sampled = sample(&prompts, &mut rng);
        tracing::info!(
            "Sampled {} of {} prompts ({:.0}%)",
            sampled.len(),
            prompts.len(),
            SAMPLING_RATE * 100.0
        );

        let scorer = self.embedder.as_deref().map(|embedder| EmbeddingSemanticScorer::new(embedder));
        let mut semantic_results: Vec<SemanticAnalysisResult> = Vec::new();
        let mut by_prompt_scores: Vec<PromptQualityScore> = Vec::new();

        for prompt in sampled {
            let Some(group) = by_prompt.get(prompt) else {
                continue;
            };
            if group.len() < MIN_RESPONSES_FOR_ANALYSIS {
                tracing::debug!(
                    "Skipping '{}': {} response(s)",
                    preview(prompt, PROMPT_PREVIEW_LEN),
                    group.len()
                );
                continue;
            }

            let semantic = match &scorer {
                Some(scorer) => match scorer.analyze_group(prompt, group).await {
                    Ok(result) => Some(result),
                    Err(e) => {
                        tracing::warn!(
                            "Embedding analysis failed for '{}': {:#}",
                            preview(prompt, PROMPT_PREVIEW_LEN),
                            e
                        );
                        continue;
                    }
                },
                None => None,
            };

            by_prompt_scores.push(prompt_entry(prompt, group, semantic.as_ref()));
            semantic_results.extend(semantic);
        }

        let sufficient: Vec<f64> = semantic_results
            .iter()
            .filter(|r| r.sufficient_data)
            .map(|r| r.avg_similarity)
            .collect();
        let avg_similarity_embeddings = (!sufficient.is_empty()).then(|| stats::mean(&sufficient));
        tracing::info!(
            "Embedding analysis: {} prompts analyzed, {} with sufficient data",
            by_prompt_scores.len(),
            sufficient.len()
        );

        // Judge a sample of the analyzed prompts
        let judge_scores = match &self.judge {
            Some(judge) => self.run_judge(&**judge, &by_prompt, &mut by_prompt_scores, &mut rng).await,
            None => Vec::new(),
        };
        let avg_llm_judge_score = (!judge_scores.is_empty()).then(|| stats::mean(&judge_scores));

        // Heuristic dimensions, with embedding similarity when available
        let selection = match avg_similarity_embeddings {
            Some(score) => SemanticSelection::Embedding { score },
            None => SemanticSelection::Lexical,
        };
        let dimensions = ConsistencyReport::analyze_with(store, selection);

        let summary = ReportSummary {
            truncation_rate: dimensions.completeness_analysis.truncation_rate,
            avg_similarity_jaccard: dimensions.semantic_analysis.score,
            avg_similarity_embeddings,
            avg_llm_judge_score,
            prompts_analyzed: by_prompt_scores.len(),
            prompts_judged: judge_scores.len(),
        };

        let run_comparison = self.baseline.as_ref().map(|baseline| {
            let current = ReportHeadline::new(dimensions.global_consistency_score, summary.truncation_rate);
            RunComparison::between(baseline, &current)
        });

        let report = QualityReport {
            timestamp: Utc::now().to_rfc3339(),
            global_consistency_score: dimensions.global_consistency_score,
            total_requests: store.len(),
            unique_prompts: by_prompt.len(),
            summary,
            by_category: category_stats(&store.by_category(), &by_prompt_scores),
            by_phase: PhaseComparison::from_phases(&store.by_phase()),
            anomalies: AnomalyReport::from_records(store.records()),
            statistics: RecordStatistics::from_records(store.records()),
            by_prompt: by_prompt_scores,
            dimensions,
            run_comparison,
        };

        tracing::info!(
            "Quality report complete: global score {:.3}",
            report.global_consistency_score
        );
        report
    }

    /// Judge a sample of the analyzed entries, returning the scores obtained
    async fn run_judge(
        &self,
        judge: &dyn JudgeBackend,
        by_prompt: &PromptGroups<'_>,
        entries: &mut [PromptQualityScore],
        rng: &mut StdRng,
    ) -> Vec<f64> {
        let indices: Vec<usize> = (0..entries.len()).collect();
        let selected = sample(&indices, rng);
        tracing::info!("Judging {} of {} analyzed prompts with {}", selected.len(), entries.len(), judge.name());

        let mut scores = Vec::new();

        for index in selected {
            let entry = &mut entries[index];
            let Some(group) = by_prompt.get(&entry.prompt) else {
                continue;
            };

            match judge.evaluate(&entry.prompt, &entry.category, group).await {
                Ok(evaluation) => {
                    let overall = evaluation.overall_score();
                    tracing::debug!(
                        "Judged '{}': {}",
                        preview(&entry.prompt, PROMPT_PREVIEW_LEN),
                        evaluation.format_summary()
                    );
                    entry.llm_judge_score = Some(overall);
                    entry.issues.extend(evaluation.issues_detected);
                    scores.push(overall);
                }
                Err(e) => {
                    tracing::warn!(
                        "Judge evaluation failed for '{}': {:#}",
                        preview(&entry.prompt, PROMPT_PREVIEW_LEN),
                        e
                    );
                }
            }
        }

        scores
    }
}

/// Build the per-prompt entry; embedding fields stay empty without a result
fn prompt_entry(prompt: &str, group: &[&ResponseRecord], semantic: Option<&SemanticAnalysisResult>) -> PromptQualityScore {
    let analyzed = semantic.filter(|s| s.sufficient_data);

    PromptQualityScore {
        prompt: prompt.to_string(),
        category: group.first().map(|r| r.category().to_string()).unwrap_or_default(),
        responses_count: group.len(),
        truncation_rate: stats::truncation_rate(group),
        avg_response_time_ms: stats::average_latency_ms(group),
        similarity_jaccard: lexical::group_similarity(group),
        similarity_embeddings: analyzed.map(|s| s.avg_similarity),
        min_similarity: analyzed.map(|s| s.min_similarity),
        max_similarity: analyzed.map(|s| s.max_similarity),
        is_consistent: semantic.map(|s| s.is_consistent),
        llm_judge_score: None,
        issues: semantic.map(|s| s.issues.clone()).unwrap_or_default(),
    }
}
