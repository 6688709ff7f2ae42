//! Embedding-based semantic consistency
//!
//! For one prompt group: embed the complete responses in a single batch, build
//! the pairwise cosine similarity matrix, and judge the group consistent when
//! the mean off-diagonal similarity reaches [`SIMILARITY_THRESHOLD`].

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use crate::embedders::EmbedderBackend;
use crate::records::ResponseRecord;
use crate::scoring::{preview, PROMPT_PREVIEW_LEN};

/// Mean similarity a consistent group must reach
pub const SIMILARITY_THRESHOLD: f64 = 0.70;
/// Minimum similarity below which a group has an outlier response
pub const OUTLIER_THRESHOLD: f64 = 0.50;

/// Cosine similarity; 0.0 for mismatched lengths or zero-norm vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Square symmetric matrix of pairwise similarities in [0, 1]
///
/// The diagonal is always 1.0. Negative cosines are clamped to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimilarityMatrix {
    values: Vec<Vec<f64>>,
}

impl SimilarityMatrix {
    pub fn from_embeddings(embeddings: &[Vec<f32>]) -> Self {
        let n = embeddings.len();
        let mut values = vec![vec![0.0; n]; n];

        for i in 0..n {
            values[i][i] = 1.0;
            for j in (i + 1)..n {
                let sim = cosine_similarity(&embeddings[i], &embeddings[j]).clamp(0.0, 1.0);
                values[i][j] = sim;
                values[j][i] = sim;
            }
        }

        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values.get(i).and_then(|row| row.get(j)).copied()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Upper-triangle entries, one per unordered pair
    pub fn pairwise(&self) -> impl Iterator<Item = f64> + '_ {
        self.values
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().skip(i + 1).copied())
    }

    /// Mean off-diagonal similarity (0.0 with fewer than two rows)
    pub fn average(&self) -> f64 {
        let (sum, count) = self.pairwise().fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    pub fn min(&self) -> f64 {
        self.pairwise().reduce(f64::min).unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.pairwise().reduce(f64::max).unwrap_or(0.0)
    }
}

/// Embedding similarity analysis of one prompt group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticAnalysisResult {
    pub prompt: String,
    pub category: String,
    /// Responses analyzed (complete ones, or the whole group when insufficient)
    pub response_count: usize,
    pub avg_similarity: f64,
    pub min_similarity: f64,
    pub max_similarity: f64,
    pub is_consistent: bool,
    /// False when fewer than two complete responses were available
    pub sufficient_data: bool,
    pub similarity_matrix: SimilarityMatrix,
    pub issues: Vec<String>,
}

impl SemanticAnalysisResult {
    fn insufficient(prompt: &str, category: &str, response_count: usize) -> Self {
        Self {
            prompt: prompt.to_string(),
            category: category.to_string(),
            response_count,
            avg_similarity: 0.0,
            min_similarity: 0.0,
            max_similarity: 0.0,
            is_consistent: false,
            sufficient_data: false,
            similarity_matrix: SimilarityMatrix { values: Vec::new() },
            issues: vec!["Insufficient data for analysis".to_string()],
        }
    }
}

/// Semantic scorer backed by an embedding service
pub struct EmbeddingSemanticScorer<'a> {
    embedder: &'a dyn EmbedderBackend,
}

impl<'a> EmbeddingSemanticScorer<'a> {
    pub fn new(embedder: &'a dyn EmbedderBackend) -> Self {
        Self { embedder }
    }

    /// Analyze one prompt group
    ///
    /// Service failures and malformed embedding batches are returned as errors
    /// for the caller to skip.
    pub async fn analyze_group(&self, prompt: &str, records: &[&ResponseRecord]) -> Result<SemanticAnalysisResult> {
        ensure!(!records.is_empty(), "Cannot analyze an empty prompt group");
        let category = records[0].category();

        let texts: Vec<String> = records
            .iter()
            .filter(|r| r.is_complete())
            .map(|r| r.response().to_string())
            .collect();

        if texts.len() < 2 {
            tracing::debug!(
                "Prompt '{}' has {} complete responses, skipping embeddings",
                preview(prompt, PROMPT_PREVIEW_LEN),
                texts.len()
            );
            return Ok(SemanticAnalysisResult::insufficient(prompt, category, records.len()));
        }

        let batch = self.embedder.embed_batch(&texts).await?;
        if batch.embeddings.len() != texts.len() {
            bail!(
                "{} returned {} embeddings for {} responses",
                self.embedder.name(),
                batch.embeddings.len(),
                texts.len()
            );
        }
        let dims = batch.embeddings[0].len();
        if batch.embeddings.iter().any(|e| e.len() != dims) {
            bail!("{} returned embeddings of inconsistent dimension", self.embedder.name());
        }

        let matrix = SimilarityMatrix::from_embeddings(&batch.embeddings);
        let avg_similarity = matrix.average();
        let min_similarity = matrix.min();
        let max_similarity = matrix.max();
        let is_consistent = avg_similarity >= SIMILARITY_THRESHOLD;

        let mut issues = Vec::new();
        if avg_similarity < SIMILARITY_THRESHOLD {
            issues.push(format!(
                "Low average similarity ({:.3}) is {:.3} below threshold ({:.2})",
                avg_similarity,
                SIMILARITY_THRESHOLD - avg_similarity,
                SIMILARITY_THRESHOLD
            ));
        }
        if min_similarity < OUTLIER_THRESHOLD {
            issues.push(format!(
                "Very low minimum similarity ({:.3}) indicates outlier responses",
                min_similarity
            ));
        }

        tracing::debug!(
            "Prompt '{}': {} responses, avg similarity {:.3} in {:?}",
            preview(prompt, PROMPT_PREVIEW_LEN),
            texts.len(),
            avg_similarity,
            batch.duration
        );

        Ok(SemanticAnalysisResult {
            prompt: prompt.to_string(),
            category: category.to_string(),
            response_count: texts.len(),
            avg_similarity,
            min_similarity,
            max_similarity,
            is_consistent,
            sufficient_data: true,
            similarity_matrix: matrix,
            issues,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedders::{BatchEmbeddingResult, EmbedderConfig};
    use crate::records::{RecordDraft, TruncationReason};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns a fixed vector per known text and counts calls
    struct ScriptedEmbedder {
        config: EmbedderConfig,
        vectors: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
        drop_one: bool,
    }

    impl ScriptedEmbedder {
        fn new(vectors: &[(&str, Vec<f32>)]) -> Self {
            Self {
                config: EmbedderConfig {
                    name: "scripted".to_string(),
                    backend: "test".to_string(),
                    model: "scripted".to_string(),
                    dimensions: 2,
                    endpoint: None,
                },
                vectors: vectors.iter().map(|(t, v)| (t.to_string(), v.clone())).collect(),
                calls: AtomicUsize::new(0),
                drop_one: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl EmbedderBackend for ScriptedEmbedder {
        fn config(&self) -> &EmbedderConfig {
            &self.config
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<BatchEmbeddingResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut embeddings: Vec<Vec<f32>> = texts
                .iter()
                .map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| vec![0.0, 0.0]))
                .collect();
            if self.drop_one {
                embeddings.pop();
            }
            Ok(BatchEmbeddingResult::timed(embeddings, Duration::from_millis(1)))
        }
    }

    fn record(response: &str) -> ResponseRecord {
        RecordDraft::new("prompt")
            .with_category("short")
            .with_response(response)
            .build()
            .unwrap()
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        let d = vec![1.0, 2.0, 3.0];
        let e = vec![-2.0, 0.5, 4.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&a, &c).abs() < 1e-9);
        assert!((cosine_similarity(&d, &d) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&d, &e), cosine_similarity(&e, &d));
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[test]
    fn test_similarity_matrix() {
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]];
        let matrix = SimilarityMatrix::from_embeddings(&embeddings);

        assert_eq!(matrix.len(), 4);
        for i in 0..4 {
            assert_eq!(matrix.get(i, i), Some(1.0));
            for j in 0..4 {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
            }
        }
        // Opposite vectors clamp to 0
        assert_eq!(matrix.get(0, 3), Some(0.0));
        assert_eq!(matrix.pairwise().count(), 6);
        assert_eq!(matrix.max(), 1.0);
        assert_eq!(matrix.min(), 0.0);
        assert!((matrix.average() - 1.0 / 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_consistent_group() {
        let embedder = ScriptedEmbedder::new(&[("a", vec![1.0, 0.0]), ("b", vec![0.9, 0.1])]);
        let records = vec![record("a"), record("b")];
        let refs: Vec<&ResponseRecord> = records.iter().collect();

        let result = EmbeddingSemanticScorer::new(&embedder)
            .analyze_group("prompt", &refs)
            .await
            .unwrap();

        assert!(result.sufficient_data);
        assert!(result.is_consistent);
        assert!(result.avg_similarity > 0.99);
        assert!(result.issues.is_empty());
        assert_eq!(result.category, "short");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inconsistent_group_reports_outlier() {
        let embedder = ScriptedEmbedder::new(&[
            ("a", vec![1.0, 0.0]),
            ("b", vec![1.0, 0.0]),
            ("c", vec![0.0, 1.0]),
        ]);
        let records = vec![record("a"), record("b"), record("c")];
        let refs: Vec<&ResponseRecord> = records.iter().collect();

        let result = EmbeddingSemanticScorer::new(&embedder)
            .analyze_group("prompt", &refs)
            .await
            .unwrap();

        assert!(!result.is_consistent);
        assert!((result.avg_similarity - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.issues.len(), 2);
        assert!(result.issues[0].contains("below threshold"));
        assert!(result.issues[1].contains("outlier"));
    }

    #[tokio::test]
    async fn test_single_complete_response_skips_service() {
        let embedder = ScriptedEmbedder::new(&[]);
        let records = vec![
            record("complete"),
            RecordDraft::new("prompt")
                .with_response("partial")
                .truncated_by(TruncationReason::Timeout)
                .build()
                .unwrap(),
            RecordDraft::new("prompt").without_response().build().unwrap(),
        ];
        let refs: Vec<&ResponseRecord> = records.iter().collect();

        let result = EmbeddingSemanticScorer::new(&embedder)
            .analyze_group("prompt", &refs)
            .await
            .unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(!result.is_consistent);
        assert!(!result.sufficient_data);
        assert_eq!(result.avg_similarity, 0.0);
        assert_eq!(result.issues, vec!["Insufficient data for analysis".to_string()]);
    }

    #[tokio::test]
    async fn test_short_batch_is_error() {
        let mut embedder = ScriptedEmbedder::new(&[("a", vec![1.0, 0.0]), ("b", vec![1.0, 0.0])]);
        embedder.drop_one = true;
        let records = vec![record("a"), record("b")];
        let refs: Vec<&ResponseRecord> = records.iter().collect();

        let result = EmbeddingSemanticScorer::new(&embedder).analyze_group("prompt", &refs).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_zero_vectors_are_not_errors() {
        let embedder = ScriptedEmbedder::new(&[]);
        let records = vec![record("x"), record("y")];
        let refs: Vec<&ResponseRecord> = records.iter().collect();

        let result = EmbeddingSemanticScorer::new(&embedder)
            .analyze_group("prompt", &refs)
            .await
            .unwrap();
        assert_eq!(result.avg_similarity, 0.0);
        assert!(!result.is_consistent);
    }

    #[tokio::test]
    async fn test_analyze_group_order_independent() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let embedder = ScriptedEmbedder::new(&[
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.8, 0.6]),
            ("c", vec![0.0, 1.0]),
            ("d", vec![0.6, 0.8]),
        ]);
        let records = vec![record("a"), record("b"), record("c"), record("d")];
        let forward: Vec<&ResponseRecord> = records.iter().collect();
        let mut reversed = forward.clone();
        reversed.reverse();
        let mut shuffled = forward.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(7));

        let scorer = EmbeddingSemanticScorer::new(&embedder);
        let expected = scorer.analyze_group("prompt", &forward).await.unwrap();
        for order in [reversed, shuffled] {
            let result = scorer.analyze_group("prompt", &order).await.unwrap();
            assert!((result.avg_similarity - expected.avg_similarity).abs() < 1e-9);
            assert!((result.min_similarity - expected.min_similarity).abs() < 1e-9);
            assert!((result.max_similarity - expected.max_similarity).abs() < 1e-9);
            assert_eq!(result.is_consistent, expected.is_consistent);
            assert_eq!(result.response_count, expected.response_count);
        }
    }
}
