//! Judge service collaborator
//!
//! A judge model reads a prompt and several of its responses and returns
//! structured 0-10 scores plus the issues it noticed.

pub mod openai_judge;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::records::ResponseRecord;

pub use openai_judge::{OpenAiJudge, DEFAULT_CHAT_ENDPOINT, DEFAULT_JUDGE_MODEL};

pub const SIMILARITY_WEIGHT: f64 = 0.4;
pub const TECHNICAL_WEIGHT: f64 = 0.4;
pub const COHERENCE_WEIGHT: f64 = 0.2;

/// Upper bound of every judge score
pub const MAX_JUDGE_SCORE: f64 = 10.0;

/// Structured verdict for one prompt group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeEvaluation {
    pub prompt: String,
    pub category: String,
    pub response_count: usize,
    /// How alike the responses are in meaning (0-10)
    pub similarity_score: f64,
    /// Whether the content is factually and technically right (0-10)
    pub technical_correctness: f64,
    /// Whether each response reads as a coherent whole (0-10)
    pub coherence_score: f64,
    /// The prompt invites varied answers, so divergence is expected
    pub creativity_expected: bool,
    pub issues_detected: Vec<String>,
    pub legitimate_variations: Vec<String>,
    /// Unparsed model output, kept for auditing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl JudgeEvaluation {
    /// `0.4 * similarity + 0.4 * technical + 0.2 * coherence` (0-10)
    pub fn overall_score(&self) -> f64 {
        SIMILARITY_WEIGHT * self.similarity_score
            + TECHNICAL_WEIGHT * self.technical_correctness
            + COHERENCE_WEIGHT * self.coherence_score
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Overall: {:.2}/10 | Similarity: {:.1} | Technical: {:.1} | Coherence: {:.1} | Issues: {}",
            self.overall_score(),
            self.similarity_score,
            self.technical_correctness,
            self.coherence_score,
            self.issues_detected.len()
        )
    }
}

/// Clamp a raw judge score into 0-10
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, MAX_JUDGE_SCORE)
}

/// Unified trait for judge backends
#[async_trait::async_trait]
pub trait JudgeBackend: Send + Sync {
    /// Name shown in logs
    fn name(&self) -> &str;

    /// Evaluate the responses given to one prompt
    async fn evaluate(
        &self,
        prompt: &str,
        category: &str,
        responses: &[&ResponseRecord],
    ) -> Result<JudgeEvaluation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(similarity: f64, technical: f64, coherence: f64) -> JudgeEvaluation {
        JudgeEvaluation {
            prompt: "p".to_string(),
            category: "short".to_string(),
            response_count: 3,
            similarity_score: similarity,
            technical_correctness: technical,
            coherence_score: coherence,
            creativity_expected: false,
            issues_detected: vec![],
            legitimate_variations: vec![],
            raw_response: None,
        }
    }

    #[test]
    fn test_overall_score() {
        let eval = evaluation(8.0, 6.0, 10.0);
        assert!((eval.overall_score() - 7.6).abs() < 1e-9);
        assert_eq!(evaluation(10.0, 10.0, 10.0).overall_score(), 10.0);
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(11.5), 10.0);
        assert_eq!(clamp_score(-1.0), 0.0);
        assert_eq!(clamp_score(7.25), 7.25);
        assert_eq!(clamp_score(f64::NAN), 0.0);
    }

    #[test]
    fn test_format_summary() {
        let summary = evaluation(8.0, 6.0, 10.0).format_summary();
        assert!(summary.starts_with("Overall: 7.60/10"));
    }
}
