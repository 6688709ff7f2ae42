//! Embedder trait abstraction
//!
//! The semantic scorer only needs "texts in, one vector per text out, same
//! order". Dimension count and model identity are opaque to it.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of a batch embedding operation
#[derive(Debug, Clone)]
pub struct BatchEmbeddingResult {
    /// The embedding vectors, in input order
    pub embeddings: Vec<Vec<f32>>,
    /// Total time taken for the batch
    pub duration: Duration,
    /// Average time per embedding
    pub avg_duration: Duration,
}

impl BatchEmbeddingResult {
    pub fn empty() -> Self {
        Self {
            embeddings: Vec::new(),
            duration: Duration::ZERO,
            avg_duration: Duration::ZERO,
        }
    }

    /// Build from vectors and the wall time of the call
    pub fn timed(embeddings: Vec<Vec<f32>>, duration: Duration) -> Self {
        let avg_duration = if embeddings.is_empty() {
            Duration::ZERO
        } else {
            duration / embeddings.len() as u32
        };
        Self {
            embeddings,
            duration,
            avg_duration,
        }
    }
}

/// Description of an embedder backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// Human-readable name for this configuration
    pub name: String,
    /// Backend type (openai, fastembed)
    pub backend: String,
    /// Model identifier
    pub model: String,
    /// Vector dimensions (0 when only the service knows)
    pub dimensions: usize,
    /// Service endpoint for remote backends
    pub endpoint: Option<String>,
}

/// Unified trait for embedding backends
#[async_trait::async_trait]
pub trait EmbedderBackend: Send + Sync {
    /// Get the configuration for this embedder
    fn config(&self) -> &EmbedderConfig;

    /// Get the name of this embedder configuration
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Get the vector dimensions produced by this embedder
    fn dimensions(&self) -> usize {
        self.config().dimensions
    }

    /// Generate embeddings for a batch of texts in a single call
    ///
    /// Must return exactly one vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<BatchEmbeddingResult>;

    /// Embed a probe text to confirm the backend is reachable
    ///
    /// Returns the dimension of the probe vector.
    async fn test_connection(&self) -> Result<usize> {
        let result = self.embed_batch(&["connection test".to_string()]).await?;
        ensure!(
            result.embeddings.len() == 1,
            "{} returned {} vectors for a single probe text",
            self.name(),
            result.embeddings.len()
        );
        Ok(result.embeddings[0].len())
    }
}

/// Helper to measure duration of an async operation
pub async fn measure_async<F, T>(f: F) -> (T, Duration)
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let result = f.await;
    let duration = start.elapsed();
    (result, duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantEmbedder {
        config: EmbedderConfig,
    }

    #[async_trait::async_trait]
    impl EmbedderBackend for ConstantEmbedder {
        fn config(&self) -> &EmbedderConfig {
            &self.config
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<BatchEmbeddingResult> {
            Ok(BatchEmbeddingResult::timed(
                texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect(),
                Duration::from_millis(30),
            ))
        }
    }

    #[tokio::test]
    async fn test_default_connection_check() {
        let embedder = ConstantEmbedder {
            config: EmbedderConfig {
                name: "constant".to_string(),
                backend: "test".to_string(),
                model: "none".to_string(),
                dimensions: 3,
                endpoint: None,
            },
        };
        assert_eq!(embedder.name(), "constant");
        assert_eq!(embedder.test_connection().await.unwrap(), 3);
    }

    #[test]
    fn test_timed_average() {
        let result = BatchEmbeddingResult::timed(vec![vec![0.0]; 3], Duration::from_millis(30));
        assert_eq!(result.avg_duration, Duration::from_millis(10));
        assert_eq!(BatchEmbeddingResult::empty().avg_duration, Duration::ZERO);
    }
}
