//! OpenAI-compatible embeddings client
//!
//! POSTs `{"model", "input": [texts]}` and reads `data[].embedding`. Any
//! service speaking the same wire format (Azure, local gateways) works by
//! pointing `endpoint` at it.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

use super::traits::{measure_async, BatchEmbeddingResult, EmbedderBackend, EmbedderConfig};

pub const DEFAULT_EMBEDDINGS_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Known output sizes of hosted models; 0 when unknown
pub fn model_dimensions(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
        _ => 0,
    }
}

/// Parse a response body into vectors ordered like the request
fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let response: EmbeddingResponse =
        serde_json::from_str(body).context("Failed to parse embeddings response")?;

    let mut data = response.data;
    if data.len() != expected {
        bail!(
            "Embedding service returned {} vectors for {} inputs",
            data.len(),
            expected
        );
    }

    // Entries carry their input index; fall back to position when absent
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }

    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/// Embedding backend calling an OpenAI-style `/embeddings` endpoint
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    config: EmbedderConfig,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let model = model.into();
        let endpoint = endpoint.into();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for embeddings")?;

        let config = EmbedderConfig {
            name: format!("openai-{}", model),
            backend: "openai".to_string(),
            dimensions: model_dimensions(&model),
            model,
            endpoint: Some(endpoint),
        };

        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(DEFAULT_EMBEDDINGS_ENDPOINT)
    }
}

#[async_trait::async_trait]
impl EmbedderBackend for OpenAiEmbedder {
    fn config(&self) -> &EmbedderConfig {
        &self.config
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<BatchEmbeddingResult> {
        if texts.is_empty() {
            return Ok(BatchEmbeddingResult::empty());
        }

        let request_body = serde_json::json!({
            "model": self.config.model,
            "input": texts,
        });

        let (body, duration) = measure_async(async {
            let response = self
                .client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await
                .with_context(|| format!("Embedding request to {} failed", self.endpoint()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .context("Failed to read embeddings response body")?;

            if !status.is_success() {
                bail!("Embedding service returned error {}: {}", status, text);
            }
            Ok::<String, anyhow::Error>(text)
        })
        .await;

        let embeddings = parse_embeddings(&body?, texts.len())?;

        tracing::debug!(
            "Embedded {} texts with {} in {:?}",
            texts.len(),
            self.config.model,
            duration
        );

        Ok(BatchEmbeddingResult::timed(embeddings, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embeddings_orders_by_index() {
        let body = r#"{"object":"list","data":[
            {"object":"embedding","index":1,"embedding":[0.0,1.0]},
            {"object":"embedding","index":0,"embedding":[1.0,0.0]}
        ],"model":"text-embedding-3-small"}"#;

        let vectors = parse_embeddings(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_embeddings_count_mismatch() {
        let body = r#"{"data":[{"embedding":[1.0]}]}"#;
        let err = parse_embeddings(body, 2).unwrap_err();
        assert!(err.to_string().contains("1 vectors for 2 inputs"));
    }

    #[test]
    fn test_parse_embeddings_rejects_garbage() {
        assert!(parse_embeddings(r#"{"error":{"message":"bad key"}}"#, 1).is_err());
    }

    #[test]
    fn test_model_dimensions() {
        assert_eq!(model_dimensions("text-embedding-3-small"), 1536);
        assert_eq!(model_dimensions("text-embedding-3-large"), 3072);
        assert_eq!(model_dimensions("custom"), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let embedder = OpenAiEmbedder::new(
            "unused",
            "http://127.0.0.1:9/embeddings",
            DEFAULT_EMBEDDING_MODEL,
            Duration::from_secs(1),
        )
        .unwrap();
        let result = embedder.embed_batch(&[]).await.unwrap();
        assert!(result.embeddings.is_empty());
        assert_eq!(embedder.dimensions(), 1536);
    }

    #[tokio::test]
    #[ignore] // Requires OPENAI_API_KEY and network access
    async fn test_openai_live_batch() {
        let key = std::env::var("OPENAI_API_KEY").unwrap();
        let embedder = OpenAiEmbedder::new(
            key,
            DEFAULT_EMBEDDINGS_ENDPOINT,
            DEFAULT_EMBEDDING_MODEL,
            Duration::from_secs(120),
        )
        .unwrap();
        let texts = vec!["First text".to_string(), "Second text".to_string()];
        let result = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(result.embeddings.len(), 2);
        assert_eq!(result.embeddings[0].len(), 1536);
    }
}
