//! FastEmbed backend implementation
//!
//! Local ONNX models via fastembed-rs. Useful for offline runs and for
//! multilingual response sets where the hosted model is not wanted.

use anyhow::{anyhow, Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::traits::{BatchEmbeddingResult, EmbedderBackend, EmbedderConfig};

/// Supported local models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastEmbedModel {
    /// BAAI/bge-small-en-v1.5 (384 dims)
    BgeSmallEnV15,
    /// intfloat/multilingual-e5-base (768 dims) - 100+ languages
    MultilingualE5Base,
    /// intfloat/multilingual-e5-large (1024 dims) - 100+ languages
    MultilingualE5Large,
}

impl FastEmbedModel {
    /// Convert to fastembed's EmbeddingModel enum
    pub fn to_fastembed_model(&self) -> EmbeddingModel {
        match self {
            Self::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
            Self::MultilingualE5Base => EmbeddingModel::MultilingualE5Base,
            Self::MultilingualE5Large => EmbeddingModel::MultilingualE5Large,
        }
    }

    /// Responses are embedded as passages; E5 models expect the prefix
    pub fn format_passage(&self, text: &str) -> String {
        match self {
            Self::MultilingualE5Base | Self::MultilingualE5Large => format!("passage: {}", text),
            Self::BgeSmallEnV15 => text.to_string(),
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            Self::BgeSmallEnV15 => 384,
            Self::MultilingualE5Base => 768,
            Self::MultilingualE5Large => 1024,
        }
    }

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::BgeSmallEnV15 => "BGE-small-en-v1.5",
            Self::MultilingualE5Base => "Multilingual-E5-Base",
            Self::MultilingualE5Large => "Multilingual-E5-Large",
        }
    }

    /// Get model identifier (for config)
    pub fn model_id(&self) -> &'static str {
        match self {
            Self::BgeSmallEnV15 => "BAAI/bge-small-en-v1.5",
            Self::MultilingualE5Base => "intfloat/multilingual-e5-base",
            Self::MultilingualE5Large => "intfloat/multilingual-e5-large",
        }
    }

    /// Parse a model id or short name (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "baai/bge-small-en-v1.5" | "bge-small-en-v1.5" | "bge-small" => Some(Self::BgeSmallEnV15),
            "intfloat/multilingual-e5-base" | "multilingual-e5-base" | "e5-base" => Some(Self::MultilingualE5Base),
            "intfloat/multilingual-e5-large" | "multilingual-e5-large" | "e5-large" => Some(Self::MultilingualE5Large),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::BgeSmallEnV15, Self::MultilingualE5Base, Self::MultilingualE5Large]
    }
}

/// FastEmbed backend for ONNX-based embeddings
pub struct FastEmbedBackend {
    model: Arc<Mutex<TextEmbedding>>,
    config: EmbedderConfig,
    model_type: FastEmbedModel,
}

impl FastEmbedBackend {
    /// Load the model, downloading weights on first use
    pub fn new(model_type: FastEmbedModel) -> Result<Self> {
        tracing::info!("Initializing FastEmbed model: {}", model_type.name());

        let start = Instant::now();
        let init_options = InitOptions::new(model_type.to_fastembed_model()).with_show_download_progress(true);
        let model = TextEmbedding::try_new(init_options)
            .with_context(|| format!("Failed to initialize FastEmbed model: {}", model_type.name()))?;
        let load_duration = start.elapsed();

        tracing::info!("FastEmbed model {} loaded in {:?}", model_type.name(), load_duration);

        let config = EmbedderConfig {
            name: format!("fastembed-{}", model_type.name()),
            backend: "fastembed".to_string(),
            model: model_type.model_id().to_string(),
            dimensions: model_type.dimensions(),
            endpoint: None,
        };

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            config,
            model_type,
        })
    }
}

#[async_trait::async_trait]
impl EmbedderBackend for FastEmbedBackend {
    fn config(&self) -> &EmbedderConfig {
        &self.config
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<BatchEmbeddingResult> {
        if texts.is_empty() {
            return Ok(BatchEmbeddingResult::empty());
        }

        let passages: Vec<String> = texts.iter().map(|t| self.model_type.format_passage(t)).collect();
        let model = Arc::clone(&self.model);

        // fastembed is synchronous
        let (result, duration): (Result<Vec<Vec<f32>>>, Duration) = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let embeddings = match model.lock() {
                Ok(mut guard) => guard.embed(passages, None).context("Failed to generate batch embeddings"),
                Err(_) => Err(anyhow!("FastEmbed model lock poisoned")),
            };
            (embeddings, start.elapsed())
        })
        .await?;

        Ok(BatchEmbeddingResult::timed(result?, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_lookup() {
        for model in FastEmbedModel::all() {
            assert_eq!(FastEmbedModel::from_str(model.model_id()), Some(model));
        }
        assert_eq!(FastEmbedModel::from_str("E5-LARGE"), Some(FastEmbedModel::MultilingualE5Large));
        assert_eq!(FastEmbedModel::from_str("unknown"), None);
    }

    #[test]
    fn test_passage_prefix() {
        assert_eq!(FastEmbedModel::MultilingualE5Base.format_passage("hola"), "passage: hola");
        assert_eq!(FastEmbedModel::BgeSmallEnV15.format_passage("hi"), "hi");
    }

    #[tokio::test]
    #[ignore] // Requires model download
    async fn test_fastembed_batch() {
        let backend = FastEmbedBackend::new(FastEmbedModel::BgeSmallEnV15).unwrap();
        assert_eq!(backend.dimensions(), 384);

        let texts = vec!["First text".to_string(), "Second text".to_string()];
        let result = backend.embed_batch(&texts).await.unwrap();
        assert_eq!(result.embeddings.len(), 2);
        assert_eq!(result.embeddings[0].len(), 384);
    }
}
