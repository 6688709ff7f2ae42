//! Configuration for the quality report collaborators
//!
//! Defines the `quality.toml` schema. Every section is optional; API keys are
//! never stored in the file, only the name of the environment variable that
//! holds them.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::embedders::openai_backend::{DEFAULT_EMBEDDINGS_ENDPOINT, DEFAULT_EMBEDDING_MODEL};
use crate::judge::{DEFAULT_CHAT_ENDPOINT, DEFAULT_JUDGE_MODEL};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "quality.toml";

/// Which embedding implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    /// OpenAI-compatible HTTP endpoint
    #[default]
    OpenAi,
    /// Local ONNX models (requires the `fastembed` feature)
    FastEmbed,
}

impl EmbeddingBackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::FastEmbed => "fastembed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" | "open-ai" | "api" => Some(Self::OpenAi),
            "fastembed" | "local" | "onnx" => Some(Self::FastEmbed),
            _ => None,
        }
    }
}

/// Quality report configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub judge: JudgeSettings,

    #[serde(default)]
    pub sampling: SamplingSettings,
}

impl QualityConfig {
    /// Load config from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read quality config: {:?}", path))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("Failed to parse quality config: {:?}", path))?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        tracing::info!("No config at {:?}, using defaults", path);
        Ok(Self::default())
    }

    /// Save config to TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write quality config: {:?}", path))?;
        Ok(())
    }

    /// Replace the embedding backend with one named on the command line
    pub fn override_backend(&mut self, name: &str) -> Result<()> {
        let Some(backend) = EmbeddingBackendKind::from_str(name) else {
            bail!("Unknown embedding backend: {} (expected openai or fastembed)", name);
        };
        self.embedding.backend = backend;
        Ok(())
    }
}

/// Embedding service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: EmbeddingBackendKind,

    /// Model id (hosted model name or fastembed model id)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embeddings_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: EmbeddingBackendKind::OpenAi,
            model: default_embedding_model(),
            endpoint: default_embeddings_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingSettings {
    pub fn api_key(&self) -> Result<String> {
        read_api_key(&self.api_key_env)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Judge model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_judge_model")]
    pub model: String,

    #[serde(default = "default_chat_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Completion budget for one evaluation
    #[serde(default = "default_judge_max_tokens")]
    pub max_tokens: u32,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_judge_model(),
            endpoint: default_chat_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_judge_max_tokens(),
        }
    }
}

impl JudgeSettings {
    pub fn api_key(&self) -> Result<String> {
        read_api_key(&self.api_key_env)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Prompt sampling settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingSettings {
    /// Fixed RNG seed for reproducible samples; random when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn read_api_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        Ok(_) => bail!("Environment variable {} is empty", var),
        Err(_) => bail!("Environment variable {} is not set", var),
    }
}

fn default_true() -> bool { true }
fn default_embedding_model() -> String { DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embeddings_endpoint() -> String { DEFAULT_EMBEDDINGS_ENDPOINT.to_string() }
fn default_judge_model() -> String { DEFAULT_JUDGE_MODEL.to_string() }
fn default_chat_endpoint() -> String { DEFAULT_CHAT_ENDPOINT.to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_timeout_secs() -> u64 { 120 }
fn default_judge_max_tokens() -> u32 { 1500 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!(EmbeddingBackendKind::from_str("OpenAI"), Some(EmbeddingBackendKind::OpenAi));
        assert_eq!(EmbeddingBackendKind::from_str("local"), Some(EmbeddingBackendKind::FastEmbed));
        assert_eq!(EmbeddingBackendKind::from_str("invalid"), None);
    }

    #[test]
    fn test_override_backend() {
        let mut config = QualityConfig::default();
        config.override_backend("local").unwrap();
        assert_eq!(config.embedding.backend, EmbeddingBackendKind::FastEmbed);

        assert!(config.override_backend("word2vec").is_err());
        assert_eq!(config.embedding.backend, EmbeddingBackendKind::FastEmbed);
    }

    #[test]
    fn test_defaults() {
        let config = QualityConfig::default();
        assert!(config.embedding.enabled);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.judge.model, "gpt-4o");
        assert_eq!(config.judge.max_tokens, 1500);
        assert_eq!(config.judge.timeout(), Duration::from_secs(120));
        assert_eq!(config.sampling.seed, None);
    }

    #[test]
    fn test_partial_toml() {
        let toml_str = r#"
[embedding]
backend = "fastembed"
model = "intfloat/multilingual-e5-base"

[judge]
enabled = false

[sampling]
seed = 42
"#;
        let config: QualityConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.embedding.backend, EmbeddingBackendKind::FastEmbed);
        assert_eq!(config.embedding.timeout_secs, 120);
        assert!(!config.judge.enabled);
        assert_eq!(config.judge.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.sampling.seed, Some(42));
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: QualityConfig = toml::from_str("").unwrap();
        assert_eq!(config, QualityConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quality.toml");

        let mut config = QualityConfig::default();
        config.sampling.seed = Some(7);
        config.judge.enabled = false;
        config.save(&path).unwrap();

        let loaded = QualityConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = QualityConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, QualityConfig::default());
    }

    #[test]
    fn test_missing_api_key() {
        let settings = EmbeddingSettings {
            api_key_env: "CONSISTENCY_BENCHMARK_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        let err = settings.api_key().unwrap_err();
        assert!(err.to_string().contains("CONSISTENCY_BENCHMARK_TEST_UNSET_KEY"));
    }
}
