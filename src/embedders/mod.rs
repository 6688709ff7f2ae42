//! Embedding service collaborators
//!
//! Provides a unified trait for different embedding implementations:
//! - OpenAI-compatible HTTP endpoints
//! - fastembed (local ONNX runtime, `fastembed` feature)

#[cfg(feature = "fastembed")]
pub mod fastembed_backend;
pub mod openai_backend;
pub mod traits;

use anyhow::{bail, Result};

#[cfg(feature = "fastembed")]
pub use fastembed_backend::{FastEmbedBackend, FastEmbedModel};
pub use openai_backend::OpenAiEmbedder;
pub use traits::{BatchEmbeddingResult, EmbedderBackend, EmbedderConfig};

use crate::config::{EmbeddingBackendKind, EmbeddingSettings};

/// Build the embedder described by the configuration
pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn EmbedderBackend>> {
    match settings.backend {
        EmbeddingBackendKind::OpenAi => {
            let api_key = settings.api_key()?;
            Ok(Box::new(OpenAiEmbedder::new(
                api_key,
                settings.endpoint.clone(),
                settings.model.clone(),
                settings.timeout(),
            )?))
        }
        EmbeddingBackendKind::FastEmbed => create_fastembed(&settings.model),
    }
}

#[cfg(feature = "fastembed")]
fn create_fastembed(model: &str) -> Result<Box<dyn EmbedderBackend>> {
    let Some(model_type) = FastEmbedModel::from_str(model) else {
        bail!(
            "Unknown fastembed model '{}'. Available: {}",
            model,
            FastEmbedModel::all().iter().map(|m| m.model_id()).collect::<Vec<_>>().join(", ")
        );
    };
    Ok(Box::new(FastEmbedBackend::new(model_type)?))
}

#[cfg(not(feature = "fastembed"))]
fn create_fastembed(_model: &str) -> Result<Box<dyn EmbedderBackend>> {
    bail!("The fastembed backend requires building with `--features fastembed`")
}
