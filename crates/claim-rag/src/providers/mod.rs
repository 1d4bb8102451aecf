//! Provider abstractions for embeddings and reasoning
//!
//! Trait-based so the pipeline can switch between a local Ollama server,
//! OpenAI, or the offline hash embedder without code changes.

pub mod embedding;
pub mod hash;
pub mod llm;
pub mod ollama;
pub mod openai;
pub mod retry;

use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig, LlmBackend, LlmConfig};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use hash::HashEmbedder;
pub use llm::ReasoningProvider;
pub use ollama::{OllamaEmbedder, OllamaReasoner};
pub use openai::{OpenAiEmbedder, OpenAiReasoner};
pub use retry::CallPolicy;

/// Build the configured embedding provider
pub fn embedder_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.backend {
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        EmbeddingBackend::OpenAi => Arc::new(OpenAiEmbedder::new(config)?),
        EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(config.dimensions)?),
    };
    tracing::info!(
        "Embedding provider: {} (model: {}, {} dims)",
        provider.name(),
        config.model,
        provider.dimensions()
    );
    Ok(provider)
}

/// Build the configured reasoning provider
pub fn reasoner_from_config(config: &LlmConfig) -> Result<Arc<dyn ReasoningProvider>> {
    let provider: Arc<dyn ReasoningProvider> = match config.backend {
        LlmBackend::Ollama => Arc::new(OllamaReasoner::new(config)?),
        LlmBackend::OpenAi => Arc::new(OpenAiReasoner::new(config)?),
    };
    tracing::info!(
        "Reasoning provider: {} (model: {})",
        provider.name(),
        provider.model()
    );
    Ok(provider)
}
