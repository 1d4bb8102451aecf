//! Reasoning provider trait for chat-style completions

use async_trait::async_trait;
use crate::error::Result;

/// Trait for the language model behind query structuring and decisions
///
/// Implementations:
/// - `OllamaReasoner`: Local Ollama server (`/api/chat`)
/// - `OpenAiReasoner`: OpenAI chat completions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Run one system + user exchange and return the assistant's reply text
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
