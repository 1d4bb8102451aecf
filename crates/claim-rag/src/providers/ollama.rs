//! Ollama providers for embeddings and reasoning

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::ReasoningProvider;
use super::retry::CallPolicy;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}

fn build_client() -> Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(5)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

async fn ollama_health(client: &Client, base_url: &str) -> Result<bool> {
    let url = format!("{}/api/tags", base_url);
    match client.get(&url).send().await {
        Ok(response) => Ok(response.status().is_success()),
        Err(_) => Ok(false),
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    policy: CallPolicy,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            policy: CallPolicy::new("embedding", config.timeout_secs, config.max_retries),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        self.policy
            .run(|| async {
                let request = EmbedRequest {
                    model: &self.model,
                    prompt: text,
                };

                let response = self
                    .client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| self.policy.transport_error(e, Error::Embedding))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::embedding(format!(
                        "Embedding failed: HTTP {} - {}",
                        status, body
                    )));
                }

                let embed_response: EmbedResponse = response.json().await.map_err(|e| {
                    Error::embedding(format!("Failed to parse embedding response: {}", e))
                })?;

                Ok(embed_response.embedding)
            })
            .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        ollama_health(&self.client, &self.base_url).await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama chat provider for query structuring and decisions
pub struct OllamaReasoner {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    policy: CallPolicy,
}

impl OllamaReasoner {
    /// Create a new Ollama reasoning provider
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            policy: CallPolicy::new("reasoning", config.timeout_secs, config.max_retries),
        })
    }
}

#[async_trait]
impl ReasoningProvider for OllamaReasoner {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        tracing::debug!("Ollama chat with model: {}", self.model);

        self.policy
            .run(|| async {
                let request = ChatRequest {
                    model: &self.model,
                    messages: [
                        ChatMessage {
                            role: "system",
                            content: system_prompt,
                        },
                        ChatMessage {
                            role: "user",
                            content: user_prompt,
                        },
                    ],
                    stream: false,
                    options: ChatOptions {
                        temperature: self.temperature,
                    },
                };

                let response = self
                    .client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| self.policy.transport_error(e, Error::Reasoning))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::reasoning(format!(
                        "Chat failed: HTTP {} - {}",
                        status, body
                    )));
                }

                let chat: ChatResponse = response.json().await.map_err(|e| {
                    Error::reasoning(format!("Failed to parse chat response: {}", e))
                })?;

                Ok(chat.message.content)
            })
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        ollama_health(&self.client, &self.base_url).await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
