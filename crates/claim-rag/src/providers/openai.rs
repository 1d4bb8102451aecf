//! OpenAI providers: `/v1/embeddings` and `/v1/chat/completions`

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::ReasoningProvider;
use super::retry::CallPolicy;

/// Base URL used when the configured one still points at a local Ollama
const OPENAI_BASE_URL: &str = "https://api.openai.com";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn resolve_base_url(configured: &str) -> String {
    if configured.contains("localhost:11434") || configured.contains("127.0.0.1:11434") {
        OPENAI_BASE_URL.to_string()
    } else {
        configured.trim_end_matches('/').to_string()
    }
}

fn require_key(key: Option<&String>) -> Result<String> {
    match key {
        Some(k) if !k.is_empty() => Ok(k.clone()),
        _ => Err(Error::Config(
            "OpenAI API key must not be empty (set OPENAI_API_KEY)".into(),
        )),
    }
}

fn build_client() -> Result<Client> {
    Client::builder()
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Pull the API's own error message out of a failed response
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    format!("API returned {}: {}", status, detail)
}

/// OpenAI embedding provider (text-embedding-3-small by default)
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    policy: CallPolicy,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: resolve_base_url(&config.base_url),
            api_key: require_key(config.api_key.as_ref())?,
            model: config.model.clone(),
            dimensions: config.dimensions,
            policy: CallPolicy::new("embedding", config.timeout_secs, config.max_retries),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        tracing::debug!(
            provider = "openai",
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        self.policy
            .run(|| async {
                let request = EmbeddingRequest {
                    model: &self.model,
                    input: texts,
                };

                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| self.policy.transport_error(e, Error::Embedding))?;

                if !response.status().is_success() {
                    return Err(Error::embedding(error_detail(response).await));
                }

                let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
                    Error::embedding(format!("Failed to parse embedding response: {}", e))
                })?;

                // The API reports the input position of every vector
                parsed.data.sort_by_key(|d| d.index);
                Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
            })
            .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.api_key.is_empty())
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// OpenAI chat completions provider
pub struct OpenAiReasoner {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    policy: CallPolicy,
}

impl OpenAiReasoner {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: resolve_base_url(&config.base_url),
            api_key: require_key(config.api_key.as_ref())?,
            model: config.model.clone(),
            temperature: config.temperature,
            policy: CallPolicy::new("reasoning", config.timeout_secs, config.max_retries),
        })
    }
}

#[async_trait]
impl ReasoningProvider for OpenAiReasoner {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

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
                    temperature: self.temperature,
                };

                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| self.policy.transport_error(e, Error::Reasoning))?;

                if !response.status().is_success() {
                    return Err(Error::reasoning(error_detail(response).await));
                }

                let chat: ChatResponse = response.json().await.map_err(|e| {
                    Error::reasoning(format!("Failed to parse chat response: {}", e))
                })?;

                // An empty reply is passed on; parsing it falls back downstream
                Ok(chat
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default())
            })
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.api_key.is_empty())
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
