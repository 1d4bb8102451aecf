//! Configuration for the claim pipeline and server

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming a TOML configuration file
pub const CONFIG_PATH_ENV: &str = "CLAIM_RAG_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Embedding service configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Reasoning (LLM) service configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Policy documents known at startup
    #[serde(default)]
    pub policies: PolicyConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Load configuration: explicit path, then `CLAIM_RAG_CONFIG`, then defaults.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => {
                tracing::info!("Loading configuration from {}", p.display());
                Self::from_file(&p)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CLAIM_RAG_HOST") {
            self.server.host = host;
        }
        let port = std::env::var("CLAIM_RAG_PORT").or_else(|_| std::env::var("PORT"));
        if let Ok(port) = port {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid port override: {}", port),
            }
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if self.llm.api_key.is_none() {
                self.llm.api_key = Some(key.clone());
            }
            if self.embeddings.api_key.is_none() {
                self.embeddings.api_key = Some(key);
            }
        }
        if let Ok(doc) = std::env::var("CLAIM_RAG_DEFAULT_DOCUMENT") {
            self.policies.default_document = Some(PathBuf::from(doc));
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be positive".into()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be positive".into()));
        }
        if self.embeddings.timeout_secs == 0 || self.llm.timeout_secs == 0 {
            return Err(Error::Config("service timeouts must be positive".into()));
        }
        if self.embeddings.backend == EmbeddingBackend::OpenAi && self.embeddings.api_key.is_none() {
            return Err(Error::Config(
                "OpenAI embeddings selected but no API key (set OPENAI_API_KEY)".into(),
            ));
        }
        if self.llm.backend == LlmBackend::OpenAi && self.llm.api_key.is_none() {
            return Err(Error::Config(
                "OpenAI reasoning selected but no API key (set OPENAI_API_KEY)".into(),
            ));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
    /// Number of processed claims remembered for the status endpoint
    pub max_tracked_claims: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
            max_tracked_claims: 10_000,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive windows
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of clauses handed to decision synthesis
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI embeddings API
    #[serde(rename = "openai")]
    OpenAi,
    /// Deterministic offline hashing embedder (development only)
    Hash,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend provider
    pub backend: EmbeddingBackend,
    /// Service base URL
    pub base_url: String,
    /// API key (OpenAI only)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model to use
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text, 1536 for text-embedding-3-small)
    pub dimensions: usize,
    /// Texts per embedding request
    pub batch_size: usize,
    /// Embedding requests in flight during an index build
    pub concurrency: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after a failed request (0 = single attempt)
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
            concurrency: num_cpus::get().clamp(1, 8),
            timeout_secs: 60,
            max_retries: 0,
        }
    }
}

/// Reasoning backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI chat completions API
    #[serde(rename = "openai")]
    OpenAi,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend provider
    pub backend: LlmBackend,
    /// Service base URL
    pub base_url: String,
    /// API key (OpenAI only)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Generation model name
    pub model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after a failed request (0 = single attempt)
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Ollama,
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            model: "llama3.2:3b".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
            max_retries: 0,
        }
    }
}

/// A policy document registered at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySource {
    /// Cache key for the policy
    pub policy_id: String,
    /// Path to the policy document
    pub path: PathBuf,
}

/// Policy document configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Identifier used when a request names no policy
    pub default_policy_id: String,
    /// Document used when a request names no document
    pub default_document: Option<PathBuf>,
    /// Policies indexed when the server starts
    pub preload: Vec<PolicySource>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_policy_id: "default".to_string(),
            default_document: None,
            preload: Vec::new(),
        }
    }
}
