//! Shared in-process fakes for the embedding and reasoning services

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use claim_rag::config::RagConfig;
use claim_rag::providers::{EmbeddingProvider, HashEmbedder, ReasoningProvider};
use claim_rag::server::state::AppState;
use claim_rag::{ClaimPipeline, Result};

pub const STRUCTURED_REPLY: &str = r#"{
  "age": 46,
  "gender": "male",
  "procedure": "knee surgery",
  "location": "Pune",
  "policy_duration_months": 3
}"#;

pub const APPROVED_REPLY: &str = r#"```json
{
  "decision": "Approved",
  "amount": 150000,
  "justification": [
    {"clause": "Knee surgery is covered", "explanation": "Procedure is listed"}
  ]
}
```"#;

pub const POLICY_TEXT: &str = "Section 1. Knee surgery and joint replacement are covered after a waiting period of 90 days. \
Section 2. Dental treatment is excluded unless caused by an accident. \
Section 3. Ambulance charges are reimbursed up to 2000 rupees per hospitalisation. \
Section 4. Claims in Pune, Mumbai and Delhi are settled through network hospitals.";

/// Reasoner that answers the extraction and decision prompts from a script
pub struct ScriptedReasoner {
    pub structured: String,
    pub decision: String,
    pub calls: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new(structured: &str, decision: &str) -> Self {
        Self {
            structured: structured.to_string(),
            decision: decision.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn approving() -> Self {
        Self::new(STRUCTURED_REPLY, APPROVED_REPLY)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedReasoner {
    async fn complete(&self, system_prompt: &str, _user_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if system_prompt.contains("Extract the following") {
            Ok(self.structured.clone())
        } else {
            Ok(self.decision.clone())
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Hash embedder that counts batch calls and can be slowed down
pub struct CountingEmbedder {
    inner: HashEmbedder,
    delay: Duration,
    pub batches: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: HashEmbedder::new(64).unwrap(),
            delay,
            batches: AtomicUsize::new(0),
        }
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.inner.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Small chunks so a short policy yields several clauses
pub fn test_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.chunking.chunk_size = 120;
    config.chunking.chunk_overlap = 20;
    config.retrieval.top_k = 3;
    // One batch per index build
    config.embeddings.batch_size = 1024;
    config
}

pub fn pipeline_with(
    config: &RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    reasoner: Arc<dyn ReasoningProvider>,
) -> ClaimPipeline {
    ClaimPipeline::new(config, embedder, reasoner).unwrap()
}

pub fn app_state(config: RagConfig, reasoner: Arc<dyn ReasoningProvider>) -> AppState {
    let pipeline = pipeline_with(&config, Arc::new(HashEmbedder::new(64).unwrap()), reasoner);
    AppState::with_pipeline(config, pipeline)
}

/// Write a policy document into `dir`
pub fn write_policy(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}
