//! Claim pipeline: load, chunk, index, retrieve, structure, decide

use bytes::Bytes;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::{DecisionSynthesizer, PromptBuilder, QueryStructurer};
use crate::ingestion::{DocumentSource, FileDocumentLoader, TextChunker};
use crate::providers::{self, EmbeddingProvider, ReasoningProvider};
use crate::retrieval::{IndexCache, PolicyIndex, Retriever, SearchHit};
use crate::types::{Decision, Document, Reasoned, StructuredQuery};

/// Where a policy document comes from
#[derive(Debug, Clone)]
pub enum PolicyDocument {
    /// File on the server's filesystem
    Path(PathBuf),
    /// Uploaded file contents; the name selects the format
    Upload { name: String, data: Bytes },
}

impl PolicyDocument {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Label used in logs and index metadata
    pub fn label(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Upload { name, .. } => name.clone(),
        }
    }
}

/// Result of assessing one claim
#[derive(Debug, Clone, Serialize)]
pub struct ClaimAssessment {
    pub parsed_query: Reasoned<StructuredQuery>,
    pub decision: Reasoned<Decision>,
    /// Clauses handed to the decision call, nearest first
    pub clauses: Vec<SearchHit>,
}

/// End-to-end claim pipeline
#[derive(Clone)]
pub struct ClaimPipeline {
    loader: Arc<dyn DocumentSource>,
    chunker: TextChunker,
    retriever: Retriever,
    structurer: QueryStructurer,
    synthesizer: DecisionSynthesizer,
    cache: Arc<IndexCache>,
    top_k: usize,
}

impl ClaimPipeline {
    /// Assemble a pipeline from explicit providers
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        reasoner: Arc<dyn ReasoningProvider>,
    ) -> Result<Self> {
        Ok(Self {
            loader: Arc::new(FileDocumentLoader::new()),
            chunker: TextChunker::from_config(&config.chunking)?,
            retriever: Retriever::from_config(embedder, &config.embeddings),
            structurer: QueryStructurer::new(Arc::clone(&reasoner)),
            synthesizer: DecisionSynthesizer::new(reasoner),
            cache: Arc::new(IndexCache::new()),
            top_k: config.retrieval.top_k,
        })
    }

    /// Assemble a pipeline with the providers named in the configuration
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let embedder = providers::embedder_from_config(&config.embeddings)?;
        let reasoner = providers::reasoner_from_config(&config.llm)?;
        Self::new(config, embedder, reasoner)
    }

    /// Replace the document loader
    pub fn with_loader(mut self, loader: Arc<dyn DocumentSource>) -> Self {
        self.loader = loader;
        self
    }

    /// Share an existing index cache
    pub fn with_cache(mut self, cache: Arc<IndexCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn cache(&self) -> &Arc<IndexCache> {
        &self.cache
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Load a policy document
    pub async fn load(&self, source: &PolicyDocument) -> Result<Document> {
        match source {
            PolicyDocument::Path(path) => self.loader.load(path).await,
            PolicyDocument::Upload { name, data } => {
                self.loader.load_bytes(name, data.clone()).await
            }
        }
    }

    /// Load, chunk and embed a policy document
    pub async fn build_index(&self, source: &PolicyDocument) -> Result<PolicyIndex> {
        let started = Instant::now();
        let document = self.load(source).await?;
        let chunks = self.chunker.chunk(&document.text);
        let chunk_count = chunks.len();

        let index = self.retriever.build(chunks).await?.with_document(&document);

        tracing::info!(
            "Indexed {}: {} chunks in {:?}",
            document.source,
            chunk_count,
            started.elapsed()
        );
        Ok(index)
    }

    /// Run the pipeline once against a freshly built index
    pub async fn run(&self, query: &str, source: &PolicyDocument) -> Result<ClaimAssessment> {
        let index = self.build_index(source).await?;
        self.assess_with_index(&index, query).await
    }

    /// Assess a claim against the cached index for `policy_id`.
    ///
    /// The document is only read the first time `policy_id` is seen; later
    /// calls reuse the cached index whatever `source` they pass.
    pub async fn assess(
        &self,
        policy_id: &str,
        source: &PolicyDocument,
        query: &str,
    ) -> Result<ClaimAssessment> {
        let index = self.index_for(policy_id, Some(source)).await?;
        self.assess_with_index(&index, query).await
    }

    /// Cached index for `policy_id`, built from `source` on first use.
    ///
    /// Without a source only an already cached policy can be served.
    pub async fn index_for(
        &self,
        policy_id: &str,
        source: Option<&PolicyDocument>,
    ) -> Result<Arc<PolicyIndex>> {
        if let Some(index) = self.cache.get(policy_id) {
            return Ok(index);
        }
        let source = source.ok_or_else(|| {
            Error::invalid(format!(
                "policy '{}' is not loaded and no policy document was given",
                policy_id
            ))
        })?;
        self.cache
            .get_or_build(policy_id, || self.build_index(source))
            .await
    }

    /// Rebuild the index for `policy_id` and swap it into the cache
    pub async fn reload(&self, policy_id: &str, source: &PolicyDocument) -> Result<Arc<PolicyIndex>> {
        self.cache
            .reload(policy_id, || self.build_index(source))
            .await
    }

    /// Retrieve, structure and decide against a built index
    pub async fn assess_with_index(
        &self,
        index: &PolicyIndex,
        query: &str,
    ) -> Result<ClaimAssessment> {
        if query.trim().is_empty() {
            return Err(Error::invalid("query must not be empty"));
        }

        let clauses = self.retriever.search(index, query, self.top_k).await?;
        tracing::debug!("Retrieved {} clauses", clauses.len());

        let parsed_query = self.structurer.structure(query).await?;
        let joined = PromptBuilder::build_clauses(&clauses);
        let decision = self.synthesizer.decide(&parsed_query, &joined).await?;

        Ok(ClaimAssessment {
            parsed_query,
            decision,
            clauses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::MockReasoningProvider;
    use crate::providers::HashEmbedder;
    use crate::types::DecisionOutcome;

    fn pipeline(reasoner: MockReasoningProvider) -> ClaimPipeline {
        let mut config = RagConfig::default();
        config.chunking.chunk_size = 60;
        config.chunking.chunk_overlap = 10;
        config.retrieval.top_k = 2;
        ClaimPipeline::new(
            &config,
            Arc::new(HashEmbedder::new(128).unwrap()),
            Arc::new(reasoner),
        )
        .unwrap()
    }

    fn scripted_reasoner() -> MockReasoningProvider {
        let mut reasoner = MockReasoningProvider::new();
        reasoner
            .expect_complete()
            .returning(|system, _| {
                if system.contains("Extract") {
                    Ok(r#"{"age": 46, "procedure": "knee surgery"}"#.to_string())
                } else {
                    Ok(r#"{"decision": "Approved", "amount": 150000, "justification": []}"#
                        .to_string())
                }
            });
        reasoner
    }

    #[tokio::test]
    async fn test_run_on_uploaded_text() {
        let pipeline = pipeline(scripted_reasoner());
        let source = PolicyDocument::Upload {
            name: "policy.txt".into(),
            data: Bytes::from_static(
                b"Knee surgery is covered after a waiting period of 3 months. \
                  Dental procedures are excluded. Ambulance charges are reimbursed.",
            ),
        };

        let assessment = pipeline.run("46M, knee surgery", &source).await.unwrap();

        assert_eq!(
            assessment.parsed_query.structured().unwrap().age,
            Some(46)
        );
        assert_eq!(
            assessment.decision.structured().unwrap().decision,
            DecisionOutcome::Approved
        );
        assert!(assessment.clauses.len() <= 2);
        assert!(assessment.clauses[0].chunk.text.contains("Knee surgery"));
    }

    #[tokio::test]
    async fn test_missing_document() {
        let pipeline = pipeline(MockReasoningProvider::new());
        let err = pipeline
            .run("46M", &PolicyDocument::path("/no/such/policy.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn test_assess_reuses_cached_index() {
        let pipeline = pipeline(scripted_reasoner());
        let first = PolicyDocument::Upload {
            name: "v1.txt".into(),
            data: Bytes::from_static(b"Cataract surgery covered after two years."),
        };
        let second = PolicyDocument::path("/no/such/file.txt");

        pipeline.assess("P1", &first, "cataract").await.unwrap();
        // Cached: the second source is never read
        pipeline.assess("P1", &second, "cataract").await.unwrap();

        let entries = pipeline.cache().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, "v1.txt");
    }

    #[tokio::test]
    async fn test_unknown_policy_without_source() {
        let pipeline = pipeline(MockReasoningProvider::new());
        let err = pipeline.index_for("NEVER_LOADED", None).await.unwrap_err();
        assert!(matches!(err, Error::InputValidation(_)));
    }
}
