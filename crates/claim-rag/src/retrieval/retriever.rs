//! Embedding-backed index building and search

use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::Chunk;

use super::index::{PolicyIndex, SearchHit};

/// Builds policy indexes and answers top-k queries with one embedding provider
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    concurrency: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            batch_size: 32,
            concurrency: 4,
        }
    }

    pub fn from_config(embedder: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self::new(embedder)
            .with_batch_size(config.batch_size)
            .with_concurrency(config.concurrency)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Embed every chunk and build a flat index.
    ///
    /// Batches run concurrently but vectors are reassembled in chunk order.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<PolicyIndex> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let batch_count = texts.len().div_ceil(self.batch_size);

        tracing::debug!(
            "Embedding {} chunks in {} batches with {} ({} in flight)",
            texts.len(),
            batch_count,
            self.embedder.name(),
            self.concurrency
        );

        let owned: Vec<Vec<String>> = texts.chunks(self.batch_size).map(<[String]>::to_vec).collect();
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(owned)
            .map(|batch| {
                let embedder = Arc::clone(&self.embedder);
                async move {
                    let vectors = embedder.embed_batch(&batch).await?;
                    if vectors.len() != batch.len() {
                        return Err(Error::embedding(format!(
                            "{} returned {} vectors for {} texts",
                            embedder.name(),
                            vectors.len(),
                            batch.len()
                        )));
                    }
                    Ok::<_, Error>(vectors)
                }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let embeddings: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        let index = PolicyIndex::new(chunks, embeddings)?;

        if !index.is_empty() && index.dimension() != self.embedder.dimensions() {
            tracing::warn!(
                "{} produced {}-dimensional vectors, configured for {}",
                self.embedder.name(),
                index.dimension(),
                self.embedder.dimensions()
            );
        }

        Ok(index)
    }

    /// Embed `query` and return its `k` nearest chunks
    pub async fn search(&self, index: &PolicyIndex, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        index.search(&query_vector, k)
    }
}
