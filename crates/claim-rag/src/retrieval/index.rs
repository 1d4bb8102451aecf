//! Exact nearest-neighbour index over chunk embeddings

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// A retrieved chunk and its squared Euclidean distance to the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Immutable flat index of one policy document.
///
/// Vectors are stored contiguously; search is exhaustive under L2²
/// distance, so results are exact.
#[derive(Debug, Clone)]
pub struct PolicyIndex {
    chunks: Vec<Chunk>,
    /// Row-major `chunks.len() x dimension`
    vectors: Vec<f32>,
    dimension: usize,
    source: String,
    content_hash: Option<String>,
    page_count: Option<u32>,
    built_at: DateTime<Utc>,
}

impl PolicyIndex {
    /// Build an index from chunks and their embeddings (same order, same length)
    pub fn new(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(Error::embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        if !embeddings.is_empty() && dimension == 0 {
            return Err(Error::embedding("embedding service returned empty vectors"));
        }

        let mut vectors = Vec::with_capacity(embeddings.len() * dimension);
        for (position, embedding) in embeddings.into_iter().enumerate() {
            if embedding.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    found: embedding.len(),
                    position,
                });
            }
            vectors.extend(embedding);
        }

        Ok(Self {
            chunks,
            vectors,
            dimension,
            source: String::new(),
            content_hash: None,
            page_count: None,
            built_at: Utc::now(),
        })
    }

    /// Record which document the index was built from
    pub fn with_document(mut self, document: &Document) -> Self {
        self.source = document.source.clone();
        self.content_hash = Some(document.content_hash.clone());
        self.page_count = document.page_count;
        self
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Vector dimension (0 for an empty index)
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Stored embedding of the chunk at `position`
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.chunks.len() {
            return None;
        }
        let start = position * self.dimension;
        self.vectors.get(start..start + self.dimension)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Return at most `k` chunks nearest to `query`, nearest first.
    ///
    /// Equal distances keep document order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
                position: 0,
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(row, query))
            .enumerate()
            .collect();

        // Stable sort: ties stay in document order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| SearchHit {
                chunk: self.chunks[position].clone(),
                distance,
            })
            .collect())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
