//! Per-policy index cache with single-flight builds

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};

use super::index::PolicyIndex;

/// Summary of one cached index
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub policy_id: String,
    pub source: String,
    pub chunks: usize,
    pub dimension: usize,
    pub page_count: Option<u32>,
    pub content_hash: Option<String>,
    pub built_at: DateTime<Utc>,
}

/// Built indexes keyed by policy identifier.
///
/// Each key owns a `OnceCell`: concurrent first requests for one policy share
/// a single build, while different policies build in parallel. A failed build
/// leaves the cell empty so the next request tries again.
#[derive(Default)]
pub struct IndexCache {
    cells: DashMap<String, Arc<OnceCell<Arc<PolicyIndex>>>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, policy_id: &str) -> Arc<OnceCell<Arc<PolicyIndex>>> {
        // Clone out of the map so no shard lock is held across an await
        self.cells.entry(policy_id.to_string()).or_default().clone()
    }

    /// Cached index for `policy_id`, if one has been built
    pub fn get(&self, policy_id: &str) -> Option<Arc<PolicyIndex>> {
        self.cells
            .get(policy_id)
            .and_then(|cell| cell.get().cloned())
    }

    /// Return the cached index, running `build` only if none exists yet
    pub async fn get_or_build<F, Fut>(&self, policy_id: &str, build: F) -> Result<Arc<PolicyIndex>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PolicyIndex>>,
    {
        let cell = self.cell(policy_id);
        if let Some(index) = cell.get() {
            tracing::debug!("Index cache hit for policy {}", policy_id);
            return Ok(Arc::clone(index));
        }

        let index = cell
            .get_or_try_init(|| async {
                tracing::info!("Building index for policy {}", policy_id);
                let index = build().await?;
                tracing::info!(
                    "Index for policy {} ready: {} chunks, {} dims",
                    policy_id,
                    index.len(),
                    index.dimension()
                );
                Ok::<_, Error>(Arc::new(index))
            })
            .await;

        match index {
            Ok(index) => Ok(Arc::clone(index)),
            Err(e) => {
                tracing::warn!("Index build for policy {} failed: {}", policy_id, e);
                Err(e)
            }
        }
    }

    /// Build a fresh index and swap it in.
    ///
    /// The previous index keeps serving until the new one is ready, and
    /// stays in place if the rebuild fails.
    pub async fn reload<F, Fut>(&self, policy_id: &str, build: F) -> Result<Arc<PolicyIndex>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PolicyIndex>>,
    {
        let index = Arc::new(build().await?);
        self.cells.insert(
            policy_id.to_string(),
            Arc::new(OnceCell::new_with(Some(Arc::clone(&index)))),
        );
        tracing::info!(
            "Reloaded policy {}: {} chunks from {}",
            policy_id,
            index.len(),
            index.source()
        );
        Ok(index)
    }

    /// Drop a policy's index; returns whether one was cached
    pub fn evict(&self, policy_id: &str) -> bool {
        self.cells
            .remove(policy_id)
            .map(|(_, cell)| cell.initialized())
            .unwrap_or(false)
    }

    /// Whether a built index exists for `policy_id`
    pub fn contains(&self, policy_id: &str) -> bool {
        self.get(policy_id).is_some()
    }

    /// Summaries of every built index, sorted by policy id
    pub fn entries(&self) -> Vec<IndexSummary> {
        let mut entries: Vec<IndexSummary> = self
            .cells
            .iter()
            .filter_map(|entry| {
                let index = entry.value().get()?;
                Some(IndexSummary {
                    policy_id: entry.key().clone(),
                    source: index.source().to_string(),
                    chunks: index.len(),
                    dimension: index.dimension(),
                    page_count: index.page_count(),
                    content_hash: index.content_hash().map(str::to_string),
                    built_at: index.built_at(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.policy_id.cmp(&b.policy_id));
        entries
    }

    /// Number of built indexes
    pub fn len(&self) -> usize {
        self.cells.iter().filter(|e| e.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tiny_index(text: &str) -> PolicyIndex {
        PolicyIndex::new(
            vec![Chunk {
                index: 0,
                char_start: 0,
                char_end: text.chars().count(),
                text: text.to_string(),
            }],
            vec![vec![1.0, 0.0]],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_builds_once() {
        let cache = IndexCache::new();
        let builds = AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .get_or_build("AROGYA", || async {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(tiny_index("clause"))
                })
                .await
                .unwrap();
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(cache.contains("AROGYA"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_build_is_not_cached() {
        let cache = IndexCache::new();

        let err = cache
            .get_or_build("P1", || async { Err(Error::embedding("service down")) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert!(!cache.contains("P1"));
        assert!(cache.entries().is_empty());

        let index = cache
            .get_or_build("P1", || async { Ok(tiny_index("retry worked")) })
            .await
            .unwrap();
        assert_eq!(index.chunks()[0].text, "retry worked");
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_index() {
        let cache = IndexCache::new();
        cache
            .get_or_build("P1", || async { Ok(tiny_index("v1")) })
            .await
            .unwrap();

        let result = cache
            .reload("P1", || async { Err(Error::DocumentNotFound("v2.pdf".into())) })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.get("P1").unwrap().chunks()[0].text, "v1");

        cache
            .reload("P1", || async { Ok(tiny_index("v2")) })
            .await
            .unwrap();
        assert_eq!(cache.get("P1").unwrap().chunks()[0].text, "v2");
    }

    #[tokio::test]
    async fn test_evict_and_entries() {
        let cache = IndexCache::new();
        for id in ["B", "A"] {
            cache
                .get_or_build(id, || async { Ok(tiny_index(id)) })
                .await
                .unwrap();
        }

        let ids: Vec<String> = cache.entries().into_iter().map(|e| e.policy_id).collect();
        assert_eq!(ids, vec!["A", "B"]);

        assert!(cache.evict("A"));
        assert!(!cache.evict("A"));
        assert_eq!(cache.len(), 1);
    }
}
