//! Application state for the claim server

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::pipeline::{ClaimPipeline, PolicyDocument};
use crate::types::{Decision, Reasoned};

/// Final state of a processed claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Success,
    Failed,
}

/// Ledger entry for one claim
#[derive(Debug, Clone, Serialize)]
pub struct ClaimRecord {
    pub claim_id: String,
    pub status: ClaimStatus,
    pub policy_id: Option<String>,
    pub query: String,
    pub processed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Reasoned<Decision>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Claim pipeline with its index cache
    pipeline: ClaimPipeline,
    /// Most recent outcome per claim id
    claims: DashMap<String, ClaimRecord>,
    /// Insertion order of `claims`, oldest first
    claim_order: Mutex<VecDeque<String>>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create new application state with the configured providers
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing claim server state...");
        let pipeline = ClaimPipeline::from_config(&config)?;
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Create application state around an existing pipeline
    pub fn with_pipeline(config: RagConfig, pipeline: ClaimPipeline) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                claims: DashMap::new(),
                claim_order: Mutex::new(VecDeque::new()),
                ready: RwLock::new(true),
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn pipeline(&self) -> &ClaimPipeline {
        &self.inner.pipeline
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }

    /// Build the indexes listed under `policies.preload`.
    ///
    /// Failures are logged and skipped; returns how many policies loaded.
    pub async fn preload_policies(&self) -> usize {
        let mut loaded = 0;
        for policy in &self.inner.config.policies.preload {
            let source = PolicyDocument::path(&policy.path);
            match self.pipeline().index_for(&policy.policy_id, Some(&source)).await {
                Ok(index) => {
                    tracing::info!(
                        "Preloaded policy {} ({} chunks)",
                        policy.policy_id,
                        index.len()
                    );
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!("Could not preload policy {}: {}", policy.policy_id, e);
                }
            }
        }
        loaded
    }

    /// Record the outcome of a claim, evicting the oldest beyond the configured bound
    pub fn record_claim(&self, record: ClaimRecord) {
        let limit = self.inner.config.server.max_tracked_claims;
        if limit == 0 {
            return;
        }

        let mut order = self.inner.claim_order.lock();
        if self
            .inner
            .claims
            .insert(record.claim_id.clone(), record.clone())
            .is_none()
        {
            order.push_back(record.claim_id);
        }
        while order.len() > limit {
            if let Some(oldest) = order.pop_front() {
                self.inner.claims.remove(&oldest);
            }
        }
    }

    /// Last recorded outcome of a claim
    pub fn claim(&self, claim_id: &str) -> Result<ClaimRecord> {
        self.inner
            .claims
            .get(claim_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| Error::NotFound(format!("claim {}", claim_id)))
    }

    /// Number of claims currently tracked
    pub fn tracked_claims(&self) -> usize {
        self.inner.claims.len()
    }
}
