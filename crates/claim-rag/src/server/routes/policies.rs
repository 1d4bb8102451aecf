//! Policy index management endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::pipeline::PolicyDocument;
use crate::server::state::AppState;

/// Body of `POST /reload-policy/:policy_id`
#[derive(Debug, Default, Deserialize)]
pub struct ReloadRequest {
    #[serde(default)]
    pub pdf_path: Option<String>,
}

/// POST /api/v1/hackrx/reload-policy/:policy_id
///
/// Rebuilds the index and swaps it in. Without a `pdf_path` the path the
/// policy was preloaded from is used.
pub async fn reload_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
    payload: std::result::Result<Json<ReloadRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => ReloadRequest::default(),
        Err(rejection) => {
            return Err(Error::invalid(format!(
                "Invalid JSON body: {}",
                rejection.body_text()
            )))
        }
    };

    let path = request
        .pdf_path
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| preload_path(&state, &policy_id))
        .ok_or_else(|| Error::invalid("Missing required field: pdf_path"))?;

    tracing::info!("Reloading policy {} from {}", policy_id, path.display());
    let index = state
        .pipeline()
        .reload(&policy_id, &PolicyDocument::Path(path))
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Policy {} reloaded successfully", policy_id),
        "timestamp": Utc::now().to_rfc3339(),
        "chunks": index.len(),
    })))
}

/// GET /api/v1/hackrx/policies
pub async fn list_policies(State(state): State<AppState>) -> Json<Value> {
    let policies = state.pipeline().cache().entries();
    Json(json!({
        "status": "success",
        "count": policies.len(),
        "policies": policies,
    }))
}

/// DELETE /api/v1/hackrx/policies/:policy_id
pub async fn evict_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
) -> Result<Json<Value>> {
    if !state.pipeline().cache().evict(&policy_id) {
        return Err(Error::NotFound(format!("policy {}", policy_id)));
    }
    tracing::info!("Evicted policy {}", policy_id);

    Ok(Json(json!({
        "status": "success",
        "message": format!("Policy {} evicted", policy_id),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

fn preload_path(state: &AppState, policy_id: &str) -> Option<PathBuf> {
    state
        .config()
        .policies
        .preload
        .iter()
        .find(|p| p.policy_id == policy_id)
        .map(|p| p.path.clone())
}
