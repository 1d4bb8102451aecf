//! HackRx API routes

pub mod claims;
pub mod policies;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::server::state::AppState;

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "SmartClaimsAI HackRX API";

/// Build the routes mounted under `/api/v1/hackrx`
pub fn hackrx_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Claims
        .route("/run", get(claims::run_banner).post(claims::run_claim))
        .route(
            "/upload",
            post(claims::upload_claim).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/status/:claim_id", get(claims::claim_status))
        // Policy index management
        .route("/reload-policy/:policy_id", post(policies::reload_policy))
        .route("/policies", get(policies::list_policies))
        .route("/policies/:policy_id", delete(policies::evict_policy))
        .route("/health", get(health))
}

/// GET /api/v1/hackrx/health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
