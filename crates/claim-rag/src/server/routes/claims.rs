//! Claim processing endpoints

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::pipeline::{ClaimAssessment, PolicyDocument};
use crate::server::state::{AppState, ClaimRecord, ClaimStatus};
use crate::types::{Decision, Reasoned, StructuredQuery};

const MISSING_FIELDS: &str = "Missing required fields: claim_id, query";

/// Body of `POST /run`
#[derive(Debug, Default, Deserialize)]
pub struct ClaimRequest {
    #[serde(default, deserialize_with = "claim_id_text")]
    pub claim_id: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub pdf_path: Option<String>,
    #[serde(default)]
    pub policy_id: Option<String>,
    /// Caller's timestamp; accepted and ignored
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Claim ids arrive as strings or numbers
fn claim_id_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Successful claim response
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub status: &'static str,
    pub claim_id: String,
    pub query: String,
    pub parsed_query: Reasoned<StructuredQuery>,
    pub decision: Reasoned<Decision>,
    pub processed_at: DateTime<Utc>,
    pub policy_id: Option<String>,
    pub pdf_source: &'static str,
}

/// An error tagged with the claim it belongs to
#[derive(Debug)]
pub struct ClaimFailure {
    pub claim_id: Option<String>,
    pub error: Error,
}

impl ClaimFailure {
    fn new(claim_id: Option<String>, error: Error) -> Self {
        Self { claim_id, error }
    }
}

impl From<Error> for ClaimFailure {
    fn from(error: Error) -> Self {
        Self::new(None, error)
    }
}

impl IntoResponse for ClaimFailure {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = Json(json!({
            "error": self.error.to_string(),
            "error_type": self.error.kind(),
            "status": "failed",
            "claim_id": self.claim_id,
        }));
        (status, body).into_response()
    }
}

/// GET /api/v1/hackrx/run - readiness banner
pub async fn run_banner() -> Json<Value> {
    Json(json!({
        "status": "ready",
        "message": "SmartClaimsAI HackRX endpoint is ready. Send a POST request with claim_id and query.",
        "endpoint": "/api/v1/hackrx/run",
        "method": "POST",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// POST /api/v1/hackrx/run - assess a claim against a policy on disk
pub async fn run_claim(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ClaimRequest>, JsonRejection>,
) -> std::result::Result<Json<ClaimResponse>, ClaimFailure> {
    let Json(request) = payload.map_err(rejection_error)?;
    let (claim_id, query) = required_fields(request.claim_id, request.query)?;

    let policy_id = non_empty(request.policy_id)
        .unwrap_or_else(|| state.config().policies.default_policy_id.clone());

    let (source, pdf_source) = match non_empty(request.pdf_path) {
        Some(path) => (Some(PolicyDocument::path(path)), "provided"),
        None => match &state.config().policies.default_document {
            Some(path) => (Some(PolicyDocument::path(path)), "default"),
            None => (None, "cached"),
        },
    };

    tracing::info!(
        "Processing claim {} against policy {} ({})",
        claim_id,
        policy_id,
        pdf_source
    );

    let outcome = async {
        let index = state
            .pipeline()
            .index_for(&policy_id, source.as_ref())
            .await?;
        state.pipeline().assess_with_index(&index, &query).await
    }
    .await;

    finish(&state, claim_id, query, Some(policy_id), pdf_source, outcome)
}

/// POST /api/v1/hackrx/upload - assess a claim against an uploaded policy
///
/// Multipart fields: `claim_id`, `query`, optional `policy_id`, and `file`.
/// Without a `policy_id` the upload is indexed for this request only.
pub async fn upload_claim(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<ClaimResponse>, ClaimFailure> {
    let mut multipart = multipart
        .map_err(|e| Error::invalid(format!("Request must be multipart/form-data: {}", e)))?;

    let mut claim_id = None;
    let mut query = None;
    let mut policy_id = None;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("upload_{}.pdf", Uuid::new_v4()));
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::invalid(format!("Failed to read file: {}", e)))?;
                tracing::info!("Received policy upload {} ({} bytes)", filename, data.len());
                upload = Some(PolicyDocument::Upload {
                    name: filename,
                    data,
                });
            }
            "claim_id" | "query" | "policy_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::invalid(format!("Failed to read field {}: {}", name, e)))?;
                match name.as_str() {
                    "claim_id" => claim_id = Some(value),
                    "query" => query = Some(value),
                    _ => policy_id = Some(value),
                }
            }
            other => tracing::debug!("Ignoring multipart field {}", other),
        }
    }

    let (claim_id, query) = required_fields(claim_id, query)?;
    let Some(upload) = upload else {
        return Err(ClaimFailure::new(
            Some(claim_id),
            Error::invalid("Missing required field: file"),
        ));
    };
    let policy_id = non_empty(policy_id);

    let outcome = match &policy_id {
        Some(id) => {
            async {
                let index = state.pipeline().index_for(id, Some(&upload)).await?;
                state.pipeline().assess_with_index(&index, &query).await
            }
            .await
        }
        None => state.pipeline().run(&query, &upload).await,
    };

    finish(&state, claim_id, query, policy_id, "uploaded", outcome)
}

/// GET /api/v1/hackrx/status/:claim_id
pub async fn claim_status(
    State(state): State<AppState>,
    Path(claim_id): Path<String>,
) -> Result<Json<ClaimRecord>> {
    state.claim(&claim_id).map(Json)
}

/// Record the outcome in the ledger and shape the HTTP reply
fn finish(
    state: &AppState,
    claim_id: String,
    query: String,
    policy_id: Option<String>,
    pdf_source: &'static str,
    outcome: Result<ClaimAssessment>,
) -> std::result::Result<Json<ClaimResponse>, ClaimFailure> {
    let processed_at = Utc::now();

    match outcome {
        Ok(assessment) => {
            tracing::info!(
                "Claim {} processed with {} clauses",
                claim_id,
                assessment.clauses.len()
            );
            state.record_claim(ClaimRecord {
                claim_id: claim_id.clone(),
                status: ClaimStatus::Success,
                policy_id: policy_id.clone(),
                query: query.clone(),
                processed_at,
                decision: Some(assessment.decision.clone()),
                error: None,
                error_type: None,
            });
            Ok(Json(ClaimResponse {
                status: "success",
                claim_id,
                query,
                parsed_query: assessment.parsed_query,
                decision: assessment.decision,
                processed_at,
                policy_id,
                pdf_source,
            }))
        }
        Err(error) => {
            tracing::error!("Claim {} failed: {}", claim_id, error);
            state.record_claim(ClaimRecord {
                claim_id: claim_id.clone(),
                status: ClaimStatus::Failed,
                policy_id,
                query,
                processed_at,
                decision: None,
                error: Some(error.to_string()),
                error_type: Some(error.kind()),
            });
            Err(ClaimFailure::new(Some(claim_id), error))
        }
    }
}

fn required_fields(
    claim_id: Option<String>,
    query: Option<String>,
) -> std::result::Result<(String, String), ClaimFailure> {
    let claim_id = non_empty(claim_id);
    match (claim_id, non_empty(query)) {
        (Some(claim_id), Some(query)) => Ok((claim_id, query)),
        (claim_id, _) => Err(ClaimFailure::new(claim_id, Error::invalid(MISSING_FIELDS))),
    }
}

fn rejection_error(rejection: JsonRejection) -> ClaimFailure {
    let error = match rejection {
        JsonRejection::MissingJsonContentType(_) => Error::invalid("Request must be JSON"),
        other => Error::invalid(format!("Invalid JSON body: {}", other.body_text())),
    };
    ClaimFailure::from(error)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
