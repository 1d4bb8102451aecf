//! Error types for the claim pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for claim pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Claim pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed caller input (chunk parameters, missing request fields)
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source document does not exist
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Requested resource (claim record, cached policy) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Source document exists but could not be turned into text
    #[error("Failed to load document '{source_name}': {message}")]
    DocumentLoad { source_name: String, message: String },

    /// Embedding service failure
    #[error("Embedding service error: {0}")]
    Embedding(String),

    /// Reasoning (LLM) service failure
    #[error("Reasoning service error: {0}")]
    Reasoning(String),

    /// External call exceeded its time bound
    #[error("{service} call timed out after {seconds}s")]
    Timeout { service: String, seconds: u64 },

    /// Embedding vectors of inconsistent dimension
    #[error("Embedding dimension mismatch at position {position}: expected {expected}, found {found}")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        position: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an input validation error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InputValidation(message.into())
    }

    /// Create a document load error
    pub fn document_load(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DocumentLoad {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a reasoning error
    pub fn reasoning(message: impl Into<String>) -> Self {
        Self::Reasoning(message.into())
    }

    /// Create a timeout error
    pub fn timeout(service: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            service: service.into(),
            seconds,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status reported for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InputValidation(_) => StatusCode::BAD_REQUEST,
            Error::DocumentNotFound(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InputValidation(_) => "validation_error",
            Error::Config(_) => "config_error",
            Error::DocumentNotFound(_) => "document_not_found",
            Error::NotFound(_) => "not_found",
            Error::DocumentLoad { .. } => "document_load_error",
            Error::Embedding(_) => "embedding_service_error",
            Error::Reasoning(_) => "reasoning_service_error",
            Error::Timeout { .. } => "timeout",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "error_type": self.kind(),
            "status": "failed",
        }));

        (status, body).into_response()
    }
}
