//! Route handlers and the JSON error type they share.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use engine::{EngineError, FieldErrors};

use crate::orchestrator::OrchestratorError;
use crate::store::StoreError;

pub mod forms;
pub mod submissions;
pub mod workflows;

/// Errors returned to HTTP callers as `{ "error": ... }` bodies.
#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    BadRequest(String),
    /// Workflow validation messages.
    Rejected(Vec<String>),
    /// Per-field submission errors.
    InvalidFields(FieldErrors),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": format!("{what} not found") }))).into_response()
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response(),
            ApiError::Rejected(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "Invalid workflow", "errors": errors })),
            )
                .into_response(),
            ApiError::InvalidFields(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "Validation failed", "fieldErrors": fields })),
            )
                .into_response(),
            ApiError::Internal(msg) => {
                error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Internal server error" })))
                    .into_response()
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("Resource"),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::FormNotFound(_) => ApiError::NotFound("Form"),
            OrchestratorError::Invalid(fields) => ApiError::InvalidFields(fields),
            OrchestratorError::Workflow(EngineError::Rejected(errors)) => ApiError::Rejected(errors),
            OrchestratorError::Workflow(EngineError::InvalidDefinition(e)) => ApiError::BadRequest(e.to_string()),
            OrchestratorError::Store(e) => e.into(),
        }
    }
}
