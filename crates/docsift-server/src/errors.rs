//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to a status code and produces a JSON body
//! `{"detail": "message"}`. The message strings for pipeline failures are
//! the stage contract texts and must be passed through verbatim.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use docsift_core::PipelineError;

/// Application-level error type that implements `IntoResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Invalid request, e.g. an unsupported upload type (400).
    BadRequest(String),
    /// The document was readable but carried no recognizable text (422).
    Unprocessable(String),
    /// A pipeline stage failed (500).
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, axum::Json(json!({ "detail": message }))).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::EmptyText => ApiError::Unprocessable(err.to_string()),
            PipelineError::Classify(_) | PipelineError::Extract(_) => {
                ApiError::Internal(err.to_string())
            }
            PipelineError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}
