//! HTTP API for the document understanding pipeline, built on Axum.
//!
//! The server exposes two routes: `POST /extract_entities/` running the full
//! OCR → classify → extract pipeline over an uploaded document, and
//! `GET /health` as a cheap liveness probe that never touches the models.

/// API error types mapped to HTTP status codes.
pub mod errors;
/// HTTP request handlers and application state.
pub mod handlers;
/// Request and response data transfer objects.
pub mod models;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

pub use handlers::AppState;

/// Upload size cap for the extraction endpoint. Multi-page scans rasterized
/// at 400 DPI routinely exceed Axum's 2 MiB default body limit.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Builds the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/extract_entities/", post(handlers::extract_entities))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
