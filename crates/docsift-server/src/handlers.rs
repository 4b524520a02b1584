//! HTTP request handlers and shared application state.
//!
//! Each public async function corresponds to a route registered in
//! [`create_router`](crate::create_router). Handlers validate the upload,
//! delegate to the injected [`Pipeline`], and map pipeline failures onto
//! [`ApiError`](crate::errors::ApiError) responses.

use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::Json;
use tracing::info;

use docsift_core::Pipeline;

use crate::errors::ApiError;
use crate::models::{ExtractionResponse, HealthResponse};

/// MIME types accepted by the upload endpoint.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/bmp",
    "image/tiff",
];

/// Shared application state passed to every handler via Axum's `State`
/// extractor. The pipeline is assembled once at startup; handlers never
/// construct collaborators.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
}

/// `GET /health`: fast liveness probe, touches no models.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// `POST /extract_entities/`: the full pipeline of OCR, classification,
/// and entity extraction.
pub async fn extract_entities(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractionResponse>, ApiError> {
    let start = Instant::now();

    let upload = read_upload(multipart).await?;
    if !SUPPORTED_MIME_TYPES.contains(&upload.content_type.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Invalid file type. Supported types are: {}",
            SUPPORTED_MIME_TYPES.join(", ")
        )));
    }

    let analysis = state.pipeline.analyze(upload.bytes, upload.filename).await?;

    let processing_time = format!("{:.2}s", start.elapsed().as_secs_f64());
    info!(
        "Processed upload as '{}' in {}",
        analysis.document_type, processing_time
    );

    Ok(Json(ExtractionResponse {
        document_type: analysis.document_type,
        confidence: analysis.confidence,
        entities: analysis.entities,
        processing_time,
    }))
}

struct Upload {
    bytes: Vec<u8>,
    filename: String,
    content_type: String,
}

/// Pull the `file` part out of the multipart body.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
            .to_vec();

        return Ok(Upload {
            bytes,
            filename,
            content_type,
        });
    }

    Err(ApiError::BadRequest(
        "Missing 'file' field in multipart body".to_string(),
    ))
}
