//! Request and response data transfer objects for the REST API.

use docsift_core::EntityMap;
use serde::{Deserialize, Serialize};

/// Response body for `POST /extract_entities/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResponse {
    /// Predicted document type, `"Unknown"` when classification had no
    /// answer.
    pub document_type: String,
    /// Classifier confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Extracted fields keyed by schema field name.
    pub entities: EntityMap,
    /// Wall-clock processing time, e.g. `"3.27s"`.
    pub processing_time: String,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
