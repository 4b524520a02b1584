//! Schema-driven entity extraction via a local Ollama-compatible LLM.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::LlmConfig;
use crate::error::ExtractError;
use crate::schema::fields_for;

const PROMPT_TEMPLATE: &str = "\
Given the following text extracted from a document of type '{document_type}', extract the following fields: {field_list}.
Return your response as a valid JSON object.
For each field, provide a nested JSON object with two keys: \"value\" which is the extracted information (or null if not found), and \"confidence\" which is your estimated confidence score from 0.0 to 1.0 that the value is correct based on the text.
Provide no additional text, commentary, or explanation outside of the JSON object.

Document Text:
---
{document_text}
---
";

/// One extracted field: the model's answer plus its self-reported
/// confidence. The confidence is a hint from the model, not a calibrated
/// probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityValue {
    /// Extracted value, `null` when the model could not find the field.
    pub value: Option<serde_json::Value>,
    /// Model-estimated confidence in [0.0, 1.0].
    #[serde(default)]
    pub confidence: f64,
}

/// Extracted entities keyed by field name.
pub type EntityMap = BTreeMap<String, EntityValue>;

/// Black-box entity extraction capability.
#[async_trait]
pub trait ExtractEntities: Send + Sync {
    /// Extract the schema fields for `document_type` from `text`.
    ///
    /// Types without a schema yield an empty map without consulting the
    /// model.
    async fn extract(&self, text: &str, document_type: &str) -> Result<EntityMap, ExtractError>;
}

/// Build the extraction prompt for a document type and its field list.
pub fn build_prompt(document_type: &str, fields: &[&str], document_text: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{document_type}", document_type)
        .replace("{field_list}", &fields.join(", "))
        .replace("{document_text}", document_text)
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Entity extractor backed by a local Ollama `/api/generate` endpoint.
pub struct OllamaExtractor {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaExtractor {
    /// Build an extractor from configuration. The request timeout is
    /// generous because small local models can take minutes on long
    /// documents.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|_| ExtractError::Connection)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, ExtractError> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("Error calling LLM API: {}", e);
                ExtractError::Connection
            })?;

        let response = response.error_for_status().map_err(|e| {
            error!("LLM API returned an error status: {}", e);
            ExtractError::Connection
        })?;

        let body: GenerateResponse = response.json().await.map_err(|e| {
            error!("Error decoding LLM API envelope: {}", e);
            ExtractError::Connection
        })?;

        Ok(body.response)
    }
}

#[async_trait]
impl ExtractEntities for OllamaExtractor {
    async fn extract(&self, text: &str, document_type: &str) -> Result<EntityMap, ExtractError> {
        let Some(fields) = fields_for(document_type) else {
            debug!(
                "No extraction schema for document type '{}', skipping LLM call",
                document_type
            );
            return Ok(EntityMap::new());
        };

        let prompt = build_prompt(document_type, fields, text);
        let response_text = self.generate(&prompt).await?;

        let entities: EntityMap = serde_json::from_str(&response_text).map_err(|e| {
            error!("LLM returned a non-JSON response: {}", e);
            ExtractError::Malformed
        })?;

        info!(
            "Extracted {} fields for document type '{}'",
            entities.len(),
            document_type
        );
        Ok(entities)
    }
}
