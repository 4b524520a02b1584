//! The end-to-end document analysis pipeline.
//!
//! Wires the three stages together behind seam traits so each collaborator
//! is injected explicitly: text extraction (blocking, CPU-bound),
//! classification (blocking), then entity extraction (async network call).
//! The blocking stages run on the runtime's blocking pool so request
//! handlers never stall the async executor.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::classify::ClassifyDocument;
use crate::error::{ClassifyError, ExtractError};
use crate::llm::{EntityMap, ExtractEntities};
use crate::ocr::{ExtractOutcome, TextExtractor};
use crate::preprocess::Preprocessing;

/// Black-box text extraction capability, the pipeline's first seam.
pub trait ExtractText: Send + Sync {
    /// Extract text from raw document bytes, routed by filename extension.
    fn extract(&self, bytes: &[u8], filename: &str) -> ExtractOutcome;
}

impl ExtractText for TextExtractor {
    fn extract(&self, bytes: &[u8], filename: &str) -> ExtractOutcome {
        TextExtractor::extract(self, bytes, filename, Preprocessing::None)
    }
}

/// Errors surfaced by a full pipeline run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The document was readable but OCR found nothing.
    #[error("Could not extract any text from the document.")]
    EmptyText,

    /// Classification failed; the message is the stage's contract text.
    #[error("{0}")]
    Classify(#[from] ClassifyError),

    /// Entity extraction failed; the message is the stage's contract text.
    #[error("{0}")]
    Extract(#[from] ExtractError),

    /// A blocking stage panicked or was cancelled.
    #[error("internal pipeline failure: {0}")]
    Internal(String),
}

/// The pipeline's full answer for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub document_type: String,
    pub confidence: f64,
    pub entities: EntityMap,
}

/// The assembled analysis pipeline. Collaborators are injected at
/// construction; the pipeline itself holds no global state and is cheap to
/// clone behind its `Arc`s.
#[derive(Clone)]
pub struct Pipeline {
    extractor: Arc<dyn ExtractText>,
    classifier: Arc<dyn ClassifyDocument>,
    entity_extractor: Arc<dyn ExtractEntities>,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn ExtractText>,
        classifier: Arc<dyn ClassifyDocument>,
        entity_extractor: Arc<dyn ExtractEntities>,
    ) -> Self {
        Self {
            extractor,
            classifier,
            entity_extractor,
        }
    }

    /// Analyze one uploaded document: OCR, classify, extract entities.
    ///
    /// OCR and classification run on the blocking pool; only the LLM call
    /// suspends on the async runtime.
    pub async fn analyze(
        &self,
        bytes: Vec<u8>,
        filename: String,
    ) -> Result<DocumentAnalysis, PipelineError> {
        let extractor = Arc::clone(&self.extractor);
        let classifier = Arc::clone(&self.classifier);

        let (text, classification) = tokio::task::spawn_blocking(move || {
            let outcome = extractor.extract(&bytes, &filename);
            if !outcome.has_text() {
                return Err(PipelineError::EmptyText);
            }
            let text = outcome.as_text().to_string();
            debug!("Extracted {} characters from '{}'", text.len(), filename);

            let classification = classifier.classify(&text)?;
            info!(
                "Classified '{}' as '{}' (confidence {})",
                filename, classification.document_type, classification.confidence
            );
            Ok((text, classification))
        })
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))??;

        let entities = self
            .entity_extractor
            .extract(&text, &classification.document_type)
            .await?;

        Ok(DocumentAnalysis {
            document_type: classification.document_type,
            confidence: classification.confidence,
            entities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use crate::llm::EntityValue;
    use crate::ocr::SkipReason;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct FixedText(&'static str);

    impl ExtractText for FixedText {
        fn extract(&self, _bytes: &[u8], _filename: &str) -> ExtractOutcome {
            ExtractOutcome::Text(self.0.to_string())
        }
    }

    struct SkippingText;

    impl ExtractText for SkippingText {
        fn extract(&self, _bytes: &[u8], _filename: &str) -> ExtractOutcome {
            ExtractOutcome::Skipped(SkipReason::UnsupportedExtension("txt".to_string()))
        }
    }

    struct FixedClassifier(&'static str, f64);

    impl ClassifyDocument for FixedClassifier {
        fn classify(&self, _text: &str) -> Result<Classification, ClassifyError> {
            Ok(Classification {
                document_type: self.0.to_string(),
                confidence: self.1,
            })
        }
    }

    struct DownClassifier;

    impl ClassifyDocument for DownClassifier {
        fn classify(&self, _text: &str) -> Result<Classification, ClassifyError> {
            Err(ClassifyError::Unavailable)
        }
    }

    struct FixedEntities;

    #[async_trait]
    impl ExtractEntities for FixedEntities {
        async fn extract(
            &self,
            _text: &str,
            document_type: &str,
        ) -> Result<EntityMap, ExtractError> {
            let mut map = EntityMap::new();
            map.insert(
                "document_type_seen".to_string(),
                EntityValue {
                    value: Some(serde_json::json!(document_type)),
                    confidence: 0.9,
                },
            );
            Ok(map)
        }
    }

    struct DownEntities;

    #[async_trait]
    impl ExtractEntities for DownEntities {
        async fn extract(&self, _text: &str, _ty: &str) -> Result<EntityMap, ExtractError> {
            Err(ExtractError::Connection)
        }
    }

    fn pipeline(
        extractor: impl ExtractText + 'static,
        classifier: impl ClassifyDocument + 'static,
        entities: impl ExtractEntities + 'static,
    ) -> Pipeline {
        Pipeline::new(Arc::new(extractor), Arc::new(classifier), Arc::new(entities))
    }

    #[tokio::test]
    async fn test_happy_path_threads_the_stages_together() {
        let pipeline = pipeline(
            FixedText("INVOICE INV-123"),
            FixedClassifier("invoice", 0.95),
            FixedEntities,
        );

        let analysis = pipeline
            .analyze(b"pdf bytes".to_vec(), "invoice.pdf".to_string())
            .await
            .unwrap();

        assert_eq!(analysis.document_type, "invoice");
        assert_eq!(analysis.confidence, 0.95);
        assert_eq!(
            analysis.entities["document_type_seen"].value,
            Some(serde_json::json!("invoice"))
        );
    }

    #[tokio::test]
    async fn test_textless_document_stops_before_classification() {
        let pipeline = pipeline(FixedText("   \n  "), DownClassifier, FixedEntities);

        let err = pipeline
            .analyze(b"scan".to_vec(), "blank.png".to_string())
            .await
            .unwrap_err();
        // EmptyText wins: the degraded classifier is never consulted.
        assert_eq!(err, PipelineError::EmptyText);
        assert_eq!(
            err.to_string(),
            "Could not extract any text from the document."
        );
    }

    #[tokio::test]
    async fn test_skipped_extraction_reports_empty_text() {
        let pipeline = pipeline(SkippingText, FixedClassifier("invoice", 0.9), FixedEntities);

        let err = pipeline
            .analyze(b"bytes".to_vec(), "notes.txt".to_string())
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::EmptyText);
    }

    #[tokio::test]
    async fn test_classifier_failure_propagates_contract_message() {
        let pipeline = pipeline(FixedText("some text"), DownClassifier, FixedEntities);

        let err = pipeline
            .analyze(b"bytes".to_vec(), "doc.pdf".to_string())
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::Classify(ClassifyError::Unavailable));
        assert_eq!(
            err.to_string(),
            "Vector database collection is not available."
        );
    }

    #[tokio::test]
    async fn test_llm_failure_propagates_contract_message() {
        let pipeline = pipeline(
            FixedText("some text"),
            FixedClassifier("invoice", 0.9),
            DownEntities,
        );

        let err = pipeline
            .analyze(b"bytes".to_vec(), "doc.pdf".to_string())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to connect to the local LLM service."
        );
    }
}
