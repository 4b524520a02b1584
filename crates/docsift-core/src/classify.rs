//! Document type classification by embedding nearest-neighbor lookup.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::embed::Embedder;
use crate::error::ClassifyError;
use crate::index::Collection;

/// A classification verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Predicted document type label, `"Unknown"` when nothing matched.
    pub document_type: String,
    /// Similarity-derived confidence in [0.0, 1.0], rounded to two decimal
    /// places.
    pub confidence: f64,
}

impl Classification {
    /// The verdict for an empty or unanswerable query.
    pub fn unknown() -> Self {
        Self {
            document_type: "Unknown".to_string(),
            confidence: 0.0,
        }
    }
}

/// Black-box classification capability.
pub trait ClassifyDocument: Send + Sync {
    /// Classify a document given its extracted text.
    fn classify(&self, text: &str) -> Result<Classification, ClassifyError>;
}

/// Classifier over a vector collection of labeled reference embeddings.
///
/// Construction never fails: when the collection or the embedding model
/// cannot be loaded, the classifier starts degraded and every `classify`
/// call reports [`ClassifyError::Unavailable`]. The serving process stays up
/// either way, matching the rest of the pipeline's fault posture.
pub struct VectorClassifier {
    inner: Option<ClassifierInner>,
}

struct ClassifierInner {
    embedder: Arc<dyn Embedder>,
    collection: Arc<Collection>,
}

impl VectorClassifier {
    /// Build a classifier from loaded parts.
    pub fn new(embedder: Arc<dyn Embedder>, collection: Arc<Collection>) -> Self {
        info!(
            "Classifier ready over collection '{}' ({} records)",
            collection.name(),
            collection.len()
        );
        Self {
            inner: Some(ClassifierInner {
                embedder,
                collection,
            }),
        }
    }

    /// Build a permanently degraded classifier. `reason` is logged once.
    pub fn unavailable(reason: &str) -> Self {
        error!(
            "Could not initialize vector database: {}. Classification will be unavailable.",
            reason
        );
        Self { inner: None }
    }

    /// True when the collection loaded and queries can be served.
    pub fn is_available(&self) -> bool {
        self.inner.is_some()
    }
}

impl ClassifyDocument for VectorClassifier {
    fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        let Some(inner) = &self.inner else {
            return Err(ClassifyError::Unavailable);
        };

        let embedding = inner.embedder.embed(text).map_err(|e| {
            error!("An error occurred during vector database query: {}", e);
            ClassifyError::Query
        })?;

        let neighbors = inner.collection.query(&embedding, 1);
        let Some(nearest) = neighbors.first() else {
            warn!("Nearest-neighbor query returned no results");
            return Ok(Classification::unknown());
        };

        let confidence = round2(1.0 - nearest.distance as f64);
        let document_type = nearest
            .metadata
            .document_type
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(Classification {
            document_type,
            confidence,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbedError;
    use crate::index::{IndexRecord, RecordMetadata};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct FixedEmbedder(Vec<f32>);

    impl Embedder for FixedEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Ok(self.0.clone())
        }

        fn dimension(&self) -> usize {
            self.0.len()
        }
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Inference("boom".to_string()))
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    fn collection_with(records: Vec<IndexRecord>) -> Arc<Collection> {
        let dir = TempDir::new().unwrap();
        let mut collection = Collection::create_or_open(dir.path(), "document_types").unwrap();
        collection.insert(records).unwrap();
        Arc::new(collection)
    }

    fn record(id: &str, embedding: Vec<f32>, metadata: RecordMetadata) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            embedding,
            metadata,
        }
    }

    #[test]
    fn test_unavailable_classifier_reports_contract_error() {
        let classifier = VectorClassifier::unavailable("collection missing");
        assert!(!classifier.is_available());
        let err = classifier.classify("any text").unwrap_err();
        assert_eq!(err, ClassifyError::Unavailable);
        assert_eq!(
            err.to_string(),
            "Vector database collection is not available."
        );
    }

    #[test]
    fn test_classify_returns_nearest_label_and_rounded_confidence() {
        let collection = collection_with(vec![
            record(
                "id_0",
                vec![1.0, 0.0, 0.0],
                RecordMetadata::for_type("invoice"),
            ),
            record(
                "id_1",
                vec![0.0, 1.0, 0.0],
                RecordMetadata::for_type("receipt"),
            ),
        ]);
        let classifier =
            VectorClassifier::new(Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])), collection);

        let verdict = classifier.classify("total amount due").unwrap();
        assert_eq!(verdict.document_type, "invoice");
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn test_confidence_is_rounded_to_two_decimals() {
        // The stored vector is unit-norm with first component 0.874, so the
        // cosine distance from the query [1, 0, 0] is 0.126 and the raw
        // confidence 0.874. Anything but two-decimal rounding of 1 - d
        // produces a different value here.
        let collection = collection_with(vec![record(
            "id_0",
            vec![0.8740, 0.4859, 0.0],
            RecordMetadata::for_type("letter"),
        )]);
        let classifier = VectorClassifier::new(
            Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])),
            collection,
        );

        let verdict = classifier.classify("dear sir").unwrap();
        assert_eq!(verdict.confidence, 0.87);
    }

    #[test]
    fn test_empty_collection_classifies_as_unknown() {
        let collection = collection_with(Vec::new());
        let classifier =
            VectorClassifier::new(Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])), collection);

        let verdict = classifier.classify("anything").unwrap();
        assert_eq!(verdict, Classification::unknown());
    }

    #[test]
    fn test_missing_document_type_metadata_defaults_to_unknown() {
        let collection = collection_with(vec![record(
            "id_0",
            vec![1.0, 0.0, 0.0],
            RecordMetadata::default(),
        )]);
        let classifier =
            VectorClassifier::new(Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])), collection);

        let verdict = classifier.classify("anything").unwrap();
        assert_eq!(verdict.document_type, "Unknown");
    }

    #[test]
    fn test_embedding_failure_is_a_query_error() {
        let collection = collection_with(vec![record(
            "id_0",
            vec![1.0, 0.0, 0.0],
            RecordMetadata::for_type("memo"),
        )]);
        let classifier = VectorClassifier::new(Arc::new(FailingEmbedder), collection);

        let err = classifier.classify("anything").unwrap_err();
        assert_eq!(err, ClassifyError::Query);
        assert_eq!(err.to_string(), "Failed to query the vector database.");
    }
}
