//! Command implementations and shared pipeline assembly.

pub mod build_index;
pub mod config;
pub mod preprocess;
pub mod process;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use docsift_core::{
    DocsiftConfig, OllamaExtractor, OnnxEmbedder, Pipeline, PureOcrEngine, TextExtractor,
    VectorClassifier,
};
use docsift_core::index::Collection;

/// Load configuration from the given path, falling back to defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<DocsiftConfig> {
    match config_path {
        Some(path) => Ok(DocsiftConfig::from_file(Path::new(path))?),
        None => Ok(DocsiftConfig::default()),
    }
}

/// Assemble the full analysis pipeline from configuration.
///
/// The OCR engine and LLM client must load; a missing vector collection or
/// embedding model degrades the classifier instead of failing, so the
/// server can come up and report the outage per request.
pub fn build_pipeline(config: &DocsiftConfig) -> anyhow::Result<Pipeline> {
    let engine = PureOcrEngine::from_config(&config.ocr)
        .map_err(|e| anyhow::anyhow!("Failed to load OCR models: {}", e))?;
    let extractor = TextExtractor::new(Arc::new(engine), config.ocr.render_dpi);

    let classifier = match build_classifier(config) {
        Ok(classifier) => classifier,
        Err(e) => {
            warn!("{}", e);
            VectorClassifier::unavailable(&e.to_string())
        }
    };

    let llm = OllamaExtractor::from_config(&config.llm)
        .map_err(|e| anyhow::anyhow!("Failed to build LLM client: {}", e))?;

    Ok(Pipeline::new(
        Arc::new(extractor),
        Arc::new(classifier),
        Arc::new(llm),
    ))
}

fn build_classifier(config: &DocsiftConfig) -> anyhow::Result<VectorClassifier> {
    let embedder = OnnxEmbedder::from_files(
        &config.classifier.embedding_model,
        &config.classifier.tokenizer,
        config.classifier.embedding_dim,
        config.classifier.max_tokens,
    )?;
    let collection = Collection::open(&config.classifier.db_path, &config.classifier.collection)?;
    Ok(VectorClassifier::new(
        Arc::new(embedder),
        Arc::new(collection),
    ))
}
