//! Core library for document classification and entity extraction.
//!
//! This crate provides:
//! - Text extraction from PDFs and scanned images via OCR
//! - Image preprocessing variants (denoise, threshold, deskew)
//! - Embedding-based document type classification over a persisted
//!   vector index
//! - Schema-driven entity extraction through a local LLM
//! - An offline, resumable index builder for labeled corpora

pub mod classify;
pub mod config;
pub mod embed;
pub mod error;
pub mod index;
pub mod llm;
pub mod ocr;
pub mod pipeline;
pub mod preprocess;
pub mod schema;

pub use classify::{Classification, ClassifyDocument, VectorClassifier};
pub use config::{BuilderConfig, ClassifierConfig, DocsiftConfig, LlmConfig, OcrConfig};
pub use embed::{Embedder, OnnxEmbedder};
pub use error::{DocsiftError, Result};
pub use index::{BuildReport, CheckpointLog, Collection, IndexBuilder};
pub use llm::{EntityMap, EntityValue, ExtractEntities, OllamaExtractor};
pub use ocr::{ExtractOutcome, OcrEngine, PureOcrEngine, SkipReason, TextExtractor};
pub use pipeline::{DocumentAnalysis, ExtractText, Pipeline, PipelineError};
pub use preprocess::Preprocessing;
pub use schema::{fields_for, supported_types, DOCUMENT_SCHEMAS};
