//! Configuration structures for the docsift pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the docsift pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsiftConfig {
    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Classifier / vector index configuration.
    pub classifier: ClassifierConfig,

    /// LLM entity extraction configuration.
    pub llm: LlmConfig,

    /// Offline index builder configuration.
    pub builder: BuilderConfig,
}

impl Default for DocsiftConfig {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::default(),
            classifier: ClassifierConfig::default(),
            llm: LlmConfig::default(),
            builder: BuilderConfig::default(),
        }
    }
}

/// OCR engine and text extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory containing the OCR model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// DPI used when rasterizing PDF pages.
    pub render_dpi: u32,

    /// Vertical gap (in row units) that splits two paragraphs.
    pub paragraph_gap_rows: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            render_dpi: 400,
            paragraph_gap_rows: 2,
        }
    }
}

/// Vector index and embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Root directory for persisted collections.
    pub db_path: PathBuf,

    /// Collection holding the reference embeddings.
    pub collection: String,

    /// Embedding model file (ONNX).
    pub embedding_model: PathBuf,

    /// Tokenizer file for the embedding model.
    pub tokenizer: PathBuf,

    /// Output dimension of the embedding model.
    pub embedding_dim: usize,

    /// Maximum token length fed to the embedding model.
    pub max_tokens: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/vector_db"),
            collection: "document_types".to_string(),
            embedding_model: PathBuf::from("models/all-MiniLM-L6-v2.onnx"),
            tokenizer: PathBuf::from("models/tokenizer.json"),
            embedding_dim: 384,
            max_tokens: 256,
        }
    }
}

/// Local generative model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Generate endpoint of the local model runtime.
    pub endpoint: String,

    /// Model name passed to the runtime.
    pub model: String,

    /// Request timeout in seconds. Local inference is slow; minutes, not
    /// milliseconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "phi3:mini".to_string(),
            timeout_secs: 180,
        }
    }
}

/// Offline index builder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Root of the labeled corpus; subdirectory names are type labels.
    pub corpus_dir: PathBuf,

    /// Checkpoint log path.
    pub checkpoint_path: PathBuf,

    /// Number of OCR worker threads.
    pub workers: usize,

    /// Run every preprocessing variant per file.
    pub augment: bool,

    /// Number of texts encoded per embedding call.
    pub embed_chunk_size: usize,

    /// Number of records per index insertion batch.
    pub insert_batch_size: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("data"),
            checkpoint_path: PathBuf::from("data/ocr_checkpoint.jsonl"),
            workers: 4,
            augment: false,
            embed_chunk_size: 256,
            insert_batch_size: 128,
        }
    }
}

impl DocsiftConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}
