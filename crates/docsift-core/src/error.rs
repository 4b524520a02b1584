//! Error types for the docsift-core library.

use thiserror::Error;

/// Main error type for the docsift library.
#[derive(Error, Debug)]
pub enum DocsiftError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Document classification error.
    #[error("classification error: {0}")]
    Classify(#[from] ClassifyError),

    /// Entity extraction error.
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Vector index error.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embed(#[from] EmbedError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF container.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// No page raster could be produced for a page.
    #[error("failed to rasterize page {0}")]
    PageRaster(u32),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors from the document classifier.
///
/// Message text is part of the API contract: it is surfaced verbatim in
/// error responses.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyError {
    /// The collection never loaded; every call fails without querying.
    #[error("Vector database collection is not available.")]
    Unavailable,

    /// Embedding or nearest-neighbor query failed.
    #[error("Failed to query the vector database.")]
    Query,
}

/// Errors from the LLM entity extractor.
///
/// Message text is part of the API contract.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    /// The model service could not be reached or returned a bad status.
    #[error("Failed to connect to the local LLM service.")]
    Connection,

    /// The model responded but its payload was not valid JSON.
    #[error("LLM returned a malformed response.")]
    Malformed,
}

/// Errors from the embedding model.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Failed to load the embedding model or tokenizer.
    #[error("failed to load embedding model: {0}")]
    ModelLoad(String),

    /// Tokenization failed.
    #[error("tokenization failed: {0}")]
    Tokenize(String),

    /// Model inference failed.
    #[error("embedding inference failed: {0}")]
    Inference(String),
}

/// Errors from the vector index and the offline builder.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The collection does not exist on disk.
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// A persisted record could not be read back.
    #[error("failed to load collection: {0}")]
    Load(String),

    /// Appending records to the collection failed.
    #[error("failed to insert into collection: {0}")]
    Insert(String),

    /// Checkpoint log I/O failed.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// The corpus root is missing or empty.
    #[error("corpus error: {0}")]
    Corpus(String),

    /// Batch embedding failed; fatal for the build run.
    #[error("embedding phase failed: {0}")]
    Embedding(String),
}

/// Result type for the docsift library.
pub type Result<T> = std::result::Result<T, DocsiftError>;
