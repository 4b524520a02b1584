//! Text extraction from uploaded documents.
//!
//! Dispatches on the filename extension: PDFs are processed page by page,
//! raster images in one shot. Engine-level failures never escape this
//! module as errors; they degrade to a [`Skipped`](ExtractOutcome::Skipped)
//! outcome or partial text, with a logged diagnostic, because one bad
//! upload must not sink a batch run.

mod engine;
mod pdf;

pub use engine::{OcrEngine, PureOcrEngine};
pub use pdf::PdfDocument;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::preprocess::Preprocessing;

/// File suffixes routed to the PDF path.
pub const SUPPORTED_PDF_EXTENSIONS: &[&str] = &["pdf"];

/// File suffixes routed to the single-image path.
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

/// True when a filename's extension (case-insensitive) is recognized by the
/// extractor.
pub fn is_supported_file(filename: &str) -> bool {
    let ext = extension_of(filename);
    SUPPORTED_PDF_EXTENSIONS.contains(&ext.as_str())
        || SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str())
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Why a document produced no text at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The extension is not in the supported set.
    UnsupportedExtension(String),
    /// The PDF container could not be parsed (corrupt or encrypted).
    UnreadablePdf(String),
    /// The image bytes could not be decoded.
    UnreadableImage(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UnsupportedExtension(ext) => {
                write!(f, "unsupported file extension '{}'", ext)
            }
            SkipReason::UnreadablePdf(msg) => write!(f, "unreadable PDF: {}", msg),
            SkipReason::UnreadableImage(msg) => write!(f, "unreadable image: {}", msg),
        }
    }
}

/// Typed result of text extraction.
///
/// Callers branch on the variant instead of comparing against an
/// empty-string sentinel. A readable document with no recognizable text is
/// still `Text` (with an empty or whitespace-only string); `Skipped` means
/// the document was never recognized at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Newline-joined text blocks, in page order then in-page order.
    Text(String),
    /// The document could not be processed; the reason was logged.
    Skipped(SkipReason),
}

impl ExtractOutcome {
    /// The extracted text, degraded to `""` for skipped documents.
    pub fn as_text(&self) -> &str {
        match self {
            ExtractOutcome::Text(text) => text,
            ExtractOutcome::Skipped(_) => "",
        }
    }

    /// True when extraction produced at least one non-whitespace character.
    pub fn has_text(&self) -> bool {
        !self.as_text().trim().is_empty()
    }
}

/// Text extractor combining PDF page handling, preprocessing, and an OCR
/// engine.
///
/// The engine is injected once at construction and shared across all calls;
/// reloading recognition models per request is prohibitively expensive.
#[derive(Clone)]
pub struct TextExtractor {
    engine: Arc<dyn OcrEngine>,
    render_dpi: u32,
}

impl TextExtractor {
    /// Create an extractor around a shared OCR engine.
    pub fn new(engine: Arc<dyn OcrEngine>, render_dpi: u32) -> Self {
        Self { engine, render_dpi }
    }

    /// Extract text from a document given as raw bytes plus its original
    /// filename. The extension decides the processing path.
    pub fn extract(
        &self,
        bytes: &[u8],
        filename: &str,
        preprocessing: Preprocessing,
    ) -> ExtractOutcome {
        let ext = extension_of(filename);

        if SUPPORTED_PDF_EXTENSIONS.contains(&ext.as_str()) {
            self.extract_pdf(bytes, filename, preprocessing)
        } else if SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            self.extract_image(bytes, filename, preprocessing)
        } else {
            warn!("Unsupported file type '{}' for file '{}'", ext, filename);
            ExtractOutcome::Skipped(SkipReason::UnsupportedExtension(ext))
        }
    }

    fn extract_pdf(
        &self,
        bytes: &[u8],
        filename: &str,
        preprocessing: Preprocessing,
    ) -> ExtractOutcome {
        let doc = match PdfDocument::load(bytes) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Failed to open PDF '{}': {}", filename, e);
                return ExtractOutcome::Skipped(SkipReason::UnreadablePdf(e.to_string()));
            }
        };

        let mut blocks: Vec<String> = Vec::new();
        for page in 1..=doc.page_count() {
            // A single broken page must not fail the whole document.
            match self.recognize_page(&doc, page, preprocessing) {
                Ok(page_blocks) => blocks.extend(page_blocks),
                Err(e) => {
                    warn!("Could not process page {} of '{}': {}", page, filename, e);
                    continue;
                }
            }
        }

        ExtractOutcome::Text(blocks.join("\n"))
    }

    fn recognize_page(
        &self,
        doc: &PdfDocument,
        page: u32,
        preprocessing: Preprocessing,
    ) -> Result<Vec<String>, crate::error::DocsiftError> {
        let raster = doc.page_image(page, self.render_dpi)?;
        let prepared = preprocessing.apply(&raster);
        debug!("Recognizing page {} ({:?})", page, preprocessing);
        Ok(self.engine.recognize(&prepared)?)
    }

    fn extract_image(
        &self,
        bytes: &[u8],
        filename: &str,
        preprocessing: Preprocessing,
    ) -> ExtractOutcome {
        let image = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(e) => {
                warn!("Failed to decode image '{}': {}", filename, e);
                return ExtractOutcome::Skipped(SkipReason::UnreadableImage(e.to_string()));
            }
        };

        let prepared = preprocessing.apply(&image);
        match self.engine.recognize(&prepared) {
            Ok(blocks) => ExtractOutcome::Text(blocks.join("\n")),
            Err(e) => {
                warn!("OCR failed on image '{}': {}", filename, e);
                ExtractOutcome::Skipped(SkipReason::UnreadableImage(e.to_string()))
            }
        }
    }
}
