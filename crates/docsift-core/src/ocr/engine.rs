//! OCR engine abstraction and the pure-Rust reference implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info};

use crate::config::OcrConfig;
use crate::error::OcrError;

/// Black-box text recognition capability.
///
/// Implementations take a page image and return paragraph-level text blocks
/// in reading order. Engines are expensive to construct (model load) and are
/// shared across many calls behind an `Arc`, so they must be usable from
/// several threads at once.
pub trait OcrEngine: Send + Sync {
    /// Recognize text in an image, returning ordered paragraph blocks.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<String>, OcrError>;
}

/// A recognized line with its vertical placement, used for paragraph
/// grouping.
struct RecognizedLine {
    text: String,
    top: f32,
    bottom: f32,
    left: f32,
}

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX
/// Runtime).
pub struct PureOcrEngine {
    engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
    paragraph_gap_rows: u32,
}

// SAFETY: `pure_onnx_ocr::engine::OcrEngine` is not auto-Send/Sync only
// because its inference sessions keep `RefCell` plan caches behind `Arc`s.
// Those `Arc`s never escape the engine value (the builder creates fresh
// sessions and the engine is not `Clone`), so the engine moves between
// threads as a unit, and the `Mutex` above serializes every access to it.
unsafe impl Send for PureOcrEngine {}
unsafe impl Sync for PureOcrEngine {}

impl PureOcrEngine {
    /// Create an engine from the model files named in the configuration.
    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        let det_path = config.model_dir.join(&config.detection_model);
        let rec_path = config.model_dir.join(&config.recognition_model);
        let dict_path = config.model_dir.join(&config.dictionary);
        Self::from_paths(&det_path, &rec_path, &dict_path, config.paragraph_gap_rows)
    }

    /// Create an engine from explicit model file paths.
    pub fn from_paths(
        det_path: &Path,
        rec_path: &Path,
        dict_path: &Path,
        paragraph_gap_rows: u32,
    ) -> Result<Self, OcrError> {
        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(det_path)
            .rec_model_path(rec_path)
            .dictionary_path(dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine");

        Ok(Self {
            engine: Mutex::new(engine),
            paragraph_gap_rows,
        })
    }
}

impl OcrEngine for PureOcrEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<String>, OcrError> {
        let start = Instant::now();

        let results = self
            .engine
            .lock()
            .map_err(|e| OcrError::Recognition(format!("failed to lock engine: {}", e)))?
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let mut lines: Vec<RecognizedLine> = results
            .iter()
            .filter(|r| !r.text.trim().is_empty())
            .map(|r| {
                let (top, bottom, left) = polygon_vertical_extent(&r.bounding_box);
                RecognizedLine {
                    text: r.text.replace("[UNK]", " ").trim().to_string(),
                    top,
                    bottom,
                    left,
                }
            })
            .collect();

        let blocks = group_paragraphs(&mut lines, self.paragraph_gap_rows);

        info!(
            "OCR complete: {} paragraph blocks in {}ms",
            blocks.len(),
            start.elapsed().as_millis()
        );

        Ok(blocks)
    }
}

/// Top, bottom, and left of a quadrilateral's axis-aligned extent.
fn polygon_vertical_extent(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32, f32) {
    let mut top = f32::INFINITY;
    let mut bottom = f32::NEG_INFINITY;
    let mut left = f32::INFINITY;
    for coord in polygon.exterior().coords().take(4) {
        top = top.min(coord.y as f32);
        bottom = bottom.max(coord.y as f32);
        left = left.min(coord.x as f32);
    }
    (top, bottom, left)
}

/// Sort lines into reading order and join runs of vertically adjacent lines
/// into paragraph blocks. Per-line tokens fragment downstream embedding and
/// prompting; paragraph granularity is what the rest of the pipeline wants.
fn group_paragraphs(lines: &mut Vec<RecognizedLine>, gap_rows: u32) -> Vec<String> {
    if lines.is_empty() {
        return Vec::new();
    }

    // Reading order: coarse rows top-to-bottom, then left-to-right.
    lines.sort_by(|a, b| {
        let row_a = (a.top / 20.0) as i32;
        let row_b = (b.top / 20.0) as i32;
        if row_a != row_b {
            row_a.cmp(&row_b)
        } else {
            a.left.partial_cmp(&b.left).unwrap_or(std::cmp::Ordering::Equal)
        }
    });

    let mut heights: Vec<f32> = lines.iter().map(|l| l.bottom - l.top).collect();
    heights.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_height = heights[heights.len() / 2].max(1.0);
    let gap_limit = median_height * gap_rows as f32;

    let mut blocks = Vec::new();
    let mut current = lines[0].text.clone();
    let mut prev_bottom = lines[0].bottom;

    for line in lines.iter().skip(1) {
        if line.top - prev_bottom > gap_limit {
            blocks.push(std::mem::take(&mut current));
            current = line.text.clone();
        } else {
            current.push(' ');
            current.push_str(&line.text);
        }
        prev_bottom = prev_bottom.max(line.bottom);
    }
    blocks.push(current);
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(text: &str, top: f32, bottom: f32, left: f32) -> RecognizedLine {
        RecognizedLine {
            text: text.to_string(),
            top,
            bottom,
            left,
        }
    }

    #[test]
    fn test_adjacent_lines_merge_into_one_paragraph() {
        let mut lines = vec![
            line("Invoice number:", 0.0, 10.0, 0.0),
            line("INV-123", 12.0, 22.0, 0.0),
        ];
        let blocks = group_paragraphs(&mut lines, 2);
        assert_eq!(blocks, vec!["Invoice number: INV-123".to_string()]);
    }

    #[test]
    fn test_large_gap_splits_paragraphs() {
        let mut lines = vec![
            line("Header", 0.0, 10.0, 0.0),
            line("Footer", 100.0, 110.0, 0.0),
        ];
        let blocks = group_paragraphs(&mut lines, 2);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], "Header");
        assert_eq!(blocks[1], "Footer");
    }

    #[test]
    fn test_same_row_sorts_left_to_right() {
        let mut lines = vec![
            line("right", 0.0, 10.0, 200.0),
            line("left", 2.0, 11.0, 0.0),
        ];
        let blocks = group_paragraphs(&mut lines, 2);
        assert_eq!(blocks, vec!["left right".to_string()]);
    }

    #[test]
    fn test_empty_input_yields_no_blocks() {
        let mut lines = Vec::new();
        assert!(group_paragraphs(&mut lines, 2).is_empty());
    }
}
