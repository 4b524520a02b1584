//! Text embedding via a sentence-transformer ONNX model.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array2;
use ort::ep::XNNPACK;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::error::EmbedError;

/// Black-box embedding capability.
///
/// The same model must be used for building the index and for classifying,
/// otherwise distances are meaningless.
pub trait Embedder: Send + Sync {
    /// Embed one text into a fixed-length vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed a batch of texts. The default forwards to [`embed`](Self::embed)
    /// one at a time; implementations with real batch support override it.
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Output vector length.
    fn dimension(&self) -> usize;
}

/// Sentence embedder backed by a MiniLM-style ONNX model.
///
/// Runs the transformer, mean-pools token states under the attention mask,
/// and L2-normalizes, matching the sentence-transformers recipe the index
/// was built against.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimension: usize,
    max_tokens: usize,
}

impl OnnxEmbedder {
    /// Load the model and tokenizer from files.
    pub fn from_files(
        model_path: &Path,
        tokenizer_path: &Path,
        dimension: usize,
        max_tokens: usize,
    ) -> Result<Self, EmbedError> {
        debug!("Loading embedding model from {}", model_path.display());

        let session = Session::builder()
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?
            .with_execution_providers([XNNPACK::default().build()])
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbedError::ModelLoad(format!("tokenizer: {}", e)))?;

        info!("Embedding model loaded ({}-dim)", dimension);

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimension,
            max_tokens,
        })
    }

    fn run_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbedError::Tokenize(e.to_string()))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(self.max_tokens))
            .max()
            .unwrap_or(1)
            .max(1);
        let batch = encodings.len();

        let mut input_ids = vec![0i64; batch * seq_len];
        let mut attention_mask = vec![0i64; batch * seq_len];
        let mut token_type_ids = vec![0i64; batch * seq_len];

        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();
            for col in 0..ids.len().min(seq_len) {
                input_ids[row * seq_len + col] = ids[col] as i64;
                attention_mask[row * seq_len + col] = mask[col] as i64;
                token_type_ids[row * seq_len + col] = types[col] as i64;
            }
        }

        let shape: Vec<i64> = vec![batch as i64, seq_len as i64];
        let ids_tensor = Tensor::from_array((shape.clone(), input_ids))
            .map_err(|e| EmbedError::Inference(e.to_string()))?;
        let mask_tensor = Tensor::from_array((shape.clone(), attention_mask.clone()))
            .map_err(|e| EmbedError::Inference(e.to_string()))?;
        let type_tensor = Tensor::from_array((shape, token_type_ids))
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedError::Inference(format!("failed to lock session: {}", e)))?;

        let inputs: Vec<(&str, ort::session::SessionInputValue)> = vec![
            ("input_ids", ids_tensor.into()),
            ("attention_mask", mask_tensor.into()),
            ("token_type_ids", type_tensor.into()),
        ];
        let outputs = session
            .run(inputs)
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| EmbedError::Inference("model produced no outputs".to_string()))?;
        let (out_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        let hidden = *out_shape
            .last()
            .ok_or_else(|| EmbedError::Inference("scalar model output".to_string()))?
            as usize;
        if hidden != self.dimension {
            return Err(EmbedError::Inference(format!(
                "model emits {}-dim states, expected {}",
                hidden, self.dimension
            )));
        }

        let states = Array2::from_shape_vec((batch * seq_len, hidden), data.to_vec())
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        let mut vectors = Vec::with_capacity(batch);
        for row in 0..batch {
            let mut pooled = vec![0f32; hidden];
            let mut count = 0f32;
            for col in 0..seq_len {
                if attention_mask[row * seq_len + col] == 0 {
                    continue;
                }
                count += 1.0;
                let token = states.row(row * seq_len + col);
                for (acc, v) in pooled.iter_mut().zip(token.iter()) {
                    *acc += v;
                }
            }
            if count > 0.0 {
                for v in &mut pooled {
                    *v /= count;
                }
            }
            l2_normalize(&mut pooled);
            vectors.push(pooled);
        }

        Ok(vectors)
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.run_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::Inference("empty batch result".to_string()))
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.run_batch(texts)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
