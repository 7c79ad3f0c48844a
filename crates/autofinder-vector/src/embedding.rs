//! Text embedders for catalog descriptions and search queries.
//!
//! Two backends share one trait:
//! - `OnnxEmbeddingService` runs a sentence-transformer export through ONNX
//!   Runtime, tokenized by a HuggingFace `tokenizer.json`.
//! - `HashEmbedding` needs no model files. Its vectors are stable across runs,
//!   which keeps a persisted index valid, and overlapping wording yields
//!   nearby vectors.

use std::path::Path;
use std::sync::{Arc, Mutex};

use autofinder_core::error::AutoFinderError;
use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;
use tracing::info;

/// Fallback width when the model does not declare its output dimension.
const DEFAULT_ONNX_DIMENSIONS: usize = 384;

/// Maps text to a fixed-width vector.
///
/// The catalog index embeds vehicle descriptions and user queries with the
/// same instance, so both live in one vector space.
pub trait EmbeddingService: Send + Sync {
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, AutoFinderError>> + Send;

    /// Width of every vector returned by `embed`.
    fn dimensions(&self) -> usize;

    /// Identifier recorded alongside a persisted index.
    fn model_name(&self) -> &str;
}

/// Boxed-future twin of [`EmbeddingService`], usable as `Arc<dyn _>`.
///
/// Every `EmbeddingService` gets it through the blanket impl below.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, AutoFinderError>> + Send + 'a>,
    >;

    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, AutoFinderError>> + Send + 'a>,
    > {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }

    fn model_name(&self) -> &str {
        EmbeddingService::model_name(self)
    }
}

fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in values.iter_mut() {
            *val /= norm;
        }
    }
}

fn embedding_error(context: &str, detail: impl std::fmt::Display) -> AutoFinderError {
    AutoFinderError::Embedding(format!("{context}: {detail}"))
}

/// Average the token vectors whose attention mask is set.
///
/// `tokens` is the flattened `[seq_len, hidden_dim]` output of the model.
fn mean_pool(tokens: &[f32], mask: &[i64], hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut kept = 0usize;

    for (row, _) in tokens.chunks_exact(hidden_dim).zip(mask).filter(|(_, m)| **m > 0) {
        for (acc, v) in pooled.iter_mut().zip(row) {
            *acc += v;
        }
        kept += 1;
    }

    if kept > 0 {
        let n = kept as f32;
        pooled.iter_mut().for_each(|v| *v /= n);
    }
    pooled
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService - ONNX Runtime inference
// ---------------------------------------------------------------------------

/// Sentence-transformer embedder (e.g. all-MiniLM-L6-v2) on ONNX Runtime.
///
/// Token vectors are mean-pooled over the attention mask and L2-normalized.
pub struct OnnxEmbeddingService {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
    model_name: String,
}

// The session is only reached through the mutex.
unsafe impl Send for OnnxEmbeddingService {}
unsafe impl Sync for OnnxEmbeddingService {}

impl std::fmt::Debug for OnnxEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingService")
            .field("model_name", &self.model_name)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OnnxEmbeddingService {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn from_directory(model_dir: &Path, model_name: &str) -> Result<Self, AutoFinderError> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
            model_name,
        )
    }

    pub fn from_files(
        model_path: &Path,
        tokenizer_path: &Path,
        model_name: &str,
    ) -> Result<Self, AutoFinderError> {
        for (what, path) in [("ONNX model", model_path), ("Tokenizer", tokenizer_path)] {
            if !path.is_file() {
                return Err(AutoFinderError::Embedding(format!(
                    "{what} not found at {}",
                    path.display()
                )));
            }
        }

        let session = Session::builder()
            .map_err(|e| embedding_error("session builder", e))?
            .with_intra_threads(1)
            .map_err(|e| embedding_error("intra threads", e))?
            .commit_from_file(model_path)
            .map_err(|e| embedding_error("load model", e))?;

        // Last axis of the first output: [batch, tokens, hidden].
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .filter(|d| *d > 0)
            .map_or(DEFAULT_ONNX_DIMENSIONS, |d| d as usize);

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| embedding_error("load tokenizer", e))?;

        info!(
            model = model_name,
            path = %model_path.display(),
            dimensions,
            "ONNX embedder ready"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions,
            model_name: model_name.to_string(),
        })
    }

    fn infer(
        session: &Mutex<Session>,
        tokenizer: &Tokenizer,
        text: &str,
    ) -> Result<Vec<f32>, AutoFinderError> {
        if text.trim().is_empty() {
            return Err(AutoFinderError::Embedding("empty text".to_string()));
        }

        let encoding = tokenizer
            .encode(text, true)
            .map_err(|e| embedding_error("tokenize", e))?;

        let widen = |xs: &[u32]| xs.iter().map(|&x| i64::from(x)).collect::<Vec<i64>>();
        let mask = widen(encoding.get_attention_mask());
        let seq_len = mask.len();
        let row = |name: &'static str, values: Vec<i64>| {
            ndarray::Array2::from_shape_vec((1, seq_len), values)
                .map_err(|e| embedding_error(name, e))
        };
        let ids = row("input_ids", widen(encoding.get_ids()))?;
        let attention = row("attention_mask", mask.clone())?;
        let types = row("token_type_ids", widen(encoding.get_type_ids()))?;

        let ids_ref =
            TensorRef::from_array_view(&ids).map_err(|e| embedding_error("input_ids", e))?;
        let attention_ref = TensorRef::from_array_view(&attention)
            .map_err(|e| embedding_error("attention_mask", e))?;
        let types_ref =
            TensorRef::from_array_view(&types).map_err(|e| embedding_error("token_type_ids", e))?;

        let mut session = session
            .lock()
            .map_err(|e| embedding_error("session lock", e))?;
        let outputs = session
            .run(ort::inputs![ids_ref, attention_ref, types_ref])
            .map_err(|e| embedding_error("inference", e))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| embedding_error("extract output", e))?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        let hidden_dim = match dims.last() {
            Some(&d) if d > 0 => d as usize,
            _ => {
                return Err(AutoFinderError::Embedding(format!(
                    "unexpected output shape {dims:?}"
                )))
            }
        };

        let mut pooled = mean_pool(data, &mask, hidden_dim);
        l2_normalize(&mut pooled);
        Ok(pooled)
    }
}

impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AutoFinderError> {
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || Self::infer(&session, &tokenizer, &text))
            .await
            .map_err(|e| embedding_error("blocking task", e))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// ---------------------------------------------------------------------------
// HashEmbedding - model-free feature hashing
// ---------------------------------------------------------------------------

/// Default dimensionality of [`HashEmbedding`], matching all-MiniLM-L6-v2.
pub const HASH_EMBEDDING_DIMENSIONS: usize = 384;

const TRIGRAM_WEIGHT: f32 = 0.5;

/// Feature-hashing embedder.
///
/// Each lowercased word and each character trigram of a word is hashed
/// (FNV-1a, stable across processes and toolchains) into a signed bucket.
/// The result is L2-normalized.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimensions: usize,
}

impl HashEmbedding {
    pub fn new() -> Self {
        Self::with_dimensions(HASH_EMBEDDING_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn fnv1a(bytes: &[u8]) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = Self::fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.add_feature(&mut vector, word, 1.0);

            let chars: Vec<char> = word.chars().collect();
            if chars.len() > 3 {
                for window in chars.windows(3) {
                    let trigram: String = window.iter().collect();
                    self.add_feature(&mut vector, &format!("#{trigram}"), TRIGRAM_WEIGHT);
                }
            }
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingService for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AutoFinderError> {
        if text.trim().is_empty() {
            return Err(AutoFinderError::Embedding(
                "Cannot embed empty text".to_string(),
            ));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "feature-hash-v1"
    }
}
