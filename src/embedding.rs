//! Embedding generation for document similarity.
//!
//! This module provides the trait and implementations for turning
//! document texts into dense vectors. It uses fastembed for efficient
//! embedding generation with the all-MiniLM-L6-v2 sentence encoder,
//! which mean-pools contextual token representations into one
//! 384-dimensional vector per document.

use crate::config;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The pretrained encoder could not be loaded. The reason string
    /// distinguishes a missing/undownloadable model from resource
    /// exhaustion during load.
    #[error("Failed to initialize embedding model: {reason}")]
    ModelInit { reason: String },

    /// The input mapping was empty; there is nothing to embed and
    /// nothing meaningful to index.
    #[error("No texts to embed")]
    EmptyBatch,

    #[error("Failed to generate embeddings: {0}")]
    Backend(String),

    /// The encoder returned a vector of unexpected length. Indicates an
    /// embedder bug; the run is aborted rather than dropping vectors.
    #[error("Encoder returned a vector of length {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unknown embedding model '{name}'. Supported: {supported}")]
    UnknownModel { name: String, supported: &'static str },
}

/// Trait for generating embeddings from document texts.
///
/// Implementations must be thread-safe and should amortize model load
/// across calls rather than reloading per document. Each text is encoded
/// independently, so batches may be processed in any order.
pub trait TextEmbedder: Send + Sync {
    /// Generate one vector per input text.
    ///
    /// Guarantees on success: `result.len() == texts.len()` and every
    /// vector has length [`TextEmbedder::dimension`]. Texts longer than
    /// the encoder's token window are truncated silently; truncation is
    /// not an error.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Dimensionality of the vectors this embedder produces.
    #[must_use]
    fn dimension(&self) -> usize;

    /// Model name/identifier, for logging and result metadata.
    fn model_name(&self) -> &str;
}

/// Names of the embedding models this crate knows how to construct.
const SUPPORTED_MODELS: &str = "AllMiniLML6V2, AllMiniLML12V2, BGESmallENV15";

/// Parse a configured model name into a fastembed model id.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, EmbeddingError> {
    match name {
        "AllMiniLML6V2" | "all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" | "all-MiniLM-L12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" | "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        _ => Err(EmbeddingError::UnknownModel {
            name: name.to_string(),
            supported: SUPPORTED_MODELS,
        }),
    }
}

/// FastEmbed implementation backed by a pretrained sentence encoder.
///
/// The default model is all-MiniLM-L6-v2 (384 dimensions, 512-token
/// window). Input past the token window is truncated by the encoder;
/// the mean pooling over the remaining tokens still yields a full
/// vector, so very long OCR texts embed without error.
pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
    dimension: usize,
    model_name: String,
}

impl FastEmbedEmbedder {
    /// Create an embedder with the default all-MiniLM-L6-v2 model.
    ///
    /// # Errors
    /// Returns [`EmbeddingError::ModelInit`] if the model fails to
    /// initialize or download.
    pub fn new() -> Result<Self, EmbeddingError> {
        Self::with_model(EmbeddingModel::AllMiniLML6V2, config::models_dir())
    }

    /// Create an embedder from settings (model name + cache directory).
    pub fn from_settings(settings: &config::Settings) -> Result<Self, EmbeddingError> {
        let model = parse_embedding_model(&settings.embedding.model)?;
        let cache_dir = settings
            .embedding
            .cache_dir
            .clone()
            .unwrap_or_else(config::models_dir);
        Self::with_model(model, cache_dir)
    }

    /// Create an embedder with a specific model and cache directory.
    ///
    /// The model is loaded once here and reused for every batch.
    pub fn with_model(model: EmbeddingModel, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let model_name = format!("{model:?}");

        // Report whether this will hit the network before fastembed
        // starts a potentially slow download.
        let has_cached_models = cache_dir.exists()
            && cache_dir
                .read_dir()
                .is_ok_and(|mut entries| entries.any(|_| true));
        if has_cached_models {
            eprintln!("Loading embedding model from cache...");
        } else {
            eprintln!("Downloading embedding model (first time only)...");
        }

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(true),
        )
        .map_err(|e| EmbeddingError::ModelInit {
            reason: format!(
                "{e}. Ensure you have an internet connection for the first-time model download; if the model is cached this usually means the process ran out of memory"
            ),
        })?;

        // Probe dimensionality with a throwaway embedding
        let probe = text_model
            .embed(vec!["test"], None)
            .map_err(|e| EmbeddingError::ModelInit {
                reason: format!("model loaded but failed a probe embedding: {e}"),
            })?;
        let dimension = probe
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::ModelInit {
                reason: "model produced no probe embedding".to_string(),
            })?
            .len();

        debug!(model = %model_name, dimension, "embedding model ready");

        Ok(Self {
            model: Mutex::new(text_model),
            dimension,
            model_name,
        })
    }
}

impl TextEmbedder for FastEmbedEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyBatch);
        }

        // fastembed expects Vec<String> for the embed method
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                EmbeddingError::Backend(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, None)
            .map_err(|e| EmbeddingError::Backend(e.to_string()))?;

        // Validate dimensions
        for embedding in embeddings.iter() {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Deterministic embedder for unit tests.
///
/// Hashes whitespace tokens into a small fixed number of buckets and
/// counts occurrences, so identical texts embed to identical vectors and
/// unrelated texts land far apart. No model download, no I/O.
#[cfg(test)]
pub struct MockTextEmbedder {
    dimension: usize,
}

#[cfg(test)]
impl Default for MockTextEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MockTextEmbedder {
    pub fn new() -> Self {
        Self { dimension: 16 }
    }
}

#[cfg(test)]
impl TextEmbedder for MockTextEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        use std::hash::{DefaultHasher, Hash, Hasher};

        if texts.is_empty() {
            return Err(EmbeddingError::EmptyBatch);
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let mut vector = vec![0.0f32; self.dimension];
            for token in text.split_whitespace() {
                let mut hasher = DefaultHasher::new();
                token.hash(&mut hasher);
                let bucket = (hasher.finish() as usize) % self.dimension;
                vector[bucket] += 1.0;
            }
            embeddings.push(vector);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-token-hash"
    }
}
