//! Error types for the similarity pipeline
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use crate::embedding::EmbeddingError;
use crate::index::IndexError;
use crate::sink::SinkError;
use crate::source::SourceError;
use thiserror::Error;

/// Main error type for similarity pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The document store could not be reached. Never retried by the
    /// core and never converted into an empty result set.
    #[error("Document source unavailable for partition '{partition}': {source}")]
    SourceUnavailable {
        partition: String,
        #[source]
        source: SourceError,
    },

    /// The partition exists but holds no documents. A user-visible
    /// "nothing to do" condition, not a crash.
    #[error("Partition '{partition}' has no documents to embed")]
    EmptyPartition { partition: String },

    /// Embedding errors (encoder unavailable, inference failure)
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Vector index errors (dimension mismatch, empty index)
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Result persistence errors
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The enclosing request was aborted between embedding batches
    #[error("Similarity run cancelled before completion")]
    Cancelled,

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl PipelineError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            Self::EmptyPartition { .. } => "EMPTY_PARTITION",
            Self::Embedding(EmbeddingError::ModelInit { .. }) => "ENCODER_UNAVAILABLE",
            Self::Embedding(EmbeddingError::EmptyBatch) => "EMPTY_INPUT",
            Self::Embedding(EmbeddingError::DimensionMismatch { .. }) => "DIMENSION_MISMATCH",
            Self::Embedding(_) => "EMBEDDING_ERROR",
            Self::Index(IndexError::DimensionMismatch { .. }) => "DIMENSION_MISMATCH",
            Self::Index(IndexError::EmptyIndex) => "EMPTY_INDEX",
            Self::Index(_) => "INDEX_ERROR",
            Self::Sink(_) => "WRITE_FAILURE",
            Self::Cancelled => "CANCELLED",
            Self::Config { .. } => "CONFIG_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::SourceUnavailable { .. } => vec![
                "Check that the document store is reachable and the partition name is correct",
                "Verify the configured source.text_root points at the OCR output directory",
            ],
            Self::EmptyPartition { .. } => vec![
                "Upload and process at least one document before requesting similarities",
            ],
            Self::Embedding(EmbeddingError::ModelInit { .. }) => vec![
                "Ensure you have an internet connection for the first-time model download",
                "If the model is cached, check available memory and the cache directory permissions",
            ],
            Self::Index(IndexError::DimensionMismatch { .. }) => vec![
                "All vectors in one run must come from the same embedding model",
                "This indicates an embedder bug; re-run with DOCSIM_DEBUG=true and report it",
            ],
            Self::Sink(_) => vec![
                "Check disk space and permissions for the output directory",
                "The in-memory results are intact; retrying the write alone is safe",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
