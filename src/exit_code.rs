//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - operation completed, results written
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - critical failure that should halt automation
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::embedding::EmbeddingError;
use crate::error::PipelineError;
use crate::index::IndexError;

/// Standard exit codes for CLI operations.
///
/// These codes follow Unix conventions where 0 indicates success,
/// and non-zero values indicate various error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Critical error that should halt automation (code 2)
    BlockingError = 2,

    /// Partition had no documents; command executed successfully (code 3)
    EmptyPartition = 3,

    /// Embedding model could not be loaded (code 4)
    EncoderUnavailable = 4,

    /// File or store I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Run cancelled before completion (code 7)
    Cancelled = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// Convert a `PipelineError` to the appropriate exit code.
    ///
    /// Maps specific error types to semantic exit codes that scripts
    /// can use to determine appropriate recovery actions.
    pub fn from_error(error: &PipelineError) -> Self {
        match error {
            // Nothing to do is recoverable: upload documents and retry
            PipelineError::EmptyPartition { .. } => ExitCode::EmptyPartition,

            // Encoder load failures have their own code so callers can
            // distinguish "download the model" from disk problems
            PipelineError::Embedding(EmbeddingError::ModelInit { .. })
            | PipelineError::Embedding(EmbeddingError::UnknownModel { .. }) => {
                ExitCode::EncoderUnavailable
            }

            // A dimension mismatch is an internal invariant violation
            PipelineError::Index(IndexError::DimensionMismatch { .. })
            | PipelineError::Embedding(EmbeddingError::DimensionMismatch { .. }) => {
                ExitCode::BlockingError
            }

            PipelineError::SourceUnavailable { .. } | PipelineError::Sink(_) => ExitCode::IoError,

            PipelineError::Config { .. } => ExitCode::ConfigError,

            PipelineError::Cancelled => ExitCode::Cancelled,

            // Everything else is a general error
            _ => ExitCode::GeneralError,
        }
    }

    /// Check if this exit code indicates a blocking error.
    ///
    /// Blocking errors should halt automation pipelines.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    /// Check if this exit code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - automation should halt",
            ExitCode::EmptyPartition => "Empty partition",
            ExitCode::EncoderUnavailable => "Encoder unavailable",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::Cancelled => "Cancelled",
        }
    }
}
