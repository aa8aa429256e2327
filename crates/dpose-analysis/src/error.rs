//! Error types for analysis runs.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors that abort an analysis run.
///
/// Per-frame problems (no body found, degenerate geometry, a failed
/// detector call) never surface here; they become empty labels.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Could not open video {}: {reason}", path.display())]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("Analysis cancelled")]
    Cancelled,
}

impl AnalysisError {
    /// Create a source unavailable error.
    pub fn source_unavailable(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::SourceUnavailable { .. } => "source_unavailable",
            AnalysisError::Cancelled => "cancelled",
        }
    }
}
