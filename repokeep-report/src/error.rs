//! Error types for repokeep-report.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from report rendering and writing.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// JSON serialization error (building tera context).
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while loading override templates or writing a report.
    #[error("report io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
