use std::path::PathBuf;

use thiserror::Error;

/// Error surface for a batch update run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// One or more start-up checks failed; nothing was touched.
    #[error("cannot start update:\n  - {}", .reasons.join("\n  - "))]
    Preconditions { reasons: Vec<String> },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("store error: {0}")]
    Store(#[from] repokeep_core::StoreError),

    #[error("shard error: {0}")]
    Fetch(#[from] repokeep_fetch::FetchError),

    #[error("report error: {0}")]
    Report(#[from] repokeep_report::ReportError),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> OrchestratorError {
    OrchestratorError::Io {
        path: path.into(),
        source,
    }
}
