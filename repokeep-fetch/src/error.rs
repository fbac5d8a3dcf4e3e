//! Error types for repokeep-fetch.

use std::path::PathBuf;

use thiserror::Error;

use repokeep_core::StoreError;

/// All errors that can arise from fetch, shard, and worker operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// An error from the store (database or atomic document write).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A job or result document that exists but does not parse.
    #[error("failed to parse shard document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `maxReposPerList` of zero cannot partition anything.
    #[error("shard size must be at least 1")]
    InvalidShardSize,
}

/// Convenience constructor for [`FetchError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> FetchError {
    FetchError::Io {
        path: path.into(),
        source,
    }
}
