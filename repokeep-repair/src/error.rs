//! Error types for repokeep-repair.

use std::path::PathBuf;

use thiserror::Error;

use repokeep_core::StoreError;

#[derive(Debug, Error)]
pub enum RepairError {
    /// A batch update owns the working root.
    #[error("a batch update is in progress ({scratch} exists); wait for it to finish")]
    RunInProgress { scratch: PathBuf },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{key}' is already tracked")]
    AlreadyTracked { key: String },

    #[error("cannot derive owner/name from '{url}'")]
    InvalidUrl { url: String },

    #[error("git clone --mirror {url} failed:\n{output}")]
    Clone { url: String, output: String },

    #[error("{config} has no [remote \"origin\"] url")]
    MissingOrigin { config: PathBuf },

    #[error("cannot read {config}: {source}")]
    Ini {
        config: PathBuf,
        #[source]
        source: ini::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RepairError {
    RepairError::Io {
        path: path.into(),
        source,
    }
}
