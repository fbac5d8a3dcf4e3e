//! The update operation: fetch one mirror and classify what happened.
//!
//! Classification is a plain substring test over the combined git output,
//! evaluated in order:
//!
//! 1. blank output → [`FetchOutcome::UpToDate`]
//! 2. no error marker → [`FetchOutcome::Updated`]
//! 3. an error marker → [`FetchOutcome::Failed`]
//!
//! Error phrasing that matches no marker is reported as an update. The exit
//! code is not consulted.

use std::path::Path;

use repokeep_core::CommandRunner;

/// Substrings that mark fetch output as an error.
pub const ERROR_MARKERS: &[&str] = &["fatal:", "error:", "ERROR:", "DMCA"];

/// Arguments for a full-refs mirror fetch against `origin`.
pub const FETCH_ARGS: &[&str] = &["fetch", "--prune", "origin", "+refs/*:refs/*"];

/// Result of fetching one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Nothing was printed: the mirror already matched the remote.
    UpToDate,
    /// Refs changed; `output` is git's raw report.
    Updated { output: String },
    /// Output carried an error marker.
    Failed { output: String },
}

/// Classify combined fetch output.
pub fn classify(output: &str) -> FetchOutcome {
    if output.trim().is_empty() {
        return FetchOutcome::UpToDate;
    }
    if ERROR_MARKERS.iter().any(|marker| output.contains(marker)) {
        FetchOutcome::Failed {
            output: output.to_string(),
        }
    } else {
        FetchOutcome::Updated {
            output: output.to_string(),
        }
    }
}

/// Fetch the mirror at `repo_dir` and classify the result.
///
/// A fetch that cannot even start (missing directory, no git binary) is a
/// failure carrying the I/O error text.
pub fn fetch_repo(runner: &dyn CommandRunner, repo_dir: &Path) -> FetchOutcome {
    match runner.run("git", FETCH_ARGS, repo_dir) {
        Ok(out) => classify(&out.output),
        Err(err) => FetchOutcome::Failed {
            output: format!(
                "error: could not run git fetch in {}: {err}\n",
                repo_dir.display()
            ),
        },
    }
}
