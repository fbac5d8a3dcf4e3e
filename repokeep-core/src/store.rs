//! Working-root store: paths plus database persistence.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   database.json          (mode 0600, full rewrite on every save)
//!   repos/<owner>/<name>.git
//!   logs/update-<stamp>.log
//!   .repokeep-run/         (only while a batch update runs)
//!     jobs/<shard>.json
//!     results/<shard>.json
//!     worker-logs/<shard>.log
//! ```
//!
//! A [`Store`] is created once per process and handed to every component that
//! needs the database; nothing reads it from ambient state.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{io_err, StoreError};
use crate::types::Database;

pub const DATABASE_FILE: &str = "database.json";
pub const REPOS_DIR: &str = "repos";
pub const LOGS_DIR: &str = "logs";
pub const SCRATCH_DIR: &str = ".repokeep-run";

/// Context value for one working root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn repos_root(&self) -> PathBuf {
        self.root.join(REPOS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Transient per-run directory; its presence means a batch run is in progress.
    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join(SCRATCH_DIR)
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.scratch_dir().join("jobs")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.scratch_dir().join("results")
    }

    pub fn worker_logs_dir(&self) -> PathBuf {
        self.scratch_dir().join("worker-logs")
    }

    pub fn job_path(&self, shard: usize) -> PathBuf {
        self.jobs_dir().join(format!("{shard}.json"))
    }

    pub fn result_path(&self, shard: usize) -> PathBuf {
        self.results_dir().join(format!("{shard}.json"))
    }

    pub fn worker_log_path(&self, shard: usize) -> PathBuf {
        self.worker_logs_dir().join(format!("{shard}.log"))
    }

    /// Absolute directory of the repo stored under the relative `key`.
    pub fn repo_dir(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.repos_root(), |dir, segment| dir.join(segment))
    }

    pub fn run_in_progress(&self) -> bool {
        self.scratch_dir().exists()
    }

    /// Load the database. A missing file yields the default document.
    pub fn load(&self) -> Result<Database, StoreError> {
        let path = self.database_path();
        if !path.exists() {
            return Ok(Database::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Parse { path, source })
    }

    /// Atomically rewrite the whole database document.
    pub fn save(&self, db: &Database) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;
        let path = self.database_path();
        write_json_atomic(&path, db)?;
        set_file_permissions(&path)
    }
}

/// Serialize `value` to `<path>.tmp` and rename it over `path`.
///
/// The `.tmp` sibling lives in the same directory, so the rename never crosses
/// filesystems and readers only ever see a complete document.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = tmp_path(path);
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn repo_dir_joins_segments() {
        let store = Store::at("/srv/keep");
        assert_eq!(
            store.repo_dir("owner/name.git"),
            PathBuf::from("/srv/keep/repos/owner/name.git")
        );
    }

    #[test]
    fn shard_paths_are_named_by_index() {
        let store = Store::at("/srv/keep");
        assert!(store.job_path(3).ends_with(".repokeep-run/jobs/3.json"));
        assert!(store.result_path(3).ends_with(".repokeep-run/results/3.json"));
    }

    #[test]
    fn load_missing_database_is_default() {
        let root = TempDir::new().expect("tempdir");
        let db = Store::at(root.path()).load().expect("load");
        assert_eq!(db, Database::default());
    }

    #[test]
    fn save_leaves_no_tmp_behind() {
        let root = TempDir::new().expect("tempdir");
        let store = Store::at(root.path());
        store.save(&Database::default()).expect("save");
        assert!(store.database_path().exists());
        assert!(!root.path().join("database.json.tmp").exists());
    }

    #[test]
    fn run_in_progress_tracks_scratch_dir() {
        let root = TempDir::new().expect("tempdir");
        let store = Store::at(root.path());
        assert!(!store.run_in_progress());
        std::fs::create_dir_all(store.scratch_dir()).expect("mkdir");
        assert!(store.run_in_progress());
    }
}
