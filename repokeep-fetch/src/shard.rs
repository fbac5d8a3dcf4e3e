//! Shard partitioning and the job/result documents exchanged with workers.
//!
//! Job documents are written once by the orchestrator. Result documents are
//! owned by one worker and rewritten atomically after every repo, so the
//! orchestrator may re-read them at any time.

use std::io::ErrorKind;
use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use repokeep_core::{write_json_atomic, Store};

use crate::error::{io_err, FetchError};
use crate::fetch::FetchOutcome;

/// `{ "repoList": [...] }`: the repo keys one worker must process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardJob {
    pub repo_list: Vec<String>,
}

/// A repo whose fetch changed refs, to be recorded in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedRepo {
    pub path: String,
    pub updated_on: String,
}

/// Cumulative progress of one shard.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardResult {
    pub total_repos: usize,
    pub current_repo: usize,
    pub update_data: Vec<String>,
    pub error_data: Vec<String>,
    #[serde(default)]
    pub updated_repos: Vec<UpdatedRepo>,
    #[serde(default)]
    pub failed_repos: Vec<String>,
}

impl ShardResult {
    pub fn new(total_repos: usize) -> Self {
        Self {
            total_repos,
            ..Self::default()
        }
    }

    /// Fold one repo's outcome in and advance `current_repo`.
    pub fn record(&mut self, path: &str, outcome: FetchOutcome, updated_on: &str) {
        self.current_repo += 1;
        match outcome {
            FetchOutcome::UpToDate => {}
            FetchOutcome::Updated { output } => {
                self.update_data.push(output);
                self.updated_repos.push(UpdatedRepo {
                    path: path.to_string(),
                    updated_on: updated_on.to_string(),
                });
            }
            FetchOutcome::Failed { output } => {
                self.error_data.push(output);
                self.failed_repos.push(path.to_string());
            }
        }
    }

    /// Completion percentage, `0.0..=100.0`. An empty shard counts as done.
    pub fn percent(&self) -> f64 {
        if self.total_repos == 0 {
            return 100.0;
        }
        self.current_repo as f64 * 100.0 / self.total_repos as f64
    }

    pub fn is_finished(&self) -> bool {
        self.current_repo >= self.total_repos
    }
}

/// Split `keys` into order-preserving chunks of `size`; the last may be shorter.
pub fn partition(keys: &[String], size: usize) -> Result<Vec<Vec<String>>, FetchError> {
    if size == 0 {
        return Err(FetchError::InvalidShardSize);
    }
    Ok(keys.chunks(size).map(<[String]>::to_vec).collect())
}

// ---------------------------------------------------------------------------
// Document IO
// ---------------------------------------------------------------------------

pub fn write_job(store: &Store, shard: usize, job: &ShardJob) -> Result<(), FetchError> {
    Ok(write_json_atomic(&store.job_path(shard), job)?)
}

/// Read the job for `shard`; `None` if it was never written.
pub fn read_job(store: &Store, shard: usize) -> Result<Option<ShardJob>, FetchError> {
    read_document(&store.job_path(shard))
}

pub fn write_result(store: &Store, shard: usize, result: &ShardResult) -> Result<(), FetchError> {
    Ok(write_json_atomic(&store.result_path(shard), result)?)
}

/// Read the result for `shard`; `None` if the worker has not produced one yet.
pub fn read_result(store: &Store, shard: usize) -> Result<Option<ShardResult>, FetchError> {
    read_document(&store.result_path(shard))
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, FetchError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| FetchError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// All shard results of a run, concatenated in shard order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Aggregate {
    pub processed: usize,
    pub update_data: Vec<String>,
    pub error_data: Vec<String>,
    pub updated_repos: Vec<UpdatedRepo>,
    pub failed_repos: Vec<String>,
}

pub fn aggregate<'a>(results: impl IntoIterator<Item = &'a ShardResult>) -> Aggregate {
    let mut total = Aggregate::default();
    for result in results {
        total.processed += result.current_repo;
        total.update_data.extend(result.update_data.iter().cloned());
        total.error_data.extend(result.error_data.iter().cloned());
        total.updated_repos.extend(result.updated_repos.iter().cloned());
        total.failed_repos.extend(result.failed_repos.iter().cloned());
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("owner/repo{i:03}.git")).collect()
    }

    #[rstest]
    #[case(120, 50, vec![50, 50, 20])]
    #[case(100, 50, vec![50, 50])]
    #[case(3, 1, vec![1, 1, 1])]
    #[case(7, 10, vec![7])]
    #[case(0, 5, vec![])]
    fn partition_sizes(#[case] n: usize, #[case] size: usize, #[case] expected: Vec<usize>) {
        let shards = partition(&keys(n), size).expect("partition");
        let sizes: Vec<usize> = shards.iter().map(Vec::len).collect();
        assert_eq!(sizes, expected);
        assert_eq!(shards.len(), n.div_ceil(size));
    }

    #[test]
    fn partition_covers_list_once_in_order() {
        let list = keys(37);
        let shards = partition(&list, 8).expect("partition");
        let flattened: Vec<String> = shards.into_iter().flatten().collect();
        assert_eq!(flattened, list);
    }

    #[test]
    fn partition_rejects_zero_size() {
        assert!(matches!(
            partition(&keys(3), 0),
            Err(FetchError::InvalidShardSize)
        ));
    }

    #[test]
    fn record_tracks_each_outcome() {
        let mut result = ShardResult::new(3);
        result.record("a.git", FetchOutcome::UpToDate, "t");
        result.record(
            "b.git",
            FetchOutcome::Updated {
                output: "From x".into(),
            },
            "t1",
        );
        result.record(
            "c.git",
            FetchOutcome::Failed {
                output: "fatal: nope".into(),
            },
            "t2",
        );
        assert_eq!(result.current_repo, 3);
        assert!(result.is_finished());
        assert_eq!(result.update_data, ["From x"]);
        assert_eq!(result.error_data, ["fatal: nope"]);
        assert_eq!(
            result.updated_repos,
            [UpdatedRepo {
                path: "b.git".into(),
                updated_on: "t1".into()
            }]
        );
        assert_eq!(result.failed_repos, ["c.git"]);
    }

    #[test]
    fn aggregate_totals_match_sum_of_shards() {
        let mut first = ShardResult::new(2);
        first.record("a", FetchOutcome::Updated { output: "u1".into() }, "t");
        first.record("b", FetchOutcome::Failed { output: "fatal: e1".into() }, "t");
        let mut second = ShardResult::new(3);
        second.record("c", FetchOutcome::Updated { output: "u2".into() }, "t");
        second.record("d", FetchOutcome::Updated { output: "u3".into() }, "t");
        second.record("e", FetchOutcome::UpToDate, "t");

        let total = aggregate([&first, &second]);
        assert_eq!(total.processed, 5);
        assert_eq!(
            total.update_data.len(),
            first.update_data.len() + second.update_data.len()
        );
        assert_eq!(
            total.error_data.len(),
            first.error_data.len() + second.error_data.len()
        );
        assert_eq!(total.update_data, ["u1", "u2", "u3"]);
    }

    #[test]
    fn result_documents_use_camel_case_and_read_back() {
        let dir = TempDir::new().expect("tempdir");
        let store = Store::at(dir.path());
        assert!(read_result(&store, 0).expect("read").is_none());

        let mut result = ShardResult::new(1);
        result.record("a", FetchOutcome::Updated { output: "u".into() }, "t");
        write_result(&store, 0, &result).expect("write");

        let raw = std::fs::read_to_string(store.result_path(0)).expect("raw");
        for field in ["totalRepos", "currentRepo", "updateData", "errorData"] {
            assert!(raw.contains(field), "missing {field} in {raw}");
        }
        assert_eq!(read_result(&store, 0).expect("read"), Some(result));
    }

    #[test]
    fn job_documents_read_back() {
        let dir = TempDir::new().expect("tempdir");
        let store = Store::at(dir.path());
        let job = ShardJob {
            repo_list: keys(2),
        };
        write_job(&store, 4, &job).expect("write");
        assert_eq!(read_job(&store, 4).expect("read"), Some(job));
        assert!(read_job(&store, 5).expect("read").is_none());
    }
}
