//! Shard worker: fetch every repo of one job in order, publishing progress.
//!
//! A worker never writes the database. Successful fetches are listed in the
//! result document and merged by the orchestrator once all workers are done.

use chrono::Utc;

use repokeep_core::{timestamp, CommandRunner, Store};

use crate::error::FetchError;
use crate::fetch::{fetch_repo, FetchOutcome};
use crate::shard::{read_job, write_result, ShardResult};

/// How a worker run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// No job document for this shard; nothing was written.
    MissingJob,
    Completed(ShardResult),
}

/// Process shard `shard` of the current run.
pub fn run_worker(
    store: &Store,
    shard: usize,
    runner: &dyn CommandRunner,
) -> Result<WorkerOutcome, FetchError> {
    let Some(job) = read_job(store, shard)? else {
        tracing::error!(
            shard,
            path = %store.job_path(shard).display(),
            "job document missing; exiting without a result"
        );
        return Ok(WorkerOutcome::MissingJob);
    };

    let mut result = ShardResult::new(job.repo_list.len());
    write_result(store, shard, &result)?;
    tracing::info!(shard, repos = result.total_repos, "worker started");

    for key in &job.repo_list {
        let outcome = fetch_repo(runner, &store.repo_dir(key));
        match &outcome {
            FetchOutcome::UpToDate => tracing::debug!(shard, repo = %key, "up to date"),
            FetchOutcome::Updated { .. } => tracing::info!(shard, repo = %key, "updated"),
            FetchOutcome::Failed { output } => {
                tracing::warn!(shard, repo = %key, output = %output.trim(), "fetch failed")
            }
        }
        result.record(key, outcome, &timestamp(Utc::now()));
        write_result(store, shard, &result)?;
    }

    tracing::info!(
        shard,
        updated = result.update_data.len(),
        errors = result.error_data.len(),
        "worker finished"
    );
    Ok(WorkerOutcome::Completed(result))
}
