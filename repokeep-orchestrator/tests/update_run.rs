//! Full orchestrator runs with `sh` standing in for the worker binary.
#![cfg(unix)]

use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;
use tokio::process::Command;

use repokeep_core::{Database, RepoEntry, Store};
use repokeep_fetch::{read_job, FetchOutcome, ShardResult};
use repokeep_orchestrator::{
    run_update, OrchestratorError, Phase, ProgressSink, ShardProgress, UpdateOptions,
    WorkerLauncher,
};

/// Marks every repo of the job as updated, written the way a worker would.
struct AllUpdated;

impl WorkerLauncher for AllUpdated {
    fn command(&self, store: &Store, shard: usize) -> Command {
        let job = read_job(store, shard).unwrap().expect("job written before launch");
        let mut result = ShardResult::new(job.repo_list.len());
        for key in &job.repo_list {
            result.record(
                key,
                FetchOutcome::Updated {
                    output: format!("From origin {key}\n"),
                },
                "2026-02-03T04:05:06Z",
            );
        }
        let body = serde_json::to_string(&result).unwrap();
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(r#"printf '%s' "$1" > "$2.tmp" && mv "$2.tmp" "$2""#)
            .arg("sh")
            .arg(body)
            .arg(store.result_path(shard));
        cmd
    }
}

/// Publishes progress for the first repo of the job, then fails.
struct StopsAfterFirst;

impl WorkerLauncher for StopsAfterFirst {
    fn command(&self, store: &Store, shard: usize) -> Command {
        let job = read_job(store, shard).unwrap().expect("job written before launch");
        let mut result = ShardResult::new(job.repo_list.len());
        result.record(
            &job.repo_list[0],
            FetchOutcome::Updated {
                output: "From origin first\n".to_string(),
            },
            "2026-02-03T04:05:06Z",
        );
        let body = serde_json::to_string(&result).unwrap();
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(r#"printf '%s' "$1" > "$2.tmp" && mv "$2.tmp" "$2"; echo 'lost connection' >&2; exit 1"#)
            .arg("sh")
            .arg(body)
            .arg(store.result_path(shard));
        cmd
    }
}

/// Dies without writing anything.
struct Crashing;

impl WorkerLauncher for Crashing {
    fn command(&self, _store: &Store, _shard: usize) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo 'worker exploded' >&2; exit 3");
        cmd
    }
}

#[derive(Default)]
struct Recording {
    phases: Mutex<Vec<Phase>>,
    sizes: Mutex<Vec<usize>>,
    shards: Mutex<Vec<ShardProgress>>,
}

impl ProgressSink for Recording {
    fn phase(&self, phase: Phase) {
        self.phases.lock().unwrap().push(phase);
    }

    fn shards(&self, sizes: &[usize]) {
        *self.sizes.lock().unwrap() = sizes.to_vec();
    }

    fn shard(&self, progress: &ShardProgress) {
        self.shards.lock().unwrap().push(progress.clone());
    }
}

fn seeded_store(dir: &TempDir, repos: usize, shard_size: usize) -> Store {
    let store = Store::at(dir.path());
    let mut db = Database {
        max_repos_per_list: shard_size,
        connection_test_host: "localhost".to_string(),
        ..Database::default()
    };
    for i in 0..repos {
        let url = format!("https://example.com/o/r{i}.git");
        db.insert_entry(format!("o/r{i}.git"), &RepoEntry::imported(&url, Utc::now()));
    }
    store.save(&db).unwrap();
    store
}

#[tokio::test]
async fn run_merges_every_shard_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, 5, 2);
    let mut db = store.load().unwrap();
    db.repos.get_mut("o/r4.git").unwrap()["canUpdate"] = json!(false);
    store.save(&db).unwrap();

    let sink = Recording::default();
    let summary = run_update(&store, UpdateOptions::default(), &AllUpdated, &sink)
        .await
        .unwrap();

    assert_eq!(summary.processes, 2);
    assert_eq!(summary.total_repos, 4);
    assert_eq!(summary.updated, 4);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.run_counter, 1);
    assert_eq!(*sink.sizes.lock().unwrap(), [2, 2]);

    let db = store.load().unwrap();
    for i in 0..4 {
        let entry = db.entry(&format!("o/r{i}.git")).unwrap().unwrap();
        assert_eq!(entry.update_counter, 1);
        assert_eq!(entry.last_updated_on, "2026-02-03T04:05:06Z");
    }
    let disabled = db.entry("o/r4.git").unwrap().unwrap();
    assert_eq!(disabled.update_counter, 0);
    assert_eq!(disabled.last_updated_on, "Never");
    assert_eq!(db.run_counter, 1);
    assert_ne!(db.last_run, "Never");

    assert!(!store.run_in_progress());
    let log = std::fs::read_to_string(&summary.log_path).unwrap();
    assert!(summary.log_path.starts_with(store.logs_dir()));
    assert!(log.contains("From origin o/r3.git"));

    let phases = sink.phases.lock().unwrap();
    assert_eq!(phases[..4], [Phase::Checking, Phase::Sharding, Phase::Spawning, Phase::AwaitingResults]);
    assert_eq!(phases[phases.len() - 2..], [Phase::Finalizing, Phase::Idle]);
    let finished: Vec<usize> = sink
        .shards
        .lock()
        .unwrap()
        .iter()
        .filter(|p| p.percent >= 100.0)
        .map(|p| p.shard)
        .collect();
    assert!(finished.contains(&0) && finished.contains(&1), "{finished:?}");
}

#[tokio::test]
async fn bounded_pool_still_runs_every_shard() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, 6, 1);
    let mut db = store.load().unwrap();
    db.max_concurrent_workers = 2;
    store.save(&db).unwrap();

    let summary = run_update(
        &store,
        UpdateOptions::default(),
        &AllUpdated,
        &repokeep_orchestrator::NoProgress,
    )
    .await
    .unwrap();
    assert_eq!(summary.processes, 6);
    assert_eq!(summary.updated, 6);
}

#[tokio::test]
async fn worker_without_result_becomes_an_error_entry() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, 3, 3);

    let summary = run_update(
        &store,
        UpdateOptions::default(),
        &Crashing,
        &repokeep_orchestrator::NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.updated, 0);
    let log = std::fs::read_to_string(&summary.log_path).unwrap();
    assert!(log.contains("shard 0 produced no result"));
    assert!(log.contains("worker exploded"));
    assert_eq!(store.load().unwrap().run_counter, 1);
}

#[tokio::test]
async fn partial_result_keeps_progress_and_reports_the_stop() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, 3, 3);

    let summary = run_update(
        &store,
        UpdateOptions::default(),
        &StopsAfterFirst,
        &repokeep_orchestrator::NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(summary.processes, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.errors, 1);
    let log = std::fs::read_to_string(&summary.log_path).unwrap();
    assert!(log.contains("shard 0 stopped after 1 of 3 repositories"));
    assert!(log.contains("lost connection"));

    let db = store.load().unwrap();
    assert_eq!(db.entry("o/r0.git").unwrap().unwrap().update_counter, 1);
    assert_eq!(db.entry("o/r1.git").unwrap().unwrap().update_counter, 0);
    assert!(!store.run_in_progress());
}

#[tokio::test]
async fn priority_only_with_no_priority_repos_still_finalizes() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, 2, 10);

    let summary = run_update(
        &store,
        UpdateOptions {
            priority_only: true,
        },
        &Crashing,
        &repokeep_orchestrator::NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(summary.processes, 0);
    assert_eq!(summary.total_repos, 0);
    assert_eq!(store.load().unwrap().run_counter, 1);
    assert!(summary.log_path.exists());
    assert!(!store.run_in_progress());
}

#[tokio::test]
async fn failed_preconditions_touch_nothing() {
    let dir = TempDir::new().unwrap();
    let store = Store::at(dir.path());
    store
        .save(&Database {
            connection_test_host: "localhost".to_string(),
            ..Database::default()
        })
        .unwrap();
    let before = std::fs::read_to_string(store.database_path()).unwrap();

    let err = run_update(
        &store,
        UpdateOptions::default(),
        &Crashing,
        &repokeep_orchestrator::NoProgress,
    )
    .await
    .unwrap_err();

    match err {
        OrchestratorError::Preconditions { reasons } => {
            assert_eq!(reasons.len(), 1);
            assert!(reasons[0].contains("no repositories"));
        }
        other => panic!("expected precondition failure, got {other}"),
    }
    assert_eq!(std::fs::read_to_string(store.database_path()).unwrap(), before);
    assert!(!store.run_in_progress());
    assert!(!store.logs_dir().exists());
}
