use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use chrono::Utc;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::MissedTickBehavior;

use repokeep_core::{timestamp, Database, Store};
use repokeep_fetch::{aggregate, partition, read_result, write_job, ShardJob, ShardResult};
use repokeep_report::{update_log_file_name, Renderer, UpdateReportContext};

use crate::error::{io_err, OrchestratorError};
use crate::launcher::WorkerLauncher;
use crate::progress::{Phase, ProgressSink, ShardProgress};

/// Fallback re-check of result documents when no watcher event arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A stamp whose mtime is this recent is not trusted: a same-length rewrite
/// inside the filesystem's mtime resolution leaves it unchanged.
const STAMP_GRANULARITY: Duration = Duration::from_secs(2);

/// Upper bound on the connectivity lookup.
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Lines of a worker's log quoted when it produced no result.
const LOG_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Only schedule entries flagged `isPriority`.
    pub priority_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub processes: usize,
    pub shard_size: usize,
    pub total_repos: usize,
    pub updated: usize,
    pub up_to_date: usize,
    /// Error entries in the report, including shards that produced no result.
    pub errors: usize,
    pub failed_repos: Vec<String>,
    pub run_counter: u64,
    pub duration_secs: f64,
    pub log_path: PathBuf,
}

/// Run a batch update on a current-thread runtime, blocking until it is done.
pub fn run_update_blocking(
    store: &Store,
    opts: UpdateOptions,
    launcher: &dyn WorkerLauncher,
    progress: &dyn ProgressSink,
) -> Result<RunSummary, OrchestratorError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run_update(store, opts, launcher, progress))
}

/// Run a batch update.
pub async fn run_update(
    store: &Store,
    opts: UpdateOptions,
    launcher: &dyn WorkerLauncher,
    progress: &dyn ProgressSink,
) -> Result<RunSummary, OrchestratorError> {
    let started_at = Utc::now();
    let started = Instant::now();

    enter(progress, Phase::Checking);
    let db = store.load()?;
    let reasons = check_preconditions(&db).await;
    if !reasons.is_empty() {
        enter(progress, Phase::Idle);
        return Err(OrchestratorError::Preconditions { reasons });
    }

    enter(progress, Phase::Sharding);
    let candidates = db.update_candidates(opts.priority_only);
    let shards = partition(&candidates, db.max_repos_per_list)?;
    let sizes: Vec<usize> = shards.iter().map(Vec::len).collect();
    tracing::info!(
        repos = candidates.len(),
        shards = shards.len(),
        shard_size = db.max_repos_per_list,
        priority_only = opts.priority_only,
        "partitioned update list"
    );
    progress.shards(&sizes);

    enter(progress, Phase::Spawning);
    prepare_scratch(store, &shards)?;
    let (exit_tx, exit_rx) = mpsc::unbounded_channel::<WorkerExit>();
    spawn_workers(store, launcher, shards.len(), db.max_concurrent_workers, exit_tx)?;

    let tracker = await_workers(store, &sizes, exit_rx, progress).await?;

    enter(progress, Phase::Finalizing);
    let summary = finalize(
        store,
        opts,
        &db,
        candidates.len(),
        tracker,
        started_at,
        started,
    )?;
    enter(progress, Phase::Idle);
    Ok(summary)
}

fn enter(progress: &dyn ProgressSink, phase: Phase) {
    tracing::debug!(?phase, "orchestrator phase");
    progress.phase(phase);
}

// ---------------------------------------------------------------------------
// Checking
// ---------------------------------------------------------------------------

async fn check_preconditions(db: &Database) -> Vec<String> {
    let mut reasons = Vec::new();

    let host = db.connection_test_host.as_str();
    match tokio::time::timeout(RESOLVE_TIMEOUT, tokio::net::lookup_host((host, 443))).await {
        Ok(Ok(mut addrs)) => {
            if addrs.next().is_none() {
                reasons.push(format!("{host} resolved to no addresses"));
            }
        }
        Ok(Err(err)) => reasons.push(format!("cannot resolve {host}: {err}")),
        Err(_) => reasons.push(format!("resolving {host} timed out")),
    }
    if db.repos.is_empty() {
        reasons.push("the database has no repositories; run `repokeep repair` or `repokeep add`".to_string());
    }
    if db.max_repos_per_list == 0 {
        reasons.push("maxReposPerList must be at least 1".to_string());
    }

    for reason in &reasons {
        tracing::error!(reason = %reason, "precondition failed");
    }
    reasons
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

fn prepare_scratch(store: &Store, shards: &[Vec<String>]) -> Result<(), OrchestratorError> {
    let scratch = store.scratch_dir();
    if scratch.exists() {
        tracing::warn!(path = %scratch.display(), "removing scratch directory of an interrupted run");
        fs::remove_dir_all(&scratch).map_err(|e| io_err(&scratch, e))?;
    }
    for dir in [store.jobs_dir(), store.results_dir(), store.worker_logs_dir()] {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    }
    for (shard, repos) in shards.iter().enumerate() {
        write_job(
            store,
            shard,
            &ShardJob {
                repo_list: repos.clone(),
            },
        )?;
    }
    Ok(())
}

#[derive(Debug)]
struct WorkerExit {
    shard: usize,
    status: Result<ExitStatus, String>,
}

impl WorkerExit {
    fn describe(&self) -> String {
        match &self.status {
            Ok(status) => status.to_string(),
            Err(err) => format!("not started: {err}"),
        }
    }
}

/// Start one task per shard; at most `max_concurrent` children run at once
/// (`0` = no bound). Every task reports on `exit_tx` exactly once.
fn spawn_workers(
    store: &Store,
    launcher: &dyn WorkerLauncher,
    count: usize,
    max_concurrent: usize,
    exit_tx: mpsc::UnboundedSender<WorkerExit>,
) -> Result<(), OrchestratorError> {
    let permits = if max_concurrent == 0 {
        count.max(1)
    } else {
        max_concurrent
    };
    let semaphore = Arc::new(Semaphore::new(permits));

    for shard in 0..count {
        let log_path = store.worker_log_path(shard);
        let log = fs::File::create(&log_path).map_err(|e| io_err(&log_path, e))?;
        let log_out = log.try_clone().map_err(|e| io_err(&log_path, e))?;

        let mut cmd = launcher.command(store, shard);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log_out))
            .stderr(Stdio::from(log));

        let semaphore = semaphore.clone();
        let exit_tx = exit_tx.clone();
        tokio::spawn(async move {
            let status = match semaphore.acquire_owned().await {
                Ok(_permit) => match cmd.spawn() {
                    Ok(mut child) => {
                        tracing::info!(shard, pid = ?child.id(), "worker started");
                        child.wait().await.map_err(|e| e.to_string())
                    }
                    Err(err) => Err(err.to_string()),
                },
                Err(err) => Err(err.to_string()),
            };
            let _ = exit_tx.send(WorkerExit { shard, status });
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// AwaitingResults / AwaitingExit
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ShardState {
    total: usize,
    /// `(mtime, len)` of the last document read.
    stamp: Option<(SystemTime, u64)>,
    result: Option<ShardResult>,
    exit: Option<WorkerExit>,
}

#[derive(Debug)]
struct Tracker {
    shards: Vec<ShardState>,
}

impl Tracker {
    fn new(sizes: &[usize]) -> Self {
        Self {
            shards: sizes
                .iter()
                .map(|&total| ShardState {
                    total,
                    ..ShardState::default()
                })
                .collect(),
        }
    }

    fn all_reported(&self) -> bool {
        self.shards
            .iter()
            .all(|s| s.result.is_some() || s.exit.is_some())
    }

    fn all_exited(&self) -> bool {
        self.shards.iter().all(|s| s.exit.is_some())
    }

    /// Re-read shard `shard`'s result document if it changed on disk.
    fn refresh(&mut self, store: &Store, shard: usize, progress: &dyn ProgressSink) {
        let Some(state) = self.shards.get_mut(shard) else {
            return;
        };
        let path = store.result_path(shard);
        let Some(stamp) = file_stamp(&path) else {
            return;
        };
        if state.stamp == Some(stamp) && !is_racy(stamp.0) {
            return;
        }
        match read_result(store, shard) {
            Ok(Some(result)) => {
                state.stamp = Some(stamp);
                if state.result.as_ref() == Some(&result) {
                    return;
                }
                progress.shard(&ShardProgress {
                    shard,
                    current: result.current_repo,
                    total: result.total_repos,
                    updated: result.update_data.len(),
                    errors: result.error_data.len(),
                    percent: result.percent(),
                });
                tracing::debug!(
                    shard,
                    current = result.current_repo,
                    total = result.total_repos,
                    "shard progress"
                );
                state.result = Some(result);
            }
            Ok(None) => {}
            Err(err) => tracing::debug!(shard, error = %err, "result document not readable yet"),
        }
    }

    fn refresh_pending(&mut self, store: &Store, progress: &dyn ProgressSink) {
        for shard in 0..self.shards.len() {
            let state = &self.shards[shard];
            let finished = state
                .result
                .as_ref()
                .is_some_and(ShardResult::is_finished);
            if state.exit.is_none() && !finished {
                self.refresh(store, shard, progress);
            }
        }
    }
}

fn is_racy(modified: SystemTime) -> bool {
    SystemTime::now()
        .duration_since(modified)
        .map_or(true, |age| age < STAMP_GRANULARITY)
}

fn file_stamp(path: &Path) -> Option<(SystemTime, u64)> {
    let meta = fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

/// `<n>.json` in the results directory → `n`.
fn shard_of(path: &Path) -> Option<usize> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    )
}

async fn await_workers(
    store: &Store,
    sizes: &[usize],
    mut exit_rx: mpsc::UnboundedReceiver<WorkerExit>,
    progress: &dyn ProgressSink,
) -> Result<Tracker, OrchestratorError> {
    let mut tracker = Tracker::new(sizes);
    if sizes.is_empty() {
        return Ok(tracker);
    }
    enter(progress, Phase::AwaitingResults);
    let mut phase = Phase::AwaitingResults;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&store.results_dir(), RecursiveMode::NonRecursive)?;

    let mut tick = tokio::time::interval(POLL_INTERVAL);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !tracker.all_exited() {
        tokio::select! {
            exit = exit_rx.recv() => {
                let Some(exit) = exit else {
                    return Err(OrchestratorError::ChannelClosed("worker completion"));
                };
                tracing::info!(shard = exit.shard, status = %exit.describe(), "worker exited");
                let shard = exit.shard;
                tracker.refresh(store, shard, progress);
                if let Some(state) = tracker.shards.get_mut(shard) {
                    state.exit = Some(exit);
                }
            }
            event = event_rx.recv() => {
                match event {
                    Some(Ok(event)) if is_relevant_event_kind(&event.kind) => {
                        for shard in event.paths.iter().filter_map(|p| shard_of(p)) {
                            tracker.refresh(store, shard, progress);
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => tracing::warn!(error = %err, "watcher event error"),
                    None => tracing::debug!("watcher channel closed"),
                }
            }
            _ = tick.tick() => tracker.refresh_pending(store, progress),
        }

        if phase == Phase::AwaitingResults && tracker.all_reported() {
            phase = Phase::AwaitingExit;
            enter(progress, phase);
        }
    }

    drop(watcher);
    Ok(tracker)
}

// ---------------------------------------------------------------------------
// Finalizing
// ---------------------------------------------------------------------------

fn finalize(
    store: &Store,
    opts: UpdateOptions,
    checked: &Database,
    planned: usize,
    tracker: Tracker,
    started_at: chrono::DateTime<Utc>,
    started: Instant,
) -> Result<RunSummary, OrchestratorError> {
    let processes = tracker.shards.len();
    let mut results = Vec::with_capacity(processes);
    let mut missing = Vec::new();
    for (shard, state) in tracker.shards.into_iter().enumerate() {
        let exit = state
            .exit
            .as_ref()
            .map(WorkerExit::describe)
            .unwrap_or_else(|| "unknown".to_string());
        match read_result(store, shard) {
            Ok(Some(result)) => {
                if !result.is_finished() {
                    missing.push(format!(
                        "error: shard {shard} stopped after {} of {} repositories ({exit})\n{}",
                        result.current_repo,
                        result.total_repos,
                        log_tail(&store.worker_log_path(shard))
                    ));
                }
                results.push(result);
            }
            Ok(None) => missing.push(format!(
                "error: shard {shard} produced no result ({exit})\n{}",
                log_tail(&store.worker_log_path(shard))
            )),
            Err(err) => missing.push(format!(
                "error: shard {shard} result unreadable: {err} ({exit})\n{}",
                log_tail(&store.worker_log_path(shard))
            )),
        }
    }
    let mut total = aggregate(&results);
    total.error_data.extend(missing);

    let mut db = store.load()?;
    for updated in &total.updated_repos {
        if !db.record_update(&updated.path, &updated.updated_on) {
            tracing::warn!(path = %updated.path, "updated repo is no longer tracked");
        }
    }
    let finished_at = Utc::now();
    let elapsed = started.elapsed();
    db.run_counter += 1;
    db.last_run = timestamp(finished_at);
    db.update_runtime += elapsed.as_secs_f64();
    store.save(&db)?;

    let updated = total.updated_repos.len();
    let up_to_date = total
        .processed
        .saturating_sub(updated + total.failed_repos.len());

    let ctx = UpdateReportContext {
        root: store.root().display().to_string(),
        processes,
        shard_size: checked.max_repos_per_list,
        priority_only: opts.priority_only,
        run_counter: db.run_counter,
        total_repos: planned,
        updated,
        up_to_date,
        errors: total.error_data.len(),
        update_data: total.update_data,
        error_data: total.error_data,
        failed_repos: total.failed_repos.clone(),
        ..UpdateReportContext::default()
    }
    .with_timing(started_at, finished_at);
    let log_path = Renderer::new()?.write_update_log(
        &store.logs_dir(),
        &update_log_file_name(started_at),
        &ctx,
    )?;

    let scratch = store.scratch_dir();
    fs::remove_dir_all(&scratch).map_err(|e| io_err(&scratch, e))?;

    tracing::info!(
        repos = planned,
        updated,
        up_to_date,
        errors = ctx.errors,
        seconds = elapsed.as_secs_f64(),
        log = %log_path.display(),
        "update finished"
    );

    Ok(RunSummary {
        processes,
        shard_size: checked.max_repos_per_list,
        total_repos: planned,
        updated,
        up_to_date,
        errors: ctx.errors,
        failed_repos: total.failed_repos,
        run_counter: db.run_counter,
        duration_secs: elapsed.as_secs_f64(),
        log_path,
    })
}

/// Last lines of a worker log, indented for the report.
fn log_tail(path: &Path) -> String {
    let Ok(contents) = fs::read_to_string(path) else {
        return String::new();
    };
    let mut tail: VecDeque<&str> = VecDeque::with_capacity(LOG_TAIL_LINES);
    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        if tail.len() == LOG_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.iter().map(|line| format!("  {line}\n")).collect()
}
