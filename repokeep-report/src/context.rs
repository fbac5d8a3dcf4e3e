//! Report contexts: serializable rendering payloads for the update log and
//! the repair summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Everything the update log shows about one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReportContext {
    pub root: String,
    /// Number of worker processes (one per shard).
    pub processes: usize,
    pub shard_size: usize,
    pub priority_only: bool,
    pub started_at: String,
    pub finished_at: String,
    /// Human-readable elapsed time, e.g. `1m 04s`.
    pub duration: String,
    pub run_counter: u64,
    pub total_repos: usize,
    pub updated: usize,
    pub up_to_date: usize,
    pub errors: usize,
    pub update_data: Vec<String>,
    pub error_data: Vec<String>,
    pub failed_repos: Vec<String>,
}

impl UpdateReportContext {
    /// Fill the timing fields from the run's start and end instants.
    pub fn with_timing(mut self, started: DateTime<Utc>, finished: DateTime<Utc>) -> Self {
        self.started_at = started.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        self.finished_at = finished.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let secs = (finished - started).num_seconds().max(0);
        self.duration = format_duration(secs);
        self
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, ReportError> {
        Ok(tera::Context::from_serialize(self)?)
    }
}

fn format_duration(secs: i64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

/// One per-repo problem reported by repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairErrorCtx {
    pub path: String,
    pub message: String,
}

/// Repair summary payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairReportContext {
    pub imported: usize,
    pub removed: usize,
    pub rekeyed: usize,
    pub keys_added: usize,
    pub keys_removed: usize,
    pub errors: Vec<RepairErrorCtx>,
}

impl RepairReportContext {
    pub fn to_tera_context(&self) -> Result<tera::Context, ReportError> {
        Ok(tera::Context::from_serialize(self)?)
    }
}
