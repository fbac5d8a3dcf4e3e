//! Run-progress reporting port.

use serde::Serialize;

/// Orchestrator state. A run walks these in order and ends back in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Checking,
    Sharding,
    Spawning,
    AwaitingResults,
    AwaitingExit,
    Finalizing,
}

/// Latest known state of one shard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShardProgress {
    pub shard: usize,
    pub current: usize,
    pub total: usize,
    pub updated: usize,
    pub errors: usize,
    pub percent: f64,
}

/// Receives progress from a run. Every method defaults to doing nothing.
pub trait ProgressSink {
    fn phase(&self, _phase: Phase) {}

    /// Shard sizes, once partitioning is done.
    fn shards(&self, _sizes: &[usize]) {}

    fn shard(&self, _progress: &ShardProgress) {}
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}
