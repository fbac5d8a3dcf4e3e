//! Batch update orchestration: check, shard, spawn one worker process per
//! shard, follow their result documents, then merge everything into the
//! database in a single write.

mod error;
pub mod launcher;
pub mod logging;
pub mod progress;
mod runtime;

pub use error::OrchestratorError;
pub use launcher::{ExecLauncher, WorkerLauncher};
pub use logging::{init_tracing, Verbosity};
pub use progress::{NoProgress, Phase, ProgressSink, ShardProgress};
pub use runtime::{run_update, run_update_blocking, RunSummary, UpdateOptions};
