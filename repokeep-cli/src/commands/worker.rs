//! `repokeep worker`: run one shard; spawned by `update`, never by hand.

use anyhow::{Context, Result};
use clap::Args;

use repokeep_core::{Store, SystemRunner};
use repokeep_fetch::run_worker;

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Shard index assigned by the orchestrator.
    pub shard: usize,
}

impl WorkerArgs {
    /// A missing job still exits 0; the orchestrator reports the empty shard.
    pub fn run(self, store: &Store) -> Result<()> {
        run_worker(store, self.shard, &SystemRunner::for_git())
            .with_context(|| format!("worker for shard {} failed", self.shard))?;
        Ok(())
    }
}
