//! `repokeep config`: update settings stored in the database document.

use anyhow::{bail, ensure, Context, Result};
use clap::Args;

use repokeep_core::Store;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Repositories per worker process.
    #[arg(long, value_name = "N")]
    pub max_repos_per_list: Option<usize>,

    /// Worker processes running at once; 0 starts one per shard.
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Host resolved before an update to check connectivity.
    #[arg(long, value_name = "HOST")]
    pub connection_host: Option<String>,
}

impl ConfigArgs {
    pub fn run(self, store: &Store) -> Result<()> {
        let mut db = store.load().context("failed to load database")?;
        let editing = self.max_repos_per_list.is_some()
            || self.max_workers.is_some()
            || self.connection_host.is_some();

        if editing {
            if store.run_in_progress() {
                bail!(
                    "an update is in progress ({} exists); try again when it finishes",
                    store.scratch_dir().display()
                );
            }
            if let Some(n) = self.max_repos_per_list {
                ensure!(n >= 1, "--max-repos-per-list must be at least 1");
                db.max_repos_per_list = n;
            }
            if let Some(n) = self.max_workers {
                db.max_concurrent_workers = n;
            }
            if let Some(host) = self.connection_host {
                ensure!(!host.trim().is_empty(), "--connection-host must not be empty");
                db.connection_test_host = host.trim().to_string();
            }
            store.save(&db).context("failed to save database")?;
        }

        println!("maxReposPerList       {}", db.max_repos_per_list);
        println!(
            "maxConcurrentWorkers  {}",
            match db.max_concurrent_workers {
                0 => "0 (one per shard)".to_string(),
                n => n.to_string(),
            }
        );
        println!("connectionTestHost    {}", db.connection_test_host);
        Ok(())
    }
}
