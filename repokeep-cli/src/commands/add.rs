//! `repokeep add`: mirror-clone one repository and track it.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use repokeep_core::{Store, SystemRunner};
use repokeep_repair::add_url;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Clone URL of the repository.
    pub url: String,

    /// Include the repository in `update --priority` runs.
    #[arg(long)]
    pub priority: bool,
}

impl AddArgs {
    pub fn run(self, store: &Store) -> Result<()> {
        let key = add_url(store, &SystemRunner::for_git(), &self.url, self.priority)
            .with_context(|| format!("could not add {}", self.url))?;
        println!("{} {}", "added".green().bold(), key);
        Ok(())
    }
}
