//! repokeep: keep mirror clones of git repositories up to date.
//!
//! # Usage
//!
//! ```text
//! repokeep [--root DIR] [--silent] [-v] update [--priority]
//! repokeep repair [--force]
//! repokeep add <url> [--priority]
//! repokeep status [--json]
//! repokeep config [--max-repos-per-list N] [--max-workers N] [--connection-host HOST]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{
    add::AddArgs, config::ConfigArgs, repair::RepairArgs, status::StatusArgs,
    update::UpdateArgs, worker::WorkerArgs,
};
use repokeep_core::Store;
use repokeep_orchestrator::{init_tracing, Verbosity};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "repokeep",
    version,
    about = "Keep mirror clones of git repositories up to date",
    long_about = None,
)]
struct Cli {
    /// Working root holding database.json, repos/ and logs/.
    #[arg(long, global = true, env = "REPOKEEP_ROOT", value_name = "DIR")]
    root: Option<PathBuf>,

    /// Suppress all log output.
    #[arg(long, global = true)]
    silent: bool,

    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch every updatable repository using parallel workers.
    Update(UpdateArgs),

    /// Process one shard of a running update.
    #[command(hide = true)]
    Worker(WorkerArgs),

    /// Reconcile the database with the clones on disk.
    Repair(RepairArgs),

    /// Mirror-clone a repository and start tracking it.
    Add(AddArgs),

    /// Show run counters and tracked repositories.
    Status(StatusArgs),

    /// Show or change update settings.
    Config(ConfigArgs),
}

/// Flags every subcommand can see.
#[derive(Debug, Clone, Copy)]
pub struct Globals {
    pub verbosity: Verbosity,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let globals = Globals {
        verbosity: Verbosity::from_flags(cli.silent, cli.verbose),
    };
    init_tracing(globals.verbosity);

    let cwd = std::env::current_dir().context("could not determine current directory")?;
    let root = match cli.root {
        Some(root) => cwd.join(root),
        None => cwd,
    };
    let store = Store::at(root);

    match cli.command {
        Commands::Update(args) => args.run(&store, globals),
        Commands::Worker(args) => args.run(&store),
        Commands::Repair(args) => args.run(&store),
        Commands::Add(args) => args.run(&store),
        Commands::Status(args) => args.run(&store),
        Commands::Config(args) => args.run(&store),
    }
}
