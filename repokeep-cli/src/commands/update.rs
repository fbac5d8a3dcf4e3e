//! `repokeep update`: run a batch update with live per-shard progress.

use std::cell::RefCell;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use repokeep_core::Store;
use repokeep_orchestrator::{
    run_update_blocking, ExecLauncher, NoProgress, Phase, ProgressSink, RunSummary,
    ShardProgress, UpdateOptions, Verbosity,
};

use crate::Globals;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Only update repositories flagged as priority.
    #[arg(long)]
    pub priority: bool,
}

impl UpdateArgs {
    pub fn run(self, store: &Store, globals: Globals) -> Result<()> {
        let mut launcher =
            ExecLauncher::current_exe().context("could not locate the repokeep binary")?;
        launcher = match globals.verbosity {
            Verbosity::Silent => launcher.arg("--silent"),
            Verbosity::Verbose => launcher.arg("--verbose"),
            Verbosity::Normal => launcher,
        };
        let opts = UpdateOptions {
            priority_only: self.priority,
        };

        let result = if globals.verbosity == Verbosity::Silent {
            run_update_blocking(store, opts, &launcher, &NoProgress)
        } else {
            run_update_blocking(store, opts, &launcher, &ShardBars::new())
        };
        let summary = result.context("update failed")?;

        if globals.verbosity != Verbosity::Silent {
            print_summary(&summary);
        }
        Ok(())
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} run #{}: {} repositories in {} processes, {:.1}s",
        "update finished".green().bold(),
        summary.run_counter,
        summary.total_repos,
        summary.processes,
        summary.duration_secs,
    );
    println!(
        "  {} updated  {} up to date  {}",
        summary.updated.to_string().green(),
        summary.up_to_date,
        if summary.errors > 0 {
            format!("{} errors", summary.errors).red().to_string()
        } else {
            "0 errors".to_string()
        }
    );
    for path in &summary.failed_repos {
        println!("  {} {path}", "failed".red());
    }
    println!("  report: {}", summary.log_path.display());
}

// ---------------------------------------------------------------------------
// Progress bars
// ---------------------------------------------------------------------------

/// One indicatif bar per shard.
struct ShardBars {
    multi: MultiProgress,
    bars: RefCell<Vec<ProgressBar>>,
}

impl ShardBars {
    fn new() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
            bars: RefCell::new(Vec::new()),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:>10} [{bar:30.cyan/blue}] {pos:>4}/{len:4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }
}

impl ProgressSink for ShardBars {
    fn phase(&self, phase: Phase) {
        match phase {
            Phase::Finalizing => {
                for bar in self.bars.borrow().iter() {
                    bar.finish();
                }
            }
            Phase::Idle => {
                let _ = self.multi.clear();
            }
            _ => {}
        }
    }

    fn shards(&self, sizes: &[usize]) {
        let style = Self::style();
        let mut bars = self.bars.borrow_mut();
        for (shard, &len) in sizes.iter().enumerate() {
            let bar = self.multi.add(ProgressBar::new(len as u64));
            bar.set_style(style.clone());
            bar.set_prefix(format!("shard {shard}"));
            bars.push(bar);
        }
    }

    fn shard(&self, progress: &ShardProgress) {
        if let Some(bar) = self.bars.borrow().get(progress.shard) {
            bar.set_length(progress.total as u64);
            bar.set_position(progress.current as u64);
            bar.set_message(format!(
                "{} updated, {} errors",
                progress.updated, progress.errors
            ));
        }
    }
}
