//! `repokeep repair`: reconcile database and disk.

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm as Prompt};

use repokeep_core::{Confirm, Store, SystemRunner};
use repokeep_repair::{repair, RepairOptions, RepairReport};
use repokeep_report::{RepairErrorCtx, RepairReportContext, Renderer};

#[derive(Args, Debug)]
pub struct RepairArgs {
    /// Remove entries whose clone is gone without asking.
    #[arg(long)]
    pub force: bool,
}

impl RepairArgs {
    pub fn run(self, store: &Store) -> Result<()> {
        let report = repair(
            store,
            &SystemRunner::for_git(),
            &TerminalConfirm,
            RepairOptions { force: self.force },
        )
        .context("repair failed")?;

        let renderer = Renderer::new().context("failed to load report templates")?;
        let text = renderer
            .render_repair(&to_context(report))
            .context("failed to render repair report")?;
        print!("{text}");
        Ok(())
    }
}

/// Asks on the terminal; anything but an explicit yes keeps the entry.
struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        Prompt::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

fn to_context(report: RepairReport) -> RepairReportContext {
    RepairReportContext {
        imported: report.imported,
        removed: report.removed,
        rekeyed: report.rekeyed,
        keys_added: report.keys_added,
        keys_removed: report.keys_removed,
        errors: report
            .errors
            .into_iter()
            .map(|(path, message)| RepairErrorCtx { path, message })
            .collect(),
    }
}
