//! `repokeep status`: run counters and tracked repositories.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use repokeep_core::{Database, Store};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, store: &Store) -> Result<()> {
        let db = store.load().context("failed to load database")?;
        let report = build_report(&db);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(store, report);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    run_counter: u64,
    last_run: String,
    update_runtime: f64,
    max_repos_per_list: usize,
    max_concurrent_workers: usize,
    connection_test_host: String,
    repos: Vec<RepoStatus>,
    /// Keys whose entry cannot be decoded; `repair` heals them.
    invalid: Vec<String>,
}

#[derive(Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
struct RepoStatus {
    #[tabled(rename = "repository")]
    path: String,
    #[tabled(rename = "can update")]
    can_update: bool,
    #[tabled(rename = "priority")]
    is_priority: bool,
    #[tabled(rename = "updates")]
    update_counter: u64,
    #[tabled(rename = "last updated")]
    last_updated_on: String,
}

fn build_report(db: &Database) -> StatusReport {
    let mut repos = Vec::new();
    let mut invalid = Vec::new();
    for key in db.repos.keys() {
        match db.entry(key) {
            Some(Ok(entry)) => repos.push(RepoStatus {
                path: key.clone(),
                can_update: entry.can_update,
                is_priority: entry.is_priority,
                update_counter: entry.update_counter,
                last_updated_on: entry.last_updated_on,
            }),
            _ => invalid.push(key.clone()),
        }
    }
    StatusReport {
        run_counter: db.run_counter,
        last_run: db.last_run.clone(),
        update_runtime: db.update_runtime,
        max_repos_per_list: db.max_repos_per_list,
        max_concurrent_workers: db.max_concurrent_workers,
        connection_test_host: db.connection_test_host.clone(),
        repos,
        invalid,
    }
}

fn print_table(store: &Store, report: StatusReport) {
    println!(
        "repokeep v{} | {} repositories | {} runs | last run {} | {:.0}s total",
        env!("CARGO_PKG_VERSION"),
        report.repos.len() + report.invalid.len(),
        report.run_counter,
        report.last_run,
        report.update_runtime,
    );
    if store.run_in_progress() {
        println!("{}", "An update is currently running.".yellow());
    }
    if report.repos.is_empty() && report.invalid.is_empty() {
        println!("No repositories tracked. Run 'repokeep add <url>' or 'repokeep repair'.");
        return;
    }

    if !report.repos.is_empty() {
        let mut table = Table::new(report.repos);
        table.with(Style::rounded());
        println!("{table}");
    }
    for key in &report.invalid {
        println!("{} {key}", "invalid entry".red());
    }
    if !report.invalid.is_empty() {
        println!("Run 'repokeep repair' to heal invalid entries.");
    }
}
