//! How worker processes are started.

use std::ffi::OsString;
use std::path::PathBuf;

use tokio::process::Command;

use repokeep_core::Store;

/// Builds the command that runs one shard as a separate process.
///
/// The runtime owns stdio redirection and waiting; the launcher only decides
/// what to execute.
pub trait WorkerLauncher: Send + Sync {
    fn command(&self, store: &Store, shard: usize) -> Command;
}

/// Runs `<program> <args…> --root <root> worker <shard>`.
#[derive(Debug, Clone)]
pub struct ExecLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ExecLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Launcher that re-executes the running binary.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Extra leading argument, e.g. `--silent`.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl WorkerLauncher for ExecLauncher {
    fn command(&self, store: &Store, shard: usize) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--root")
            .arg(store.root())
            .arg("worker")
            .arg(shard.to_string());
        cmd
    }
}
