//! Ports for the outside world: running external commands and asking the
//! operator a yes/no question.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Combined stdout+stderr of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub output: String,
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an external program in a working directory.
pub trait CommandRunner: Send + Sync {
    /// Run `program args…` with `cwd` as working directory.
    ///
    /// An `Err` means the process could not be started at all.
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> io::Result<CommandOutput>;
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    envs: Vec<(String, String)>,
}

impl SystemRunner {
    /// Runner for unattended git: credential prompts fail instead of blocking.
    pub fn for_git() -> Self {
        Self::default().env("GIT_TERMINAL_PROMPT", "0")
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> io::Result<CommandOutput> {
        let out = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .output()?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        tracing::debug!(program, ?args, cwd = %cwd.display(), code = ?out.status.code(), "command finished");
        Ok(CommandOutput {
            output,
            code: out.status.code(),
        })
    }
}

/// Operator confirmation, injected so engines stay free of terminal I/O.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn system_runner_combines_stdout_and_stderr() {
        let dir = TempDir::new().expect("tempdir");
        let out = SystemRunner::default()
            .run("sh", &["-c", "echo out; echo err 1>&2; exit 3"], dir.path())
            .expect("run");
        assert_eq!(out.output, "out\nerr\n");
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
    }

    #[test]
    fn system_runner_missing_cwd_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("gone");
        assert!(SystemRunner::default().run("git", &["status"], &missing).is_err());
    }

    #[test]
    fn closures_are_confirmations() {
        let yes = |_: &str| true;
        assert!(yes.confirm("remove?"));
    }
}
