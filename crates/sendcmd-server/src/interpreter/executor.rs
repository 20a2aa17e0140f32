//! The process-execution primitive.
//!
//! Given a command line, a working directory and environment overrides, run
//! the command and report how it ended. The interpreter only sees
//! [`ExecOutcome`].

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Everything needed to run one shell command.
#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    pub command: &'a str,
    pub working_dir: &'a Path,
    /// Merged over the inherited environment.
    pub env: &'a BTreeMap<String, String>,
    pub timeout: Duration,
}

/// How a command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Success,
    /// Exited unsuccessfully. `code` is `None` when a signal ended it.
    Failed { code: Option<i32> },
    /// The process could not be started or waited on.
    SpawnFailed(String),
    /// Killed after exceeding the timeout.
    TimedOut,
}

/// Runs shell commands for the interpreter.
///
/// Implementations must not change process-wide state such as the current
/// directory; everything they need is in the request.
pub trait ProcessExecutor: Send + Sync + 'static {
    fn execute(&self, request: ExecRequest<'_>) -> impl Future<Output = ExecOutcome> + Send;
}

/// Runs commands through the platform shell (`sh -c` or `cmd /C`).
///
/// stdin is closed and output goes to the server's own stdout/stderr, so a
/// command that opens a window or waits on input does not hold the pipe.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }

    #[cfg(windows)]
    fn shell_command(command: &str) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").raw_arg(command);
        cmd
    }

    #[cfg(not(windows))]
    fn shell_command(command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

impl ProcessExecutor for ShellExecutor {
    async fn execute(&self, request: ExecRequest<'_>) -> ExecOutcome {
        let mut command = Self::shell_command(request.command);
        command
            .current_dir(request.working_dir)
            .envs(request.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return ExecOutcome::SpawnFailed(e.to_string()),
        };

        match tokio::time::timeout(request.timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => ExecOutcome::Success,
            Ok(Ok(status)) => ExecOutcome::Failed { code: status.code() },
            Ok(Err(e)) => ExecOutcome::SpawnFailed(format!("failed waiting for process: {}", e)),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill timed-out command '{}': {}", request.command, e);
                }
                ExecOutcome::TimedOut
            }
        }
    }
}
