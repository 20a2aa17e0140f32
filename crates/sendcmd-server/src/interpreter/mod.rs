//! Session-scoped command interpreter.
//!
//! A [`CommandInterpreter`] owns one [`ExecutionContext`] and runs batches
//! against it strictly in order. Failures are recorded and the batch goes
//! on; only `exit` stops it.

pub mod context;
pub mod directive;
pub mod executor;

use std::sync::Arc;
use std::time::Duration;

use sendcmd_common::protocol::{CommandBatch, ErrorKind, ErrorRecord, SessionResult};
use tracing::{debug, info, warn};

pub use context::{DirectiveError, ExecutionContext};
pub use directive::Directive;
pub use executor::{ExecOutcome, ExecRequest, ProcessExecutor, ShellExecutor};

/// Exit status `taskkill` uses for "no such process". Killing something
/// that is already gone counts as success.
const TASKKILL_NOT_FOUND: i32 = 128;

pub struct CommandInterpreter<E> {
    context: ExecutionContext,
    executor: Arc<E>,
    command_timeout: Duration,
}

impl<E: ProcessExecutor> CommandInterpreter<E> {
    pub fn new(context: ExecutionContext, executor: Arc<E>, command_timeout: Duration) -> Self {
        Self {
            context,
            executor,
            command_timeout,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Runs `batch` in order and returns the failures.
    ///
    /// - `exit` stops immediately and sets `exit_requested`; later entries
    ///   are neither run nor reported.
    /// - A failed `cd`, drive change or `set` records `InvalidDirective`
    ///   and leaves the context as it was.
    /// - Shell commands record `SpawnError`, `NonZeroExit` or `Timeout`.
    /// - Blank entries are skipped.
    pub async fn run(&mut self, batch: &CommandBatch) -> SessionResult {
        let mut result = SessionResult::new();

        for (index, command) in batch.iter().enumerate() {
            match Directive::classify(command) {
                Directive::Skip => continue,
                Directive::Exit => {
                    info!(
                        "Exit requested, skipping {} remaining command(s)",
                        batch.len() - index - 1
                    );
                    result.exit_requested = true;
                    break;
                }
                Directive::ChangeDir(path) => {
                    let applied = self.context.change_dir(path).await;
                    self.record_directive(&mut result, command, applied);
                }
                Directive::DriveChange(letter) => {
                    let applied = self.context.change_drive(letter).await;
                    self.record_directive(&mut result, command, applied);
                }
                Directive::SetEnv(assignment) => {
                    let applied = self.context.set_env(assignment);
                    self.record_directive(&mut result, command, applied);
                }
                Directive::Shell(text) => {
                    if let Some(record) = self.execute(command, text).await {
                        result.push(record);
                    }
                }
            }
        }

        result
    }

    fn record_directive(
        &self,
        result: &mut SessionResult,
        command: &str,
        applied: Result<(), DirectiveError>,
    ) {
        match applied {
            Ok(()) => debug!(
                "Applied '{}' (cwd now {})",
                command,
                self.context.working_dir().display()
            ),
            Err(e) => {
                warn!("Directive '{}' failed: {}", command, e);
                result.push(ErrorRecord::new(command, ErrorKind::InvalidDirective, e.to_string()));
            }
        }
    }

    async fn execute(&self, command: &str, text: &str) -> Option<ErrorRecord> {
        info!("Executing {}", text);

        let request = ExecRequest {
            command: text,
            working_dir: self.context.working_dir(),
            env: self.context.env_overrides(),
            timeout: self.command_timeout,
        };

        let (kind, message) = match self.executor.execute(request).await {
            ExecOutcome::Success => return None,
            ExecOutcome::Failed { code: Some(TASKKILL_NOT_FOUND) } if is_taskkill(text) => {
                debug!("'{}' found nothing to kill", text);
                return None;
            }
            ExecOutcome::Failed { code: Some(code) } => {
                (ErrorKind::NonZeroExit, format!("exited with status {}", code))
            }
            ExecOutcome::Failed { code: None } => {
                (ErrorKind::NonZeroExit, "terminated by signal".to_string())
            }
            ExecOutcome::SpawnFailed(reason) => (ErrorKind::SpawnError, reason),
            ExecOutcome::TimedOut => (
                ErrorKind::Timeout,
                format!("killed after {}ms", self.command_timeout.as_millis()),
            ),
        };

        warn!("Command '{}' failed ({}): {}", text, kind, message);
        Some(ErrorRecord::new(command, kind, message))
    }
}

fn is_taskkill(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .map(|program| {
            program.eq_ignore_ascii_case("taskkill") || program.eq_ignore_ascii_case("taskkill.exe")
        })
        .unwrap_or(false)
}
