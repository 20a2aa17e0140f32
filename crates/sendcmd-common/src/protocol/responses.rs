//! Result payload returned by a command server.

use serde::{Deserialize, Serialize};

/// Why a command in a batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The shell process could not be started.
    SpawnError,
    /// The process ran and exited with a non-zero status.
    NonZeroExit,
    /// The process outlived the per-command timeout and was killed.
    Timeout,
    /// A `cd`, drive change or `set` directive could not be applied.
    InvalidDirective,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::SpawnError => "spawn error",
            ErrorKind::NonZeroExit => "non-zero exit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidDirective => "invalid directive",
        };
        f.write_str(name)
    }
}

/// A failed command. Commands without a record succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub command: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(command: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        ErrorRecord {
            command: command.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of running one batch in one session.
///
/// `errors` is in batch order. `exit_requested` is set when the batch
/// contained `exit`; commands after it were not run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub errors: Vec<ErrorRecord>,
    pub exit_requested: bool,
}

impl SessionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ErrorRecord) {
        self.errors.push(record);
    }

    /// True when every command that ran succeeded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
