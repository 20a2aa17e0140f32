use serde::{Deserialize, Serialize};

use super::error::{Result, SendCmdError};

/// Port a command server listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 52000;

/// An ordered list of commands sent to a server in one message.
///
/// Order is execution order. On the wire a batch is a bare JSON array of
/// strings. An empty batch is legal and produces an empty result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct CommandBatch {
    pub commands: Vec<String>,
}

impl CommandBatch {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandBatch {
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a `;`-separated command line into a batch.
    ///
    /// Empty segments are kept so the batch mirrors what the operator typed;
    /// the interpreter skips them.
    pub fn from_command_line(line: &str) -> Self {
        CommandBatch::new(line.split(';'))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.commands.iter()
    }
}

impl<'a> IntoIterator for &'a CommandBatch {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

/// One unit of dispatch: a host, a port and the batch to run there.
///
/// `(hostname, port)` identifies the host but need not be unique within one
/// dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub hostname: String,
    pub port: u16,
    pub commands: CommandBatch,
}

impl Target {
    /// Builds a target, rejecting an empty hostname or port 0.
    pub fn new(hostname: impl Into<String>, port: u16, commands: CommandBatch) -> Result<Self> {
        let hostname = hostname.into();
        if hostname.trim().is_empty() {
            return Err(SendCmdError::InvalidTarget("hostname must not be empty".to_string()));
        }
        if port == 0 {
            return Err(SendCmdError::InvalidTarget(format!(
                "port for {} must be between 1 and 65535",
                hostname
            )));
        }

        Ok(Target {
            hostname,
            port,
            commands,
        })
    }

    /// `host:port` form accepted by address resolution.
    pub fn addr(&self) -> String {
        if self.hostname.contains(':') && !self.hostname.starts_with('[') {
            // bare IPv6 literal
            format!("[{}]:{}", self.hostname, self.port)
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.addr())
    }
}
