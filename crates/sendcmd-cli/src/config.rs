//! Host configuration file.
//!
//! ```json
//! {
//!   "default_port": 52000,
//!   "hosts": [
//!     { "hostname": "10.0.0.5", "port": 52000, "commands": ["cd C:\\app", "start app.exe"] }
//!   ],
//!   "commandsets": {
//!     "restart": [
//!       { "hostname": "10.0.0.5", "command": "taskkill /IM app.exe /F;start app.exe" }
//!     ]
//!   }
//! }
//! ```
//!
//! `hosts` is used when no command set is selected. A host's batch is either
//! a `commands` list or a single `;`-separated `command` string.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use sendcmd_common::protocol::{CommandBatch, Target, DEFAULT_PORT};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HostsFile {
    default_port: Option<u64>,
    #[serde(default)]
    hosts: Vec<HostEntry>,
    #[serde(default)]
    commandsets: BTreeMap<String, Vec<HostEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HostEntry {
    hostname: String,
    port: Option<u64>,
    commands: Option<Vec<String>>,
    command: Option<String>,
}

/// Reads and validates targets from a host configuration file.
pub fn load_targets(path: &Path, commandset: Option<&str>) -> Result<Vec<Target>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading host config {}", path.display()))?;
    parse_targets(&text, commandset).with_context(|| format!("in {}", path.display()))
}

/// Parses and validates targets from host configuration JSON.
pub fn parse_targets(json: &str, commandset: Option<&str>) -> Result<Vec<Target>> {
    let file: HostsFile = serde_json::from_str(json).context("invalid host config JSON")?;

    let default_port = match file.default_port {
        Some(port) => validate_port(port).context("default_port")?,
        None => DEFAULT_PORT,
    };

    let entries = match commandset {
        Some(name) => file.commandsets.get(name).ok_or_else(|| {
            let known: Vec<_> = file.commandsets.keys().map(String::as_str).collect();
            anyhow!("command set '{}' not found (available: {})", name, known.join(", "))
        })?,
        None => &file.hosts,
    };

    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            entry
                .to_target(default_port)
                .with_context(|| format!("host #{}", idx + 1))
        })
        .collect()
}

/// Target for the single-host form `sendcmd send <hostname> <command>`.
pub fn single_host(hostname: &str, port: u16, command_line: &str) -> Result<Vec<Target>> {
    let target = Target::new(hostname, port, CommandBatch::from_command_line(command_line))?;
    Ok(vec![target])
}

impl HostEntry {
    fn to_target(&self, default_port: u16) -> Result<Target> {
        let port = match self.port {
            Some(port) => validate_port(port)?,
            None => default_port,
        };

        let commands = match (&self.commands, &self.command) {
            (Some(list), None) => CommandBatch::new(list.iter().cloned()),
            (None, Some(line)) => CommandBatch::from_command_line(line),
            (Some(_), Some(_)) => bail!("give either 'commands' or 'command', not both"),
            (None, None) => bail!("missing 'commands' or 'command'"),
        };

        Ok(Target::new(self.hostname.clone(), port, commands)?)
    }
}

fn validate_port(port: u64) -> Result<u16> {
    match u16::try_from(port) {
        Ok(port) if port != 0 => Ok(port),
        _ => bail!("port {} is outside 1-65535", port),
    }
}
