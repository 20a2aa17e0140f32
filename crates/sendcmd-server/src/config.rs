//! Command server configuration.

use std::path::PathBuf;
use std::time::Duration;

use sendcmd_common::protocol::DEFAULT_PORT;
use sendcmd_common::transport::DEFAULT_DRAIN_TIMEOUT;
use sendcmd_common::{Result, SendCmdError};

/// Configuration for a command server.
///
/// # Fields
///
/// - `bind_addr` - Address the listener binds (default `0.0.0.0:52000`)
/// - `command_timeout` - Longest a single shell command may run (default 30 seconds)
/// - `max_sessions` - Optional cap on concurrently handled connections
/// - `working_dir` - Starting directory for every session; `None` means the
///   process working directory at the moment the session starts
/// - `shutdown_grace` - How long sessions still running at shutdown may take
///   to finish before they are aborted (default 30 seconds)
///
/// # Example
///
/// ```
/// use sendcmd_server::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::new()
///     .with_bind_addr("127.0.0.1:0")
///     .with_command_timeout(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub command_timeout: Duration,
    pub max_sessions: Option<usize>,
    pub working_dir: Option<PathBuf>,
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            command_timeout: Duration::from_secs(30),
            max_sessions: None,
            working_dir: None,
            shutdown_grace: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if:
    /// - Command timeout is zero or longer than 1 hour
    /// - `max_sessions` is zero
    /// - `working_dir` is set but is not an existing directory
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout.is_zero() {
            return Err(SendCmdError::InvalidConfig(
                "command timeout must be greater than zero".to_string(),
            ));
        }

        if self.command_timeout.as_secs() > 3600 {
            return Err(SendCmdError::InvalidConfig(format!(
                "command timeout must be <= 1 hour (got {} seconds)",
                self.command_timeout.as_secs()
            )));
        }

        if self.max_sessions == Some(0) {
            return Err(SendCmdError::InvalidConfig(
                "max sessions must be at least 1".to_string(),
            ));
        }

        if let Some(dir) = &self.working_dir {
            if !dir.is_dir() {
                return Err(SendCmdError::InvalidConfig(format!(
                    "working directory {} does not exist",
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:52000");
        assert_eq!(config.command_timeout.as_secs(), 30);
        assert!(config.max_sessions.is_none());
        assert!(config.working_dir.is_none());
        assert_eq!(config.shutdown_grace.as_secs(), 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chaining() {
        let config = ServerConfig::new()
            .with_bind_addr("127.0.0.1:7000")
            .with_command_timeout(Duration::from_millis(1500))
            .with_max_sessions(8);

        assert_eq!(config.bind_addr, "127.0.0.1:7000");
        assert_eq!(config.command_timeout.as_millis(), 1500);
        assert_eq!(config.max_sessions, Some(8));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let err = ServerConfig::new()
            .with_command_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_validate_excessive_timeout_fails() {
        let err = ServerConfig::new()
            .with_command_timeout(Duration::from_secs(7200))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("1 hour"));
    }

    #[test]
    fn test_validate_zero_sessions_fails() {
        assert!(ServerConfig::new().with_max_sessions(0).validate().is_err());
    }

    #[test]
    fn test_validate_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::new().with_working_dir(dir.path()).validate().is_ok());

        let missing = dir.path().join("missing");
        assert!(ServerConfig::new().with_working_dir(missing).validate().is_err());
    }
}
