use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SendCmdError {
    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Message too large: {size} bytes (max {max} bytes)")]
    MessageTooLarge { size: usize, max: usize },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Could not resolve {0}")]
    Unresolved(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SendCmdError {
    /// Whether this error means the peer sent something we could not frame or decode.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            SendCmdError::Framing(_) | SendCmdError::MessageTooLarge { .. } | SendCmdError::Json(_)
        )
    }
}

impl From<std::net::AddrParseError> for SendCmdError {
    fn from(err: std::net::AddrParseError) -> Self {
        SendCmdError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SendCmdError>;

/// Which step of a dispatch was running when a timeout fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Connect,
    Response,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Connect => f.write_str("connect"),
            Phase::Response => f.write_str("response"),
        }
    }
}

/// Transport-level failure for one host. The batch was never executed, or its
/// result never came back.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionError {
    #[error("connection refused: {message}")]
    Refused { message: String },

    #[error("{phase} timed out after {after_ms}ms")]
    TimedOut { phase: Phase, after_ms: u64 },

    #[error("could not resolve host: {message}")]
    Unresolved { message: String },

    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl ConnectionError {
    /// Converts a transport error raised during `phase` into a per-host report error.
    pub fn from_error(err: SendCmdError, phase: Phase) -> Self {
        match err {
            SendCmdError::ConnectionRefused(message) => ConnectionError::Refused { message },
            SendCmdError::Unresolved(message) => ConnectionError::Unresolved { message },
            SendCmdError::Timeout(after_ms) => ConnectionError::TimedOut { phase, after_ms },
            other => ConnectionError::Transport {
                message: other.to_string(),
            },
        }
    }
}
