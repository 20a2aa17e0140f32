//! sendcmd Server
//!
//! Receives command batches over TCP and runs them. Every connection gets a
//! fresh [`CommandInterpreter`] with its own working directory and
//! environment overrides; the process working directory is never changed.
//!
//! - [`interpreter`] - Directive classification, execution context and the
//!   process-execution primitive
//! - [`session`] - One connection: decode, run, respond
//! - [`server`] - Accept loop and `exit` handling

pub mod config;
pub mod interpreter;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use interpreter::{CommandInterpreter, ExecOutcome, ExecRequest, ExecutionContext, ProcessExecutor, ShellExecutor};
pub use server::{CommandServer, Shutdown};
pub use session::SessionHandler;
