//! sendcmd Common Types and Transport
//!
//! Shared protocol definitions and TCP transport for the sendcmd remote
//! command system: a dispatcher sends an ordered batch of shell commands to
//! one or more command servers and collects per-command failures.
//!
//! # Architecture
//!
//! - **Transport**: TCP, one batch per connection
//! - **Serialization**: JSON
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Message Size**: 100 MB
//!
//! # Components
//!
//! - [`protocol`] - Targets, batches, error records, session results, errors
//! - [`transport`] - Codec, framed TCP transport and accept loop
//!
//! # Example
//!
//! ```
//! use sendcmd_common::{CommandBatch, Target};
//!
//! let batch = CommandBatch::from_command_line("cd /srv;make;exit");
//! let target = Target::new("build-01", 52000, batch).unwrap();
//! assert_eq!(target.addr(), "build-01:52000");
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
