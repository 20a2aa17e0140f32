//! sendcmd Transport Layer
//!
//! - **Codec**: JSON serialization for command batches and session results
//! - **Wire Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`,
//!   the same in both directions
//!
//! # Components
//!
//! - **[`JsonCodec`]**: Encode/decode the two payload shapes
//! - **[`TcpTransport`]**: Async framed reads and writes, plus connect
//! - **[`TcpServer`]**: Async accept loop, one task per connection
//!
//! # Message Size Limits
//!
//! Every frame is capped at 100 MB.

pub mod codec;
pub mod tcp;
pub mod tcp_server;

pub use codec::{encode_frame, JsonCodec, LENGTH_PREFIX_SIZE, MAX_MESSAGE_SIZE};
pub use tcp::TcpTransport;
pub use tcp_server::{TcpServer, DEFAULT_DRAIN_TIMEOUT};
