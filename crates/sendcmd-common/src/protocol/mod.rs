pub mod error;
pub mod requests;
pub mod responses;


pub use error::{ConnectionError, Phase, Result, SendCmdError};
pub use requests::{CommandBatch, Target, DEFAULT_PORT};
pub use responses::{ErrorKind, ErrorRecord, SessionResult};
