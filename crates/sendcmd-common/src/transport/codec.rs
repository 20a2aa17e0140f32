use crate::protocol::error::{Result, SendCmdError};
use crate::protocol::{CommandBatch, SessionResult};

/// Width of the big-endian length prefix in front of every message.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload either side will accept (100 MB).
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// JSON codec for the two payload shapes.
///
/// A batch is a JSON array of strings; a result is an object with `errors`
/// and `exit_requested`. JSON keeps quotes, semicolons and non-ASCII command
/// text intact.
///
/// # Example
///
/// ```
/// use sendcmd_common::transport::JsonCodec;
/// use sendcmd_common::protocol::CommandBatch;
///
/// let batch = CommandBatch::new(["cd /srv", "make"]);
/// let encoded = JsonCodec::encode_batch(&batch).unwrap();
/// let decoded = JsonCodec::decode_batch(&encoded).unwrap();
/// assert_eq!(batch, decoded);
/// ```
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode_batch(batch: &CommandBatch) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(batch)?)
    }

    pub fn decode_batch(data: &[u8]) -> Result<CommandBatch> {
        serde_json::from_slice(data)
            .map_err(|e| SendCmdError::Framing(format!("malformed command batch: {}", e)))
    }

    pub fn encode_result(result: &SessionResult) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(result)?)
    }

    pub fn decode_result(data: &[u8]) -> Result<SessionResult> {
        serde_json::from_slice(data)
            .map_err(|e| SendCmdError::Framing(format!("malformed session result: {}", e)))
    }
}

/// Prefixes `payload` with its length as a 4-byte big-endian `u32`.
///
/// Wire format: `[4-byte length] [payload]`
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let len = check_length(payload.len())?;
    let mut framed = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(payload);
    Ok(framed)
}

/// Validates a payload length against [`MAX_MESSAGE_SIZE`].
pub(crate) fn check_length(len: usize) -> Result<u32> {
    if len > MAX_MESSAGE_SIZE {
        return Err(SendCmdError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    // MAX_MESSAGE_SIZE < u32::MAX
    Ok(len as u32)
}
