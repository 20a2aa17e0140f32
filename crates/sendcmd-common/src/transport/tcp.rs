use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::error::{Result, SendCmdError};
use crate::protocol::{CommandBatch, SessionResult};
use crate::transport::codec::{check_length, JsonCodec, LENGTH_PREFIX_SIZE, MAX_MESSAGE_SIZE};

/// Async TCP transport for sendcmd.
///
/// Both directions use the same framing, so the reader always knows where a
/// message ends no matter how the bytes were chunked in transit:
///
/// ```text
/// [4-byte length] [JSON data]
/// ```
///
/// The message helpers are generic over any `AsyncRead`/`AsyncWrite`, which
/// lets sessions run over in-memory pipes in tests.
///
/// # Example
///
/// ```no_run
/// use sendcmd_common::transport::TcpTransport;
/// use sendcmd_common::protocol::CommandBatch;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = TcpTransport::new();
/// let mut stream = transport.connect("127.0.0.1:52000").await?;
///
/// let batch = CommandBatch::new(["cd /srv", "make"]);
/// let result = transport.send_batch(&mut stream, &batch).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }

    /// Connects to a remote endpoint.
    ///
    /// The address is resolved without blocking the runtime, then each
    /// resolved address is tried in turn until one accepts.
    ///
    /// # Errors
    ///
    /// - `Unresolved` if the name does not resolve to any address
    /// - `ConnectionRefused` if every address actively refused
    /// - `Connection` for any other connect failure
    pub async fn connect(&self, addr: &str) -> Result<TcpStream> {
        let socket_addrs: Vec<_> = tokio::net::lookup_host(addr)
            .await
            .map_err(|e| SendCmdError::Unresolved(format!("{}: {}", addr, e)))?
            .collect();

        if socket_addrs.is_empty() {
            return Err(SendCmdError::Unresolved(format!("{}: no addresses", addr)));
        }

        let mut last_err = None;
        for socket_addr in socket_addrs {
            match TcpStream::connect(socket_addr).await {
                Ok(stream) => {
                    // batches are tiny; don't wait for Nagle
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", socket_addr, e);
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if e.kind() == ErrorKind::ConnectionRefused => {
                Err(SendCmdError::ConnectionRefused(format!("{}: {}", addr, e)))
            }
            Some(e) => Err(SendCmdError::Connection(format!("Failed to connect to {}: {}", addr, e))),
            None => Err(SendCmdError::Connection(format!("Failed to connect to {}", addr))),
        }
    }

    /// Sends a batch and waits for the session result.
    pub async fn send_batch<S>(&self, stream: &mut S, batch: &CommandBatch) -> Result<SessionResult>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let encoded = JsonCodec::encode_batch(batch)?;
        Self::send_message(stream, &encoded).await?;

        let response = Self::receive_message(stream).await?;
        JsonCodec::decode_result(&response)
    }

    /// Reads one framed command batch.
    pub async fn read_batch<R>(stream: &mut R) -> Result<CommandBatch>
    where
        R: AsyncRead + Unpin,
    {
        let data = Self::receive_message(stream).await?;
        JsonCodec::decode_batch(&data)
    }

    /// Writes one framed session result and flushes it.
    pub async fn write_result<W>(stream: &mut W, result: &SessionResult) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let encoded = JsonCodec::encode_result(result)?;
        Self::send_message(stream, &encoded).await
    }

    /// Sends a message with length prefix.
    ///
    /// Wire format: `[4-byte length as u32 big-endian] + [data]`
    pub async fn send_message<W>(stream: &mut W, data: &[u8]) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let len = check_length(data.len())?;

        stream
            .write_all(&len.to_be_bytes())
            .await
            .map_err(|e| Self::map_write_error(e, "writing length prefix"))?;

        stream
            .write_all(data)
            .await
            .map_err(|e| Self::map_write_error(e, "writing data"))?;

        stream
            .flush()
            .await
            .map_err(|e| Self::map_write_error(e, "flushing stream"))?;

        Ok(())
    }

    /// Receives a message with length prefix.
    ///
    /// # Errors
    ///
    /// - `Framing` if the stream ends or aborts before the prefix or the
    ///   full payload arrives
    /// - `MessageTooLarge` if the prefix announces more than 100 MB
    pub async fn receive_message<R>(stream: &mut R) -> Result<Vec<u8>>
    where
        R: AsyncRead + Unpin,
    {
        let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
        stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| Self::map_read_error(e, "reading length prefix"))?;

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(SendCmdError::MessageTooLarge {
                size: len,
                max: MAX_MESSAGE_SIZE,
            });
        }

        let mut buf = vec![0u8; len];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| Self::map_read_error(e, "reading data"))?;

        Ok(buf)
    }

    /// A read that ends early or is aborted by the peer leaves a partial
    /// frame, so it is a framing failure.
    fn map_read_error(err: std::io::Error, context: &str) -> SendCmdError {
        match err.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                SendCmdError::Framing(format!("{}: connection closed mid-message", context))
            }
            _ => SendCmdError::Io(err),
        }
    }

    fn map_write_error(err: std::io::Error, context: &str) -> SendCmdError {
        match err.kind() {
            ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected => {
                SendCmdError::Connection(format!("{}: connection lost", context))
            }
            _ => SendCmdError::Io(err),
        }
    }
}
