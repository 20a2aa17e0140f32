//! One connection, one batch, one interpreter.

use std::sync::Arc;

use sendcmd_common::protocol::SessionResult;
use sendcmd_common::transport::TcpTransport;
use sendcmd_common::{Result, SendCmdError};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::interpreter::{CommandInterpreter, ExecutionContext, ProcessExecutor};

/// Handles connections for a command server.
///
/// Cloning is cheap and clones share only the executor and the read-only
/// configuration. Each call to [`handle`](Self::handle) builds its own
/// interpreter and execution context.
pub struct SessionHandler<E> {
    executor: Arc<E>,
    config: Arc<ServerConfig>,
}

impl<E> Clone for SessionHandler<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E: ProcessExecutor> SessionHandler<E> {
    pub fn new(executor: Arc<E>, config: Arc<ServerConfig>) -> Self {
        Self { executor, config }
    }

    /// Reads one batch, runs it and writes back the result.
    ///
    /// The result is flushed and the write side shut down before this
    /// returns, so a caller that acts on `exit_requested` afterwards cannot
    /// cut off the response.
    ///
    /// # Errors
    ///
    /// - A framing error if the request cannot be read or decoded. Nothing
    ///   is sent back.
    /// - An IO error if the session's starting directory cannot be found.
    /// - A connection error if the response cannot be written.
    pub async fn handle<S>(&self, mut stream: S) -> Result<SessionResult>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let batch = TcpTransport::read_batch(&mut stream).await?;
        debug!("Received batch of {} command(s)", batch.len());

        let context = match &self.config.working_dir {
            Some(dir) => ExecutionContext::new(dir.clone()),
            None => ExecutionContext::from_process()?,
        };

        let mut interpreter =
            CommandInterpreter::new(context, self.executor.clone(), self.config.command_timeout);
        let result = interpreter.run(&batch).await;

        TcpTransport::write_result(&mut stream, &result).await?;
        stream
            .shutdown()
            .await
            .map_err(|e| SendCmdError::Connection(format!("closing connection: {}", e)))?;

        info!(
            "Batch finished: {} command(s), {} error(s){}",
            batch.len(),
            result.errors.len(),
            if result.exit_requested { ", exit requested" } else { "" }
        );

        Ok(result)
    }
}
