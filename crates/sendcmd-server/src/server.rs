//! Command server: the TCP listener wired to session handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use sendcmd_common::transport::TcpServer;
use sendcmd_common::Result;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::ServerConfig;
use crate::interpreter::{ProcessExecutor, ShellExecutor};
use crate::session::SessionHandler;

/// Signal that stops a running [`CommandServer`].
///
/// Triggering before anyone waits is not lost.
#[derive(Clone, Default)]
pub struct Shutdown {
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.notify.notify_one();
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Listens for dispatchers and runs one session per connection.
///
/// # Example
///
/// ```no_run
/// use sendcmd_server::{CommandServer, ServerConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let server = CommandServer::bind(ServerConfig::new().with_bind_addr("0.0.0.0:52000")).await?;
/// server.run().await?; // returns once a batch asks to `exit`
/// # Ok(())
/// # }
/// ```
pub struct CommandServer<E = ShellExecutor> {
    server: TcpServer,
    sessions: SessionHandler<E>,
    shutdown: Shutdown,
}

impl CommandServer<ShellExecutor> {
    /// Binds a server that runs commands through the platform shell.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        Self::with_executor(config, Arc::new(ShellExecutor::new())).await
    }
}

impl<E: ProcessExecutor> CommandServer<E> {
    pub async fn with_executor(config: ServerConfig, executor: Arc<E>) -> Result<Self> {
        config.validate()?;

        let mut server = TcpServer::new(&config.bind_addr)
            .await?
            .with_drain_timeout(config.shutdown_grace);
        if let Some(max) = config.max_sessions {
            server = server.with_max_connections(max);
        }

        Ok(Self {
            server,
            sessions: SessionHandler::new(executor, Arc::new(config)),
            shutdown: Shutdown::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.server.local_addr()
    }

    /// Handle for stopping the server from outside, e.g. on Ctrl-C.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Serves until a session requests `exit` or the shutdown handle fires.
    ///
    /// The requesting session has already flushed its response when the
    /// listener stops. Other sessions still running get the configured
    /// shutdown grace to send their results.
    pub async fn run(self) -> Result<()> {
        info!("Listening on {}", self.local_addr()?);

        let sessions = self.sessions;
        let shutdown = self.shutdown.clone();

        let handler = move |stream: TcpStream, peer: SocketAddr| {
            let sessions = sessions.clone();
            let shutdown = shutdown.clone();

            async move {
                match sessions.handle(stream).await {
                    Ok(result) if result.exit_requested => {
                        info!("Exit requested by {}, shutting down", peer);
                        shutdown.trigger();
                    }
                    Ok(_) => {}
                    Err(e) if e.is_framing() => {
                        warn!("Dropping connection from {}: {}", peer, e);
                    }
                    Err(e) => {
                        error!("Session with {} failed: {}", peer, e);
                    }
                }
            }
            .instrument(info_span!("session", %peer))
        };

        let stop = self.shutdown.clone();
        self.server.run_until(handler, async move { stop.wait().await }).await?;

        info!("Server stopped");
        Ok(())
    }
}
