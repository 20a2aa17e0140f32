use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::protocol::error::{Result, SendCmdError};

/// Async TCP accept loop.
///
/// Every accepted connection is handed to the connection handler on its own
/// tokio task, so a slow or stalled connection never holds up `accept`.
/// Handlers share nothing through the server itself.
pub struct TcpServer {
    listener: TcpListener,
    max_connections: Option<Arc<Semaphore>>,
    drain_timeout: Duration,
}

/// How long [`TcpServer::run_until`] waits for running handlers after shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

impl TcpServer {
    /// Creates a new TCP server bound to the specified address.
    ///
    /// # Arguments
    /// * `bind_addr` - The address to bind to (e.g., "0.0.0.0:52000")
    pub async fn new(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| SendCmdError::Connection(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        Ok(Self {
            listener,
            max_connections: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        })
    }

    /// Caps the number of connections handled at once. When the cap is
    /// reached, accepting pauses until a handler finishes.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    /// Sets how long handlers still running at shutdown may take to finish
    /// before they are aborted.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Gets the actual bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| SendCmdError::Connection(format!("Failed to get local addr: {}", e)))
    }

    /// Accepts connections until `shutdown` resolves, spawning `handler` for
    /// each one.
    ///
    /// After `shutdown` fires no new connection is accepted. Handlers already
    /// running get up to the drain timeout to finish and are aborted after
    /// that. Accept errors are logged and the loop carries on.
    pub async fn run_until<F, Fut, S>(&self, handler: F, shutdown: S) -> Result<()>
    where
        F: Fn(TcpStream, SocketAddr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        S: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        let mut handlers = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            let permit = match &self.max_connections {
                Some(semaphore) => {
                    let acquire = semaphore.clone().acquire_owned();
                    tokio::select! {
                        _ = &mut shutdown => break,
                        permit = acquire => match permit {
                            Ok(permit) => Some(permit),
                            Err(_) => break,
                        },
                    }
                }
                None => None,
            };

            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    Self::log_join(joined);
                    continue;
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer_addr) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            debug!("Connection established from {}", peer_addr);

            let handler = handler.clone();
            handlers.spawn(async move {
                handler(stream, peer_addr).await;
                drop(permit);
            });
        }

        info!("Listener stopped accepting connections");
        self.drain(handlers).await;
        Ok(())
    }

    async fn drain(&self, mut handlers: JoinSet<()>) {
        if handlers.is_empty() {
            return;
        }

        info!("Waiting for {} running connection(s) to finish", handlers.len());
        let finished = tokio::time::timeout(self.drain_timeout, async {
            while let Some(joined) = handlers.join_next().await {
                Self::log_join(joined);
            }
        })
        .await
        .is_ok();

        if !finished {
            warn!(
                "Aborting {} connection(s) still running after {}ms",
                handlers.len(),
                self.drain_timeout.as_millis()
            );
            handlers.shutdown().await;
        }
    }

    fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
        if let Err(e) = joined {
            if e.is_panic() {
                warn!("Connection handler panicked: {}", e);
            }
        }
    }
}
