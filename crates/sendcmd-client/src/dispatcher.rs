use std::time::Duration;

use sendcmd_common::protocol::{ConnectionError, Phase, SessionResult, Target};
use sendcmd_common::transport::TcpTransport;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::report::{DispatchReport, HostReport};

/// Timeouts and connect retries for a dispatch.
///
/// Retries only ever repeat the TCP connect. Once a batch has been written
/// it is never sent again, so a command cannot run twice because of a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Limit for establishing one connection attempt.
    /// Default: 5 seconds
    pub connect_timeout: Duration,
    /// Limit for sending the batch and receiving its result. This covers
    /// the time the server spends running the commands.
    /// Default: 300 seconds
    pub response_timeout: Duration,
    /// Connection attempts per host, including the first.
    /// Default: 1
    pub connect_attempts: u32,
    /// Wait before the second attempt; doubles after each further failure,
    /// capped at 5 seconds.
    /// Default: 200ms
    pub retry_backoff: Duration,
}

const MAX_BACKOFF: Duration = Duration::from_secs(5);

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(300),
            connect_attempts: 1,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl DispatchConfig {
    /// One timeout for both connecting and waiting for the result.
    pub fn uniform(per_host_timeout: Duration) -> Self {
        Self {
            connect_timeout: per_host_timeout,
            response_timeout: per_host_timeout,
            ..Self::default()
        }
    }

    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

/// Sends command batches to many hosts at once.
///
/// Every target runs on its own tokio task with its own connection and its
/// own timeouts, so a refused, slow or hung host never holds up another.
/// The report lists targets in the order they were given.
///
/// # Example
///
/// ```no_run
/// use sendcmd_client::{DispatchConfig, Dispatcher};
/// use sendcmd_common::{CommandBatch, Target};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let targets = vec![
///     Target::new("build-01", 52000, CommandBatch::from_command_line("cd /srv;make"))?,
///     Target::new("build-02", 52000, CommandBatch::from_command_line("cd /srv;make"))?,
/// ];
///
/// let dispatcher = Dispatcher::new(DispatchConfig::uniform(Duration::from_secs(10)));
/// let report = dispatcher.dispatch(targets).await;
/// assert_eq!(report.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    transport: TcpTransport,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            transport: TcpTransport::new(),
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatches every target concurrently and waits for all of them.
    ///
    /// Never fails as a whole: each target ends up with either its
    /// [`SessionResult`] or a [`ConnectionError`].
    pub async fn dispatch<I>(&self, targets: I) -> DispatchReport
    where
        I: IntoIterator<Item = Target>,
    {
        let tasks: Vec<_> = targets
            .into_iter()
            .map(|target| {
                let transport = self.transport;
                let config = self.config;
                let handle = tokio::spawn({
                    let target = target.clone();
                    async move { Self::run_target(transport, config, &target).await }
                });
                (target, handle)
            })
            .collect();

        let (targets, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let outcomes = futures::future::join_all(handles).await;

        let hosts = targets
            .into_iter()
            .zip(outcomes)
            .map(|(target, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    Err(ConnectionError::Transport {
                        message: format!("dispatch task failed: {}", e),
                    })
                });
                HostReport { target, outcome }
            })
            .collect::<Vec<_>>();

        let report = DispatchReport { hosts };
        info!(
            "Dispatch finished: {} host(s), {} unreachable, {} with command failures",
            report.len(),
            report.unreachable_count(),
            report.failures().count() - report.unreachable_count()
        );
        report
    }

    /// Runs one target: connect, send, wait for the result.
    ///
    /// The connection is dropped on every exit path, including timeouts,
    /// which releases the socket right away.
    async fn run_target(
        transport: TcpTransport,
        config: DispatchConfig,
        target: &Target,
    ) -> Result<SessionResult, ConnectionError> {
        let mut stream = Self::connect(transport, &config, target).await?;
        info!("Sending {} command(s) to {}", target.commands.len(), target);

        let exchange = transport.send_batch(&mut stream, &target.commands);
        let outcome = match tokio::time::timeout(config.response_timeout, exchange).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(ConnectionError::from_error(e, Phase::Response)),
            Err(_) => Err(ConnectionError::TimedOut {
                phase: Phase::Response,
                after_ms: config.response_timeout.as_millis() as u64,
            }),
        };

        match &outcome {
            Ok(result) if result.is_clean() => info!("{}: all commands succeeded", target),
            Ok(result) => warn!("{}: {} command(s) failed", target, result.errors.len()),
            Err(e) => warn!("{}: {}", target, e),
        }
        outcome
    }

    async fn connect(
        transport: TcpTransport,
        config: &DispatchConfig,
        target: &Target,
    ) -> Result<TcpStream, ConnectionError> {
        let addr = target.addr();
        let attempts = config.connect_attempts.max(1);
        let mut backoff = config.retry_backoff;
        let mut last_err = None;

        for attempt in 1..=attempts {
            let err = match tokio::time::timeout(config.connect_timeout, transport.connect(&addr)).await {
                Ok(Ok(stream)) => {
                    debug!("Connected to {} on attempt {}", addr, attempt);
                    return Ok(stream);
                }
                Ok(Err(e)) => ConnectionError::from_error(e, Phase::Connect),
                Err(_) => ConnectionError::TimedOut {
                    phase: Phase::Connect,
                    after_ms: config.connect_timeout.as_millis() as u64,
                },
            };

            if attempt < attempts {
                warn!(
                    "Connection attempt {}/{} to {} failed: {}. Retrying in {:?}",
                    attempt, attempts, addr, err, backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            last_err = Some(err);
        }

        Err(last_err.unwrap_or_else(|| ConnectionError::Transport {
            message: format!("no connection attempt made to {}", addr),
        }))
    }
}
