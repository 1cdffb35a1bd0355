use crate::client::{DEFAULT_READ_TIMEOUT, MAX_SDU};
use crate::fabric::{Fabric, Registration};
use crate::name::EndpointName;
use crate::{FlowrrError, Result};
use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::{signal, time::timeout};
use tracing::{error, info, warn};

/// What a per-flow readability timeout takes down
///
/// The historical behavior of this tool was to abort the whole accept loop
/// when a single flow stayed silent; the per-connection scope keeps the
/// server alive and only drops the offending flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutScope {
    /// Drop the silent flow, keep accepting
    #[default]
    Connection,
    /// Abort the whole server
    Server,
}

/// Retry policy for failed accepts
///
/// Accept failures are transient, but retrying them in a tight loop spins a
/// CPU for nothing. Failures back off exponentially and trip a breaker after
/// too many in a row; any successful accept resets the count.
#[derive(Debug, Clone)]
pub struct AcceptRetry {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for AcceptRetry {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            max_consecutive_failures: 10,
        }
    }
}

impl AcceptRetry {
    /// Backoff to sleep after the Nth consecutive failure (N >= 1)
    fn backoff_after(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }
}

/// Configuration for the echo server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// DIF to register the listening name in
    pub dif: Option<String>,
    /// Intermediate process to pin, overriding `dif` when set
    pub ipcp: EndpointName,
    /// Name clients allocate flows to
    pub name: EndpointName,
    /// Deadline for an accepted flow to produce its request
    pub read_timeout: Duration,
    /// Upper bound on the request size read and echoed back
    pub buffer_size: usize,
    pub timeout_scope: TimeoutScope,
    pub accept_retry: AcceptRetry,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dif: None,
            ipcp: EndpointName::unset(),
            name: EndpointName::new(Some("rlite_rr-data"), Some("server")),
            read_timeout: DEFAULT_READ_TIMEOUT,
            buffer_size: MAX_SDU,
            timeout_scope: TimeoutScope::default(),
            accept_retry: AcceptRetry::default(),
        }
    }
}

/// Echo server over a flow fabric
///
/// Registers its name, then serves accepted flows one at a time: each flow
/// carries exactly one request, which is echoed back verbatim before the
/// flow is closed. Nothing is carried over from one flow to the next.
pub struct EchoServer<F: Fabric> {
    fabric: F,
    config: ServerConfig,
    shutdown_signal: Arc<tokio::sync::broadcast::Sender<()>>,
}

impl<F: Fabric> EchoServer<F> {
    pub fn new(fabric: F, config: ServerConfig) -> Self {
        let (shutdown_signal, _) = tokio::sync::broadcast::channel(1);
        Self {
            fabric,
            config,
            shutdown_signal: Arc::new(shutdown_signal),
        }
    }

    /// Returns a sender that can be used to gracefully shut the server down
    pub fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }

    /// Registers the listening name and serves flows until shutdown
    pub async fn run(&self) -> Result<()> {
        let reg = Registration {
            dif: self.config.dif.clone(),
            ipcp: self.config.ipcp.clone(),
            name: self.config.name.clone(),
        };
        let mut listener = self.fabric.register(&reg).await?;

        info!(name = %self.config.name, dif = ?self.config.dif, "echo server listening");

        let mut shutdown_rx = self.shutdown_signal.subscribe();
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                accepted = self.fabric.accept(&mut listener) => {
                    match accepted {
                        Ok(flow) => {
                            consecutive_failures = 0;
                            match self.handle_flow(flow).await {
                                Ok(()) => {}
                                Err(FlowrrError::Timeout(msg)) => match self.config.timeout_scope {
                                    TimeoutScope::Connection => {
                                        warn!(%msg, "dropping silent flow");
                                    }
                                    TimeoutScope::Server => {
                                        error!(%msg, "silent flow, stopping server");
                                        return Err(FlowrrError::Timeout(msg));
                                    }
                                },
                                Err(err) => {
                                    error!(error = %err, "error serving flow");
                                }
                            }
                        }
                        Err(err) => {
                            consecutive_failures += 1;
                            if consecutive_failures >= self.config.accept_retry.max_consecutive_failures {
                                error!(error = %err, failures = consecutive_failures,
                                    "too many consecutive accept failures, stopping server");
                                return Err(err);
                            }
                            let backoff = self.config.accept_retry.backoff_after(consecutive_failures);
                            warn!(error = %err, failures = consecutive_failures, ?backoff,
                                "accept failed, backing off");
                            tokio::time::sleep(backoff).await;
                        }
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("received shutdown signal, stopping server");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("received internal shutdown signal, stopping server");
                    break;
                }
            }
        }

        info!("echo server stopped");
        Ok(())
    }

    /// Serves one accepted flow: read the request, echo it back, close
    async fn handle_flow(&self, mut flow: F::Flow) -> Result<()> {
        let mut buffer = BytesMut::with_capacity(self.config.buffer_size);

        let n = timeout(self.config.read_timeout, flow.read_buf(&mut buffer))
            .await
            .map_err(|_| {
                FlowrrError::Timeout(format!(
                    "no request within {:?}",
                    self.config.read_timeout
                ))
            })??;

        if n == 0 {
            info!("peer closed flow without sending a request");
            return Ok(());
        }

        let preview = String::from_utf8_lossy(&buffer[..n]);
        info!(bytes = n, request = %preview, "request received");

        let written = flow.write(&buffer[..n]).await?;
        if written < n {
            warn!(written, expected = n, "partial write");
        }
        flow.flush().await?;
        info!(bytes = written, "request echoed");

        Ok(())
    }
}
