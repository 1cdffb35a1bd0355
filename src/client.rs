use crate::fabric::{AllocRequest, Fabric};
use crate::name::{EndpointName, FlowSpec};
use crate::{FlowrrError, Result};
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{info, warn};

/// Payload sent by the one-shot probe client
pub const DEFAULT_PROBE: &str = "Hello guys, this is a test message!";

/// Largest message read from a flow in one transaction
pub const MAX_SDU: usize = 65535;

/// How long to wait for a flow to produce data before giving up
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(3000);

/// Configuration for the probe client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// DIF to ask for flow allocation
    pub dif: Option<String>,
    /// Intermediate process to pin, overriding `dif` when set
    pub ipcp: EndpointName,
    /// Name this client allocates the flow under
    pub local: EndpointName,
    /// Name of the echo server to reach
    pub remote: EndpointName,
    /// Requested QoS class
    pub spec: FlowSpec,
    /// Message to send
    pub payload: String,
    /// Deadline for the reply to become readable
    pub read_timeout: Duration,
    /// Upper bound on the reply size read back
    pub max_response: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dif: None,
            ipcp: EndpointName::unset(),
            local: EndpointName::new(Some("rlite_rr-data"), Some("client")),
            remote: EndpointName::new(Some("rlite_rr-data"), Some("server")),
            spec: FlowSpec::default(),
            payload: DEFAULT_PROBE.to_string(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_response: MAX_SDU,
        }
    }
}

/// Runs one request/response transaction and returns the reply bytes
///
/// Allocates a flow to the configured server, sends the payload, waits up to
/// the read timeout for a reply and reads it once. The write is single-shot:
/// a short write is logged and not re-attempted, matching the best-effort
/// nature of the probe. The flow closes when it goes out of scope.
pub async fn run<F: Fabric>(fabric: &F, config: &ClientConfig) -> Result<Bytes> {
    let req = AllocRequest {
        dif: config.dif.clone(),
        ipcp: config.ipcp.clone(),
        local: config.local.clone(),
        remote: config.remote.clone(),
        spec: config.spec.clone(),
    };

    let mut flow = fabric.allocate(&req).await?;
    info!(remote = %config.remote, spec = %config.spec, "flow allocated");

    let payload = config.payload.as_bytes();
    let written = flow.write(payload).await?;
    if written < payload.len() {
        warn!(written, expected = payload.len(), "partial write");
    }
    flow.flush().await?;

    let mut response = BytesMut::with_capacity(config.max_response);
    let n = timeout(config.read_timeout, flow.read_buf(&mut response))
        .await
        .map_err(|_| {
            FlowrrError::Timeout(format!(
                "no response from {} within {:?}",
                config.remote, config.read_timeout
            ))
        })??;

    info!(bytes = n, "response received");
    Ok(response.freeze())
}

/// Like [`run`], but decodes the reply as UTF-8 text
pub async fn run_text<F: Fabric>(fabric: &F, config: &ClientConfig) -> Result<String> {
    let response = run(fabric, config).await?;
    String::from_utf8(response.to_vec()).map_err(FlowrrError::Utf8)
}
