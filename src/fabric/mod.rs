use crate::Result;
use crate::name::{EndpointName, FlowSpec};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};

pub mod local;
pub mod unix;

/// Parameters for allocating a flow to a remote endpoint
///
/// `dif` selects the fabric domain to allocate in; `ipcp`, when set, pins a
/// specific intermediate process and takes precedence over `dif`.
#[derive(Debug, Clone)]
pub struct AllocRequest {
    pub dif: Option<String>,
    pub ipcp: EndpointName,
    pub local: EndpointName,
    pub remote: EndpointName,
    pub spec: FlowSpec,
}

/// Parameters for registering a listening endpoint name
#[derive(Debug, Clone)]
pub struct Registration {
    pub dif: Option<String>,
    pub ipcp: EndpointName,
    pub name: EndpointName,
}

/// Trait for flow fabrics
///
/// This is the contract of the external control library: name registration,
/// flow allocation and flow accept. Everything behind it (name resolution,
/// QoS negotiation, routing) is opaque to this crate. A flow handle is a
/// plain bidirectional byte stream; closing it is dropping it.
pub trait Fabric {
    /// Flow handle type for this fabric
    type Flow: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    /// Listening endpoint type for this fabric
    type Listener: Send;

    /// Allocates a flow to the remote endpoint named in the request
    fn allocate(
        &self,
        req: &AllocRequest,
    ) -> impl Future<Output = Result<Self::Flow>> + Send;

    /// Registers a listening name and returns its listener
    fn register(
        &self,
        reg: &Registration,
    ) -> impl Future<Output = Result<Self::Listener>> + Send;

    /// Accepts one incoming flow on a registered listener (blocking)
    fn accept(
        &self,
        listener: &mut Self::Listener,
    ) -> impl Future<Output = Result<Self::Flow>> + Send;
}
