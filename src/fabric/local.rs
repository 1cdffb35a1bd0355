// In-process fabric backend
//
// Keeps a shared registry of listening names and hands each allocated flow
// one side of an in-memory duplex pipe. Useful for tests and single-process
// demos where client and server share a fabric handle; there are no
// intermediate processes, so the `ipcp` field of requests is ignored.

use crate::fabric::{AllocRequest, Fabric, Registration};
use crate::{FlowrrError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{duplex, DuplexStream};
use tokio::sync::mpsc;
use tracing::debug;

// Matches the largest message the tool reads in one go.
const FLOW_PIPE_CAPACITY: usize = 65536;

struct RegisteredName {
    dif: Option<String>,
    pending: mpsc::UnboundedSender<DuplexStream>,
}

/// In-process flow fabric
///
/// Cloning yields another handle to the same registry, so one fabric can be
/// shared between a server task and any number of clients.
#[derive(Clone, Default)]
pub struct LocalFabric {
    registry: Arc<Mutex<HashMap<String, RegisteredName>>>,
}

/// Listening endpoint on a [`LocalFabric`]
#[derive(Debug)]
pub struct LocalListener {
    pending: mpsc::UnboundedReceiver<DuplexStream>,
}

impl LocalFabric {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Fabric for LocalFabric {
    type Flow = DuplexStream;
    type Listener = LocalListener;

    async fn allocate(&self, req: &AllocRequest) -> Result<Self::Flow> {
        if !req.remote.is_set() {
            return Err(FlowrrError::Config(
                "remote endpoint name must be set before allocation".into(),
            ));
        }

        let key = req.remote.to_string();
        let registry = self.registry.lock().expect("fabric registry poisoned");
        let entry = registry
            .get(&key)
            .ok_or_else(|| FlowrrError::Allocation(format!("no endpoint registered as {key}")))?;

        if let (Some(want), Some(have)) = (&req.dif, &entry.dif) {
            if want != have {
                return Err(FlowrrError::Allocation(format!(
                    "{key} is registered in DIF {have}, not {want}"
                )));
            }
        }

        let (near, far) = duplex(FLOW_PIPE_CAPACITY);
        entry
            .pending
            .send(far)
            .map_err(|_| FlowrrError::Allocation(format!("{key} is no longer accepting flows")))?;

        debug!(remote = %req.remote, local = %req.local, spec = %req.spec, "flow allocated");
        Ok(near)
    }

    async fn register(&self, reg: &Registration) -> Result<Self::Listener> {
        if !reg.name.is_set() {
            return Err(FlowrrError::Config(
                "listening endpoint name must be set before registration".into(),
            ));
        }

        let key = reg.name.to_string();
        let mut registry = self.registry.lock().expect("fabric registry poisoned");
        if let Some(existing) = registry.get(&key) {
            if !existing.pending.is_closed() {
                return Err(FlowrrError::Registration(format!(
                    "{key} is already registered"
                )));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        registry.insert(
            key.clone(),
            RegisteredName {
                dif: reg.dif.clone(),
                pending: tx,
            },
        );

        debug!(name = %key, dif = ?reg.dif, "name registered");
        Ok(LocalListener { pending: rx })
    }

    async fn accept(&self, listener: &mut Self::Listener) -> Result<Self::Flow> {
        listener
            .pending
            .recv()
            .await
            .ok_or_else(|| FlowrrError::Config("listener detached from its fabric".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::{EndpointName, FlowSpec};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn request(remote: &EndpointName, dif: Option<&str>) -> AllocRequest {
        AllocRequest {
            dif: dif.map(str::to_string),
            ipcp: EndpointName::unset(),
            local: EndpointName::new(Some("test"), Some("client")),
            remote: remote.clone(),
            spec: FlowSpec::default(),
        }
    }

    fn registration(name: &EndpointName, dif: Option<&str>) -> Registration {
        Registration {
            dif: dif.map(str::to_string),
            ipcp: EndpointName::unset(),
            name: name.clone(),
        }
    }

    #[tokio::test]
    async fn allocate_pairs_with_accept() {
        let fabric = LocalFabric::new();
        let name = EndpointName::new(Some("svc"), Some("1"));

        let mut listener = fabric.register(&registration(&name, None)).await.unwrap();
        let mut near = fabric.allocate(&request(&name, None)).await.unwrap();
        let mut far = fabric.accept(&mut listener).await.unwrap();

        near.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn allocate_unregistered_name_fails() {
        let fabric = LocalFabric::new();
        let name = EndpointName::new(Some("nobody"), Some("0"));
        let err = fabric.allocate(&request(&name, None)).await.unwrap_err();
        assert!(matches!(err, FlowrrError::Allocation(_)));
    }

    #[tokio::test]
    async fn dif_mismatch_fails_allocation() {
        let fabric = LocalFabric::new();
        let name = EndpointName::new(Some("svc"), Some("1"));
        let _listener = fabric
            .register(&registration(&name, Some("n.DIF")))
            .await
            .unwrap();

        let err = fabric
            .allocate(&request(&name, Some("m.DIF")))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowrrError::Allocation(_)));
    }

    #[tokio::test]
    async fn duplicate_registration_fails_while_listener_lives() {
        let fabric = LocalFabric::new();
        let name = EndpointName::new(Some("svc"), Some("1"));

        let listener = fabric.register(&registration(&name, None)).await.unwrap();
        let err = fabric
            .register(&registration(&name, None))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowrrError::Registration(_)));

        // Once the old listener is gone the name can be claimed again.
        drop(listener);
        fabric.register(&registration(&name, None)).await.unwrap();
    }
}
