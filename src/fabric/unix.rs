// Unix domain socket fabric backend
//
// Maps endpoint names to socket paths under a root directory so that client
// and server processes on the same machine can reach each other without any
// broker. The layout is `<root>/<domain>/<apn>:<api>.sock`, where the domain
// component is the pinned intermediate process name when one is given,
// otherwise the DIF name, otherwise "default".
//
// Registration does not unlink a pre-existing socket path: bind() failing on
// a path in use is the correct signal that the name is taken. A listener
// removes its own socket file when dropped.

use crate::fabric::{AllocRequest, Fabric, Registration};
use crate::name::EndpointName;
use crate::{FlowrrError, Result};
use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

/// Flow fabric backed by Unix domain sockets
#[derive(Debug, Clone)]
pub struct UnixFabric {
    root: PathBuf,
}

/// Listening endpoint on a [`UnixFabric`]
///
/// Unlinks its socket path on drop so a restarted server can bind again.
#[derive(Debug)]
pub struct UnixFlowListener {
    inner: UnixListener,
    path: PathBuf,
}

impl Drop for UnixFlowListener {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to remove socket file");
        }
    }
}

fn path_component(s: &str) -> String {
    // Names may contain arbitrary characters; keep them out of path syntax.
    s.replace(['/', '\0'], "_")
}

impl UnixFabric {
    pub const DEFAULT_ROOT: &'static str = "/tmp/flowrr";

    /// Opens the fabric, creating the root directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(FlowrrError::Startup)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn socket_path(
        &self,
        dif: Option<&str>,
        ipcp: &EndpointName,
        name: &EndpointName,
    ) -> Result<PathBuf> {
        let apn = name.apn().ok_or_else(|| {
            FlowrrError::Config("endpoint name must be set before it can be resolved".into())
        })?;

        let domain = if ipcp.is_set() {
            ipcp.to_string()
        } else {
            dif.unwrap_or("default").to_string()
        };

        let file = match name.api() {
            Some(api) => format!("{}:{}.sock", path_component(apn), path_component(api)),
            None => format!("{}.sock", path_component(apn)),
        };

        Ok(self.root.join(path_component(&domain)).join(file))
    }
}

impl Fabric for UnixFabric {
    type Flow = UnixStream;
    type Listener = UnixFlowListener;

    async fn allocate(&self, req: &AllocRequest) -> Result<Self::Flow> {
        let path = self.socket_path(req.dif.as_deref(), &req.ipcp, &req.remote)?;
        let stream = UnixStream::connect(&path).await.map_err(|err| {
            FlowrrError::Allocation(format!(
                "cannot reach {} at {}: {err}",
                req.remote,
                path.display()
            ))
        })?;

        debug!(remote = %req.remote, path = %path.display(), spec = %req.spec, "flow allocated");
        Ok(stream)
    }

    async fn register(&self, reg: &Registration) -> Result<Self::Listener> {
        let path = self.socket_path(reg.dif.as_deref(), &reg.ipcp, &reg.name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                FlowrrError::Registration(format!("cannot create {}: {err}", parent.display()))
            })?;
        }

        let inner = UnixListener::bind(&path).map_err(|err| {
            FlowrrError::Registration(format!(
                "cannot bind {} at {}: {err}",
                reg.name,
                path.display()
            ))
        })?;

        debug!(name = %reg.name, path = %path.display(), "name registered");
        Ok(UnixFlowListener { inner, path })
    }

    async fn accept(&self, listener: &mut Self::Listener) -> Result<Self::Flow> {
        let (stream, _addr) = listener.inner.accept().await?;
        Ok(stream)
    }
}
