use thiserror::Error;

/// Error types for the flowrr library
#[derive(Error, Debug)]
pub enum FlowrrError {
    /// The fabric control facility could not be reached (fatal at startup)
    #[error("fabric unavailable: {0}")]
    Startup(std::io::Error),

    /// A flow to the requested remote endpoint could not be established
    #[error("flow allocation failed: {0}")]
    Allocation(String),

    /// The listening name could not be registered with the fabric
    #[error("registration failed: {0}")]
    Registration(String),

    /// No data became available within the readability deadline
    #[error("timed out: {0}")]
    Timeout(String),

    /// I/O errors on an established flow
    #[error("flow I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// UTF-8 decoding errors when rendering a response as text
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type for the flowrr library
pub type Result<T> = std::result::Result<T, FlowrrError>;

pub mod cli;
pub mod client;
pub mod fabric;
pub mod name;
pub mod server;

// Re-export main types for convenience
pub use client::{ClientConfig, DEFAULT_PROBE};
pub use fabric::local::LocalFabric;
pub use fabric::unix::UnixFabric;
pub use fabric::{AllocRequest, Fabric, Registration};
pub use name::{EndpointName, FlowSpec};
pub use server::{EchoServer, ServerConfig, TimeoutScope};
