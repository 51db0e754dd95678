//! Container runtime clients
//!
//! Batches only talk to the runtime through [`RuntimeClient`]. Two
//! implementations are provided: a CRI gRPC client for real runtimes and an
//! in-process simulation for dry runs and tests.

pub mod cri;
pub mod simulated;

pub use cri::{CriConfig, CriRuntime};
pub use simulated::{SimulatedConfig, SimulatedRuntime};

pub use async_trait::async_trait;

use std::fmt;
use thiserror::Error;

/// Image used for load-test containers when none is configured
pub const DEFAULT_PAUSE_IMAGE: &str = "registry.k8s.io/pause:3.9";

/// Opaque id of a pod sandbox created by the runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodHandle(String);

/// Opaque id of a container created by the runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(String);

impl PodHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options applied to every container a batch creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOptions {
    /// Image reference
    pub image: String,
    /// Command override; `None` runs the image entrypoint unchanged
    pub command: Option<Vec<String>>,
}

impl ContainerOptions {
    /// Run `image` with no command override
    pub fn without_command(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            command: None,
        }
    }
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self::without_command(DEFAULT_PAUSE_IMAGE)
    }
}

/// Errors returned by runtime clients
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid runtime endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to connect to runtime: {0}")]
    Connect(#[from] tonic::transport::Error),

    #[error("{method} failed: {status}")]
    Rpc {
        method: &'static str,
        status: tonic::Status,
    },

    #[error("unknown pod sandbox {0}")]
    UnknownPod(String),

    #[error("unknown container {0}")]
    UnknownContainer(String),

    #[error("injected failure in {0}")]
    Injected(&'static str),
}

/// Pod and container lifecycle operations against a container runtime
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Create and start a pod sandbox
    async fn create_pod(
        &self,
        namespace: &str,
        name: &str,
        uid: &str,
    ) -> Result<PodHandle, RuntimeError>;

    /// Create a container inside a pod sandbox
    async fn create_container(
        &self,
        pod: &PodHandle,
        name: &str,
        uid: &str,
        options: &ContainerOptions,
    ) -> Result<ContainerHandle, RuntimeError>;

    async fn start_container(&self, container: &ContainerHandle) -> Result<(), RuntimeError>;

    async fn stop_container(&self, container: &ContainerHandle) -> Result<(), RuntimeError>;

    async fn remove_container(&self, container: &ContainerHandle) -> Result<(), RuntimeError>;

    async fn stop_pod(&self, pod: &PodHandle) -> Result<(), RuntimeError>;

    async fn remove_pod(&self, pod: &PodHandle) -> Result<(), RuntimeError>;
}
