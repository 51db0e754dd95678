//! CRI gRPC runtime client
//!
//! Talks to containerd, CRI-O or any other CRI v1 implementation over its
//! unix socket (or plain TCP for remote runtimes).

use super::{
    async_trait, ContainerHandle, ContainerOptions, PodHandle, RuntimeClient, RuntimeError,
};
use crate::proto::{
    ContainerConfig, ContainerMetadata, CreateContainerRequest, ImageServiceClient, ImageSpec,
    PodSandboxConfig, PodSandboxMetadata, PullImageRequest, RemoveContainerRequest,
    RemovePodSandboxRequest, RunPodSandboxRequest, RuntimeServiceClient, StartContainerRequest,
    StopContainerRequest, StopPodSandboxRequest, VersionRequest, VersionResponse,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::{debug, info};

/// CRI API version requested in the version probe
const CRI_API_VERSION: &str = "v1";

/// Label attached to every sandbox and container we create
const LOADGEN_LABEL: &str = "io.cri-loadgen.managed";

/// Configuration for the CRI client
#[derive(Debug, Clone)]
pub struct CriConfig {
    /// Runtime endpoint (`unix:///run/containerd/containerd.sock`, a bare
    /// socket path, or `http://host:port`)
    pub endpoint: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Seconds the runtime waits before killing a stopping container
    pub stop_timeout_secs: i64,
    /// Runtime handler for new sandboxes (empty selects the default)
    pub runtime_handler: String,
}

impl Default for CriConfig {
    fn default() -> Self {
        Self {
            endpoint: "unix:///run/containerd/containerd.sock".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            stop_timeout_secs: 0,
            runtime_handler: String::new(),
        }
    }
}

/// Where to open the gRPC connection
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Unix(PathBuf),
    Tcp(String),
}

fn parse_endpoint(endpoint: &str) -> Result<Target, RuntimeError> {
    let invalid = |reason: &str| RuntimeError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    if endpoint.starts_with('/') {
        return Ok(Target::Unix(PathBuf::from(endpoint)));
    }

    let url = url::Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "unix" => {
            if url.path().is_empty() || url.path() == "/" {
                return Err(invalid("missing socket path"));
            }
            Ok(Target::Unix(PathBuf::from(url.path())))
        }
        "http" | "https" => {
            if url.host_str().is_none() {
                return Err(invalid("missing host"));
            }
            Ok(Target::Tcp(endpoint.to_string()))
        }
        other => Err(invalid(&format!("unsupported scheme {}", other))),
    }
}

/// CRI runtime client
pub struct CriRuntime {
    config: CriConfig,
    channel: Channel,
    /// Sandbox configs by pod id, CreateContainer needs them
    sandboxes: DashMap<String, PodSandboxConfig>,
}

impl CriRuntime {
    /// Connect to the runtime described by `config`
    pub async fn connect(config: CriConfig) -> Result<Self, RuntimeError> {
        let target = parse_endpoint(&config.endpoint)?;

        let channel = match target {
            Target::Unix(path) => {
                debug!(path = %path.display(), "Connecting to runtime socket");
                // The URI is ignored by the connector, it only has to parse.
                Endpoint::try_from("http://[::]:50051")?
                    .connect_timeout(config.connect_timeout)
                    .timeout(config.request_timeout)
                    .connect_with_connector(service_fn(move |_: Uri| {
                        UnixStream::connect(path.clone())
                    }))
                    .await?
            }
            Target::Tcp(addr) => {
                debug!(addr = %addr, "Connecting to runtime endpoint");
                Endpoint::from_shared(addr)?
                    .connect_timeout(config.connect_timeout)
                    .timeout(config.request_timeout)
                    .connect()
                    .await?
            }
        };

        info!(endpoint = %config.endpoint, "Connected to container runtime");

        Ok(Self {
            config,
            channel,
            sandboxes: DashMap::new(),
        })
    }

    fn runtime(&self) -> RuntimeServiceClient<Channel> {
        RuntimeServiceClient::new(self.channel.clone())
    }

    /// Query the runtime name and version
    pub async fn version(&self) -> Result<VersionResponse, RuntimeError> {
        let response = self
            .runtime()
            .version(VersionRequest {
                version: CRI_API_VERSION.to_string(),
            })
            .await
            .map_err(rpc_error("Version"))?;
        Ok(response.into_inner())
    }

    /// Pull an image so container creation does not measure the download
    pub async fn pull_image(&self, image: &str) -> Result<String, RuntimeError> {
        info!(image = %image, "Pulling image");
        let response = ImageServiceClient::new(self.channel.clone())
            .pull_image(PullImageRequest {
                image: Some(ImageSpec {
                    image: image.to_string(),
                }),
            })
            .await
            .map_err(rpc_error("PullImage"))?;

        let image_ref = response.into_inner().image_ref;
        debug!(image = %image, image_ref = %image_ref, "Image pulled");
        Ok(image_ref)
    }
}

fn rpc_error(method: &'static str) -> impl FnOnce(tonic::Status) -> RuntimeError {
    move |status| RuntimeError::Rpc { method, status }
}

fn loadgen_labels() -> HashMap<String, String> {
    HashMap::from([(LOADGEN_LABEL.to_string(), "true".to_string())])
}

#[async_trait]
impl RuntimeClient for CriRuntime {
    async fn create_pod(
        &self,
        namespace: &str,
        name: &str,
        uid: &str,
    ) -> Result<PodHandle, RuntimeError> {
        let config = PodSandboxConfig {
            metadata: Some(PodSandboxMetadata {
                name: name.to_string(),
                uid: uid.to_string(),
                namespace: namespace.to_string(),
                attempt: 0,
            }),
            hostname: name.to_string(),
            labels: loadgen_labels(),
        };

        let response = self
            .runtime()
            .run_pod_sandbox(RunPodSandboxRequest {
                config: Some(config.clone()),
                runtime_handler: self.config.runtime_handler.clone(),
            })
            .await
            .map_err(rpc_error("RunPodSandbox"))?;

        let id = response.into_inner().pod_sandbox_id;
        self.sandboxes.insert(id.clone(), config);
        Ok(PodHandle::new(id))
    }

    async fn create_container(
        &self,
        pod: &PodHandle,
        name: &str,
        uid: &str,
        options: &ContainerOptions,
    ) -> Result<ContainerHandle, RuntimeError> {
        let sandbox_config = self
            .sandboxes
            .get(pod.id())
            .map(|c| c.clone())
            .ok_or_else(|| RuntimeError::UnknownPod(pod.id().to_string()))?;

        let mut labels = loadgen_labels();
        labels.insert("io.cri-loadgen.uid".to_string(), uid.to_string());

        let config = ContainerConfig {
            metadata: Some(ContainerMetadata {
                name: name.to_string(),
                attempt: 0,
            }),
            image: Some(ImageSpec {
                image: options.image.clone(),
            }),
            command: options.command.clone().unwrap_or_default(),
            labels,
        };

        let response = self
            .runtime()
            .create_container(CreateContainerRequest {
                pod_sandbox_id: pod.id().to_string(),
                config: Some(config),
                sandbox_config: Some(sandbox_config),
            })
            .await
            .map_err(rpc_error("CreateContainer"))?;

        Ok(ContainerHandle::new(response.into_inner().container_id))
    }

    async fn start_container(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        self.runtime()
            .start_container(StartContainerRequest {
                container_id: container.id().to_string(),
            })
            .await
            .map_err(rpc_error("StartContainer"))?;
        Ok(())
    }

    async fn stop_container(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        self.runtime()
            .stop_container(StopContainerRequest {
                container_id: container.id().to_string(),
                timeout: self.config.stop_timeout_secs,
            })
            .await
            .map_err(rpc_error("StopContainer"))?;
        Ok(())
    }

    async fn remove_container(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        self.runtime()
            .remove_container(RemoveContainerRequest {
                container_id: container.id().to_string(),
            })
            .await
            .map_err(rpc_error("RemoveContainer"))?;
        Ok(())
    }

    async fn stop_pod(&self, pod: &PodHandle) -> Result<(), RuntimeError> {
        self.runtime()
            .stop_pod_sandbox(StopPodSandboxRequest {
                pod_sandbox_id: pod.id().to_string(),
            })
            .await
            .map_err(rpc_error("StopPodSandbox"))?;
        Ok(())
    }

    async fn remove_pod(&self, pod: &PodHandle) -> Result<(), RuntimeError> {
        let result = self
            .runtime()
            .remove_pod_sandbox(RemovePodSandboxRequest {
                pod_sandbox_id: pod.id().to_string(),
            })
            .await
            .map_err(rpc_error("RemovePodSandbox"));
        // The batch forgets the pod either way, so do we.
        self.sandboxes.remove(pod.id());
        result.map(|_| ())
    }
}
