//! CRI `runtime.v1` protobuf definitions
//!
//! Hand-maintained subset of the Kubernetes Container Runtime Interface,
//! covering only the messages and RPCs the load generator issues. Field
//! numbers follow `k8s.io/cri-api/pkg/apis/runtime/v1/api.proto`; fields we
//! never set are omitted and skipped by prost on decode.

pub mod runtime {
    pub mod v1 {
        use prost::Message;
        use std::collections::HashMap;

        #[derive(Clone, PartialEq, Message)]
        pub struct VersionRequest {
            #[prost(string, tag = "1")]
            pub version: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct VersionResponse {
            #[prost(string, tag = "1")]
            pub version: String,
            #[prost(string, tag = "2")]
            pub runtime_name: String,
            #[prost(string, tag = "3")]
            pub runtime_version: String,
            #[prost(string, tag = "4")]
            pub runtime_api_version: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct PodSandboxMetadata {
            #[prost(string, tag = "1")]
            pub name: String,
            #[prost(string, tag = "2")]
            pub uid: String,
            #[prost(string, tag = "3")]
            pub namespace: String,
            #[prost(uint32, tag = "4")]
            pub attempt: u32,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct PodSandboxConfig {
            #[prost(message, optional, tag = "1")]
            pub metadata: Option<PodSandboxMetadata>,
            #[prost(string, tag = "2")]
            pub hostname: String,
            #[prost(map = "string, string", tag = "6")]
            pub labels: HashMap<String, String>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct RunPodSandboxRequest {
            #[prost(message, optional, tag = "1")]
            pub config: Option<PodSandboxConfig>,
            #[prost(string, tag = "2")]
            pub runtime_handler: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct RunPodSandboxResponse {
            #[prost(string, tag = "1")]
            pub pod_sandbox_id: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct StopPodSandboxRequest {
            #[prost(string, tag = "1")]
            pub pod_sandbox_id: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct StopPodSandboxResponse {}

        #[derive(Clone, PartialEq, Message)]
        pub struct RemovePodSandboxRequest {
            #[prost(string, tag = "1")]
            pub pod_sandbox_id: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct RemovePodSandboxResponse {}

        #[derive(Clone, PartialEq, Message)]
        pub struct ImageSpec {
            #[prost(string, tag = "1")]
            pub image: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct ContainerMetadata {
            #[prost(string, tag = "1")]
            pub name: String,
            #[prost(uint32, tag = "2")]
            pub attempt: u32,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct ContainerConfig {
            #[prost(message, optional, tag = "1")]
            pub metadata: Option<ContainerMetadata>,
            #[prost(message, optional, tag = "2")]
            pub image: Option<ImageSpec>,
            #[prost(string, repeated, tag = "3")]
            pub command: Vec<String>,
            #[prost(map = "string, string", tag = "9")]
            pub labels: HashMap<String, String>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct CreateContainerRequest {
            #[prost(string, tag = "1")]
            pub pod_sandbox_id: String,
            #[prost(message, optional, tag = "2")]
            pub config: Option<ContainerConfig>,
            #[prost(message, optional, tag = "3")]
            pub sandbox_config: Option<PodSandboxConfig>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct CreateContainerResponse {
            #[prost(string, tag = "1")]
            pub container_id: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct StartContainerRequest {
            #[prost(string, tag = "1")]
            pub container_id: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct StartContainerResponse {}

        #[derive(Clone, PartialEq, Message)]
        pub struct StopContainerRequest {
            #[prost(string, tag = "1")]
            pub container_id: String,
            #[prost(int64, tag = "2")]
            pub timeout: i64,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct StopContainerResponse {}

        #[derive(Clone, PartialEq, Message)]
        pub struct RemoveContainerRequest {
            #[prost(string, tag = "1")]
            pub container_id: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct RemoveContainerResponse {}

        #[derive(Clone, PartialEq, Message)]
        pub struct PullImageRequest {
            #[prost(message, optional, tag = "1")]
            pub image: Option<ImageSpec>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct PullImageResponse {
            #[prost(string, tag = "1")]
            pub image_ref: String,
        }

        pub mod runtime_service_client {
            use super::*;
            use prost::Message;
            use tonic::codegen::*;

            #[derive(Debug, Clone)]
            pub struct RuntimeServiceClient<T> {
                inner: tonic::client::Grpc<T>,
            }

            impl RuntimeServiceClient<tonic::transport::Channel> {
                pub fn new(channel: tonic::transport::Channel) -> Self {
                    let inner = tonic::client::Grpc::new(channel);
                    Self { inner }
                }
            }

            impl<T> RuntimeServiceClient<T>
            where
                T: tonic::client::GrpcService<tonic::body::BoxBody>,
                T::Error: Into<StdError>,
                T::ResponseBody: Body<Data = Bytes> + Send + 'static,
                <T::ResponseBody as Body>::Error: Into<StdError> + Send,
            {
                async fn call<Req, Resp>(
                    &mut self,
                    request: impl tonic::IntoRequest<Req>,
                    path: &'static str,
                ) -> Result<tonic::Response<Resp>, tonic::Status>
                where
                    Req: Message + Send + Sync + 'static,
                    Resp: Message + Default + Send + Sync + 'static,
                {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::new(
                            tonic::Code::Unknown,
                            format!("Service was not ready: {}", e.into()),
                        )
                    })?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(path);
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn version(
                    &mut self,
                    request: impl tonic::IntoRequest<VersionRequest>,
                ) -> Result<tonic::Response<VersionResponse>, tonic::Status> {
                    self.call(request, "/runtime.v1.RuntimeService/Version")
                        .await
                }

                pub async fn run_pod_sandbox(
                    &mut self,
                    request: impl tonic::IntoRequest<RunPodSandboxRequest>,
                ) -> Result<tonic::Response<RunPodSandboxResponse>, tonic::Status> {
                    self.call(request, "/runtime.v1.RuntimeService/RunPodSandbox")
                        .await
                }

                pub async fn stop_pod_sandbox(
                    &mut self,
                    request: impl tonic::IntoRequest<StopPodSandboxRequest>,
                ) -> Result<tonic::Response<StopPodSandboxResponse>, tonic::Status> {
                    self.call(request, "/runtime.v1.RuntimeService/StopPodSandbox")
                        .await
                }

                pub async fn remove_pod_sandbox(
                    &mut self,
                    request: impl tonic::IntoRequest<RemovePodSandboxRequest>,
                ) -> Result<tonic::Response<RemovePodSandboxResponse>, tonic::Status> {
                    self.call(request, "/runtime.v1.RuntimeService/RemovePodSandbox")
                        .await
                }

                pub async fn create_container(
                    &mut self,
                    request: impl tonic::IntoRequest<CreateContainerRequest>,
                ) -> Result<tonic::Response<CreateContainerResponse>, tonic::Status> {
                    self.call(request, "/runtime.v1.RuntimeService/CreateContainer")
                        .await
                }

                pub async fn start_container(
                    &mut self,
                    request: impl tonic::IntoRequest<StartContainerRequest>,
                ) -> Result<tonic::Response<StartContainerResponse>, tonic::Status> {
                    self.call(request, "/runtime.v1.RuntimeService/StartContainer")
                        .await
                }

                pub async fn stop_container(
                    &mut self,
                    request: impl tonic::IntoRequest<StopContainerRequest>,
                ) -> Result<tonic::Response<StopContainerResponse>, tonic::Status> {
                    self.call(request, "/runtime.v1.RuntimeService/StopContainer")
                        .await
                }

                pub async fn remove_container(
                    &mut self,
                    request: impl tonic::IntoRequest<RemoveContainerRequest>,
                ) -> Result<tonic::Response<RemoveContainerResponse>, tonic::Status> {
                    self.call(request, "/runtime.v1.RuntimeService/RemoveContainer")
                        .await
                }
            }
        }

        pub mod image_service_client {
            use super::*;
            use tonic::codegen::*;

            #[derive(Debug, Clone)]
            pub struct ImageServiceClient<T> {
                inner: tonic::client::Grpc<T>,
            }

            impl ImageServiceClient<tonic::transport::Channel> {
                pub fn new(channel: tonic::transport::Channel) -> Self {
                    let inner = tonic::client::Grpc::new(channel);
                    Self { inner }
                }
            }

            impl<T> ImageServiceClient<T>
            where
                T: tonic::client::GrpcService<tonic::body::BoxBody>,
                T::Error: Into<StdError>,
                T::ResponseBody: Body<Data = Bytes> + Send + 'static,
                <T::ResponseBody as Body>::Error: Into<StdError> + Send,
            {
                pub async fn pull_image(
                    &mut self,
                    request: impl tonic::IntoRequest<PullImageRequest>,
                ) -> Result<tonic::Response<PullImageResponse>, tonic::Status> {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::new(
                            tonic::Code::Unknown,
                            format!("Service was not ready: {}", e.into()),
                        )
                    })?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/runtime.v1.ImageService/PullImage",
                    );
                    self.inner.unary(request.into_request(), path, codec).await
                }
            }
        }
    }
}

pub use runtime::v1::image_service_client::ImageServiceClient;
pub use runtime::v1::runtime_service_client::RuntimeServiceClient;
pub use runtime::v1::*;

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_run_pod_sandbox_request_encoding() {
        let request = RunPodSandboxRequest {
            config: Some(PodSandboxConfig {
                metadata: Some(PodSandboxMetadata {
                    name: "batch0-0".to_string(),
                    uid: "uid-0".to_string(),
                    namespace: "test".to_string(),
                    attempt: 0,
                }),
                ..Default::default()
            }),
            runtime_handler: String::new(),
        };

        let bytes = request.encode_to_vec();
        let decoded = RunPodSandboxRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, request);

        // field 1 (config), wire type 2 (length delimited)
        assert_eq!(bytes[0], 0x0a);
    }

    #[test]
    fn test_stop_container_request_fields() {
        let bytes = StopContainerRequest {
            container_id: "abc".to_string(),
            timeout: 5,
        }
        .encode_to_vec();

        // container_id: tag 1, len 3, "abc"; timeout: tag 2 varint 5
        assert_eq!(bytes, vec![0x0a, 0x03, b'a', b'b', b'c', 0x10, 0x05]);
    }
}
