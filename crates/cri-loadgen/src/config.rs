//! Load generator configuration

use anyhow::{Context, Result};
use loadgen_lib::runtime::{CriConfig, DEFAULT_PAUSE_IMAGE};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings that rarely change between runs.
///
/// Read from an optional config file and `LOADGEN_*` environment variables;
/// command line flags take precedence over both.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadgenConfig {
    /// CRI runtime endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Namespace for created pods
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Image run by every created container
    #[serde(default = "default_pause_image")]
    pub pause_image: String,

    /// Runtime handler for new sandboxes (empty for the runtime default)
    #[serde(default)]
    pub runtime_handler: String,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Grace period for stopping containers, in seconds
    #[serde(default)]
    pub stop_timeout_secs: i64,
}

fn default_endpoint() -> String {
    "unix:///run/containerd/containerd.sock".to_string()
}

fn default_namespace() -> String {
    "test".to_string()
}

fn default_pause_image() -> String {
    DEFAULT_PAUSE_IMAGE.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LoadgenConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            namespace: default_namespace(),
            pause_image: default_pause_image(),
            runtime_handler: String::new(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            stop_timeout_secs: 0,
        }
    }
}

impl LoadgenConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let config = builder
            .add_source(config::Environment::with_prefix("LOADGEN"))
            .build()
            .context("Failed to load configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Settings for the CRI client
    pub fn cri_config(&self) -> CriConfig {
        CriConfig {
            endpoint: self.endpoint.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            stop_timeout_secs: self.stop_timeout_secs,
            runtime_handler: self.runtime_handler.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = LoadgenConfig::default();
        assert_eq!(config.namespace, "test");
        assert_eq!(config.pause_image, DEFAULT_PAUSE_IMAGE);

        let cri = config.cri_config();
        assert_eq!(cri.endpoint, "unix:///run/containerd/containerd.sock");
        assert_eq!(cri.connect_timeout, Duration::from_secs(10));
        assert_eq!(cri.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loadgen.toml");
        std::fs::write(
            &path,
            r#"
endpoint = "unix:///var/run/crio/crio.sock"
namespace = "perf"
request_timeout_secs = 5
"#,
        )
        .unwrap();

        let config = LoadgenConfig::load(Some(&path)).unwrap();
        assert_eq!(config.endpoint, "unix:///var/run/crio/crio.sock");
        assert_eq!(config.namespace, "perf");
        assert_eq!(config.request_timeout_secs, 5);
        // unspecified fields keep their defaults
        assert_eq!(config.pause_image, DEFAULT_PAUSE_IMAGE);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(LoadgenConfig::load(Some(&path)).is_err());
    }
}
