//! In-process simulated runtime
//!
//! Keeps track of sandboxes and containers in memory and answers every call
//! after an artificial delay. Useful for exercising the load generator
//! without a container runtime on the host.

use super::{
    async_trait, ContainerHandle, ContainerOptions, PodHandle, RuntimeClient, RuntimeError,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Behaviour of the simulated runtime
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Base latency of every call
    pub latency: Duration,
    /// Maximum random latency added on top of the base
    pub jitter: Duration,
    /// Fraction of calls that fail, between 0.0 and 1.0
    pub failure_rate: f64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(1),
            jitter: Duration::from_millis(1),
            failure_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PodState {
    Ready,
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerState {
    Created,
    Running,
    Exited,
}

#[derive(Debug, Clone)]
struct SimContainer {
    pod_id: String,
    state: ContainerState,
}

/// Runtime that lives entirely in memory
pub struct SimulatedRuntime {
    config: SimulatedConfig,
    pods: DashMap<String, PodState>,
    containers: DashMap<String, SimContainer>,
    next_id: AtomicU64,
}

impl SimulatedRuntime {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            pods: DashMap::new(),
            containers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of sandboxes that have not been removed
    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    /// Number of containers that have not been removed
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    fn new_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{:016x}{:016x}", n, fastrand::u64(..))
    }

    /// Sleep for the configured latency, then maybe fail
    async fn simulate(&self, method: &'static str) -> Result<(), RuntimeError> {
        let jitter_ns = self.config.jitter.as_nanos() as u64;
        let jitter = if jitter_ns == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(fastrand::u64(..jitter_ns))
        };
        tokio::time::sleep(self.config.latency + jitter).await;

        if self.config.failure_rate > 0.0 && fastrand::f64() < self.config.failure_rate {
            return Err(RuntimeError::Injected(method));
        }
        Ok(())
    }
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

#[async_trait]
impl RuntimeClient for SimulatedRuntime {
    async fn create_pod(
        &self,
        _namespace: &str,
        _name: &str,
        _uid: &str,
    ) -> Result<PodHandle, RuntimeError> {
        self.simulate("RunPodSandbox").await?;
        let id = self.new_id();
        self.pods.insert(id.clone(), PodState::Ready);
        Ok(PodHandle::new(id))
    }

    async fn create_container(
        &self,
        pod: &PodHandle,
        _name: &str,
        _uid: &str,
        _options: &ContainerOptions,
    ) -> Result<ContainerHandle, RuntimeError> {
        match self.pods.get(pod.id()).map(|s| *s) {
            Some(PodState::Ready) => {}
            _ => return Err(RuntimeError::UnknownPod(pod.id().to_string())),
        }
        self.simulate("CreateContainer").await?;

        let id = self.new_id();
        self.containers.insert(
            id.clone(),
            SimContainer {
                pod_id: pod.id().to_string(),
                state: ContainerState::Created,
            },
        );
        Ok(ContainerHandle::new(id))
    }

    async fn start_container(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        if !self.containers.contains_key(container.id()) {
            return Err(RuntimeError::UnknownContainer(container.id().to_string()));
        }
        self.simulate("StartContainer").await?;
        if let Some(mut c) = self.containers.get_mut(container.id()) {
            c.state = ContainerState::Running;
        }
        Ok(())
    }

    async fn stop_container(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        if !self.containers.contains_key(container.id()) {
            return Err(RuntimeError::UnknownContainer(container.id().to_string()));
        }
        self.simulate("StopContainer").await?;
        if let Some(mut c) = self.containers.get_mut(container.id()) {
            if c.state == ContainerState::Running {
                c.state = ContainerState::Exited;
            }
        }
        Ok(())
    }

    async fn remove_container(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        if !self.containers.contains_key(container.id()) {
            return Err(RuntimeError::UnknownContainer(container.id().to_string()));
        }
        self.simulate("RemoveContainer").await?;
        self.containers.remove(container.id());
        Ok(())
    }

    async fn stop_pod(&self, pod: &PodHandle) -> Result<(), RuntimeError> {
        if !self.pods.contains_key(pod.id()) {
            return Err(RuntimeError::UnknownPod(pod.id().to_string()));
        }
        self.simulate("StopPodSandbox").await?;
        for mut c in self.containers.iter_mut() {
            if c.pod_id == pod.id() {
                c.state = ContainerState::Exited;
            }
        }
        if let Some(mut state) = self.pods.get_mut(pod.id()) {
            *state = PodState::NotReady;
        }
        Ok(())
    }

    async fn remove_pod(&self, pod: &PodHandle) -> Result<(), RuntimeError> {
        if !self.pods.contains_key(pod.id()) {
            return Err(RuntimeError::UnknownPod(pod.id().to_string()));
        }
        self.simulate("RemovePodSandbox").await?;
        self.containers.retain(|_, c| c.pod_id != pod.id());
        self.pods.remove(pod.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> SimulatedRuntime {
        SimulatedRuntime::new(SimulatedConfig {
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
            failure_rate: 0.0,
        })
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let rt = instant();
        let options = ContainerOptions::default();

        let pod = rt.create_pod("test", "p", "uid-0").await.unwrap();
        let ctr = rt.create_container(&pod, "c", "uid-1", &options).await.unwrap();
        assert_eq!(rt.pod_count(), 1);
        assert_eq!(rt.container_count(), 1);

        rt.start_container(&ctr).await.unwrap();
        rt.stop_container(&ctr).await.unwrap();
        rt.remove_container(&ctr).await.unwrap();
        rt.stop_pod(&pod).await.unwrap();
        rt.remove_pod(&pod).await.unwrap();

        assert_eq!(rt.pod_count(), 0);
        assert_eq!(rt.container_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_handles_are_rejected() {
        let rt = instant();
        let pod = PodHandle::new("nope");
        let ctr = ContainerHandle::new("nope");

        assert!(matches!(
            rt.create_container(&pod, "c", "u", &ContainerOptions::default()).await,
            Err(RuntimeError::UnknownPod(_))
        ));
        assert!(matches!(
            rt.start_container(&ctr).await,
            Err(RuntimeError::UnknownContainer(_))
        ));
        assert!(matches!(rt.remove_pod(&pod).await, Err(RuntimeError::UnknownPod(_))));
    }

    #[tokio::test]
    async fn test_stopped_pod_rejects_new_containers() {
        let rt = instant();
        let pod = rt.create_pod("test", "p", "uid-0").await.unwrap();
        rt.stop_pod(&pod).await.unwrap();

        let result = rt
            .create_container(&pod, "c", "uid-1", &ContainerOptions::default())
            .await;
        assert!(matches!(result, Err(RuntimeError::UnknownPod(_))));
    }

    #[tokio::test]
    async fn test_removing_pod_removes_its_containers() {
        let rt = instant();
        let options = ContainerOptions::default();
        let pod = rt.create_pod("test", "p", "uid-0").await.unwrap();
        rt.create_container(&pod, "a", "uid-1", &options).await.unwrap();
        rt.create_container(&pod, "b", "uid-2", &options).await.unwrap();

        rt.remove_pod(&pod).await.unwrap();
        assert_eq!(rt.container_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_rate_one_always_fails() {
        let rt = SimulatedRuntime::new(SimulatedConfig {
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
            failure_rate: 1.0,
        });

        let err = rt.create_pod("test", "p", "uid-0").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Injected("RunPodSandbox")));
        assert_eq!(rt.pod_count(), 0);
    }
}
