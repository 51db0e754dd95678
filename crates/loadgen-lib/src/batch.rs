//! Batch execution
//!
//! A [`Batch`] repeatedly walks a fixed pod/container grid through its whole
//! lifecycle. Every round runs seven phases in order:
//!
//! 1. create pods (retried up to [`MAX_POD_CREATE_ATTEMPTS`] times)
//! 2. create containers
//! 3. start containers
//! 4. stop containers
//! 5. remove containers
//! 6. stop pods
//! 7. remove pods
//!
//! Each slot of the grid is an `Option` handle. A phase skips empty slots, so
//! an early failure only means fewer operations later in the round. Failures
//! are recorded and never abort the round or the batch.

use crate::idgen::IdGenerator;
use crate::latency::{as_latency, LatencyCollection, OperationKind};
use crate::observability::LoadgenMetrics;
use crate::runtime::{ContainerHandle, ContainerOptions, PodHandle, RuntimeClient, RuntimeError};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Total attempts at creating a pod before the slot is left empty
pub const MAX_POD_CREATE_ATTEMPTS: u32 = 3;

/// Shape of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Namespace for created pods (default: `test`)
    pub namespace: String,
    /// Pods per round (default: 1)
    pub pods: usize,
    /// Containers per pod (default: 1)
    pub containers: usize,
    /// Number of rounds (default: 10)
    pub rounds: usize,
    /// Log every operation and error as it happens
    pub verbose: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            namespace: "test".to_string(),
            pods: 1,
            containers: 1,
            rounds: 10,
            verbose: false,
        }
    }
}

impl BatchConfig {
    /// Replace empty or zero settings with their defaults
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            namespace: if self.namespace.is_empty() {
                defaults.namespace
            } else {
                self.namespace
            },
            pods: if self.pods == 0 { defaults.pods } else { self.pods },
            containers: if self.containers == 0 {
                defaults.containers
            } else {
                self.containers
            },
            rounds: if self.rounds == 0 {
                defaults.rounds
            } else {
                self.rounds
            },
            verbose: self.verbose,
        }
    }
}

/// Position in a batch's pod/container grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Pod(usize),
    Container(usize, usize),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Pod(i) => write!(f, "#{}", i),
            Slot::Container(i, j) => write!(f, "#{}:{}", i, j),
        }
    }
}

/// A failed runtime operation, with the round and slot it happened in
#[derive(Debug, Error)]
#[error("round #{round}: failed to {operation} {slot}{}: {source}", attempts_note(.attempts))]
pub struct BatchError {
    /// Round number, starting at 1
    pub round: usize,
    pub operation: OperationKind,
    pub slot: Slot,
    /// Attempts made before giving up
    pub attempts: u32,
    pub source: RuntimeError,
}

fn attempts_note(attempts: &u32) -> String {
    if *attempts > 1 {
        format!(" after {} attempts", attempts)
    } else {
        String::new()
    }
}

/// Failed attempts per retried operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RetryCount {
    pub run_pod_sandbox: u64,
}

impl RetryCount {
    pub fn add(&mut self, other: &RetryCount) {
        self.run_pod_sandbox += other.run_pod_sandbox;
    }

    pub fn total(&self) -> u64 {
        self.run_pod_sandbox
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerPhase {
    Start,
    Stop,
    Remove,
}

impl ContainerPhase {
    fn kind(self) -> OperationKind {
        match self {
            ContainerPhase::Start => OperationKind::StartContainer,
            ContainerPhase::Stop => OperationKind::StopContainer,
            ContainerPhase::Remove => OperationKind::RemoveContainer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PodPhase {
    Stop,
    Remove,
}

impl PodPhase {
    fn kind(self) -> OperationKind {
        match self {
            PodPhase::Stop => OperationKind::StopPod,
            PodPhase::Remove => OperationKind::RemovePod,
        }
    }
}

async fn timed<T, F>(operation: F) -> (Result<T, RuntimeError>, Duration)
where
    F: Future<Output = Result<T, RuntimeError>>,
{
    let start = Instant::now();
    let result = operation.await;
    (result, start.elapsed())
}

/// One independently scheduled sequence of lifecycle rounds
pub struct Batch {
    name: String,
    config: BatchConfig,
    ids: Arc<IdGenerator>,
    options: ContainerOptions,
    metrics: LoadgenMetrics,

    pods: Vec<Option<PodHandle>>,
    containers: Vec<Vec<Option<ContainerHandle>>>,

    latency: LatencyCollection,
    retries: RetryCount,
    errors: Vec<BatchError>,
}

impl Batch {
    pub fn new(name: impl Into<String>, config: BatchConfig, ids: Arc<IdGenerator>) -> Self {
        Self {
            name: name.into(),
            config,
            ids,
            options: ContainerOptions::default(),
            metrics: LoadgenMetrics::new(),
            pods: Vec::new(),
            containers: Vec::new(),
            latency: LatencyCollection::new(),
            retries: RetryCount::default(),
            errors: Vec::new(),
        }
    }

    /// Set the options used for every container the batch creates
    pub fn with_container_options(mut self, options: ContainerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Latency samples recorded so far
    pub fn latency(&self) -> &LatencyCollection {
        &self.latency
    }

    pub fn retries(&self) -> RetryCount {
        self.retries
    }

    /// Errors in the order they occurred
    pub fn errors(&self) -> &[BatchError] {
        &self.errors
    }

    /// Consume the batch, keeping only its results
    pub fn into_results(self) -> (String, LatencyCollection, RetryCount, Vec<BatchError>) {
        (self.name, self.latency, self.retries, self.errors)
    }

    /// Prepare the slot grid and spawn the rounds onto `tasks`.
    ///
    /// Returns as soon as the task is spawned. The task yields the finished
    /// batch once every round has run; operation errors are kept in the batch.
    pub fn run(mut self, client: Arc<dyn RuntimeClient>, tasks: &mut JoinSet<Batch>) {
        self.config = self.config.normalized();
        self.pods = vec![None; self.config.pods];
        self.containers = vec![vec![None; self.config.containers]; self.config.pods];
        self.errors.clear();

        debug!(
            batch = %self.name,
            namespace = %self.config.namespace,
            pods = self.config.pods,
            containers = self.config.containers,
            rounds = self.config.rounds,
            "Scheduling batch"
        );

        tasks.spawn(async move {
            self.execute(client.as_ref()).await;
            self
        });
    }

    async fn execute(&mut self, client: &dyn RuntimeClient) {
        self.metrics.batch_started();

        for round in 1..=self.config.rounds {
            info!(
                batch = %self.name,
                round,
                rounds = self.config.rounds,
                "Starting round"
            );

            self.create_pods(client, round).await;
            self.create_containers(client, round).await;
            self.container_phase(client, round, ContainerPhase::Start)
                .await;
            self.container_phase(client, round, ContainerPhase::Stop)
                .await;
            self.container_phase(client, round, ContainerPhase::Remove)
                .await;
            self.pod_phase(client, round, PodPhase::Stop).await;
            self.pod_phase(client, round, PodPhase::Remove).await;
        }

        self.metrics.batch_finished();
        debug!(
            batch = %self.name,
            errors = self.errors.len(),
            retries = self.retries.total(),
            "Batch complete"
        );
    }

    async fn create_pods(&mut self, client: &dyn RuntimeClient, round: usize) {
        for i in 0..self.pods.len() {
            let name = format!("{}-{}", self.name, i);
            let uid = self.ids.generate_uid();

            let mut pod = None;
            let mut last_error = None;
            for attempt in 1..=MAX_POD_CREATE_ATTEMPTS {
                let (result, elapsed) =
                    timed(client.create_pod(&self.config.namespace, &name, &uid)).await;
                match result {
                    Ok(handle) => {
                        self.succeeded(OperationKind::CreatePod, Slot::Pod(i), handle.id(), elapsed);
                        pod = Some(handle);
                        break;
                    }
                    Err(e) => {
                        self.retries.run_pod_sandbox += 1;
                        self.metrics.inc_pod_create_retries();
                        debug!(batch = %self.name, pod = i, attempt, error = %e, "Pod creation attempt failed");
                        last_error = Some(e);
                    }
                }
            }

            if pod.is_none() {
                if let Some(source) = last_error {
                    self.failed(BatchError {
                        round,
                        operation: OperationKind::CreatePod,
                        slot: Slot::Pod(i),
                        attempts: MAX_POD_CREATE_ATTEMPTS,
                        source,
                    });
                }
            }
            self.pods[i] = pod;
        }
    }

    async fn create_containers(&mut self, client: &dyn RuntimeClient, round: usize) {
        for i in 0..self.pods.len() {
            let Some(pod) = self.pods[i].clone() else {
                continue;
            };

            for j in 0..self.containers[i].len() {
                let name = format!("ctr-{}", j);
                let uid = self.ids.generate_uid();
                let slot = Slot::Container(i, j);

                let (result, elapsed) =
                    timed(client.create_container(&pod, &name, &uid, &self.options)).await;
                self.containers[i][j] = match result {
                    Ok(handle) => {
                        self.succeeded(OperationKind::CreateContainer, slot, handle.id(), elapsed);
                        Some(handle)
                    }
                    Err(source) => {
                        self.failed(BatchError {
                            round,
                            operation: OperationKind::CreateContainer,
                            slot,
                            attempts: 1,
                            source,
                        });
                        None
                    }
                };
            }
        }
    }

    async fn container_phase(
        &mut self,
        client: &dyn RuntimeClient,
        round: usize,
        phase: ContainerPhase,
    ) {
        let kind = phase.kind();

        for i in 0..self.pods.len() {
            if self.pods[i].is_none() {
                continue;
            }

            for j in 0..self.containers[i].len() {
                let Some(ctr) = self.containers[i][j].clone() else {
                    continue;
                };
                let slot = Slot::Container(i, j);

                let (result, elapsed) = timed(match phase {
                    ContainerPhase::Start => client.start_container(&ctr),
                    ContainerPhase::Stop => client.stop_container(&ctr),
                    ContainerPhase::Remove => client.remove_container(&ctr),
                })
                .await;

                match result {
                    Ok(()) => self.succeeded(kind, slot, ctr.id(), elapsed),
                    Err(source) => self.failed(BatchError {
                        round,
                        operation: kind,
                        slot,
                        attempts: 1,
                        source,
                    }),
                }

                // a removed container is gone whether or not the call succeeded
                if phase == ContainerPhase::Remove {
                    self.containers[i][j] = None;
                }
            }
        }
    }

    async fn pod_phase(&mut self, client: &dyn RuntimeClient, round: usize, phase: PodPhase) {
        let kind = phase.kind();

        for i in 0..self.pods.len() {
            let Some(pod) = self.pods[i].clone() else {
                continue;
            };
            let slot = Slot::Pod(i);

            let (result, elapsed) = timed(match phase {
                PodPhase::Stop => client.stop_pod(&pod),
                PodPhase::Remove => client.remove_pod(&pod),
            })
            .await;

            match result {
                Ok(()) => self.succeeded(kind, slot, pod.id(), elapsed),
                Err(source) => self.failed(BatchError {
                    round,
                    operation: kind,
                    slot,
                    attempts: 1,
                    source,
                }),
            }

            if phase == PodPhase::Remove {
                self.pods[i] = None;
            }
        }
    }

    fn succeeded(&mut self, kind: OperationKind, slot: Slot, id: &str, elapsed: Duration) {
        self.latency.record(kind, as_latency(elapsed));
        self.metrics.observe_latency(kind, elapsed);

        if self.config.verbose {
            info!(
                batch = %self.name,
                slot = %slot,
                id = %id,
                latency = ?elapsed,
                "{} {} done",
                kind,
                slot
            );
        }
    }

    fn failed(&mut self, error: BatchError) {
        self.metrics.inc_errors(error.operation);
        if self.config.verbose {
            warn!(batch = %self.name, error = %error, "Operation failed");
        }
        self.errors.push(error);
    }
}
