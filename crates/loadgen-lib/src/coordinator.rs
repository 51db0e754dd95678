//! Run coordination
//!
//! Builds the configured number of batches, runs them concurrently against a
//! shared runtime client and merges their results once all of them are done.

use crate::batch::{Batch, BatchConfig, BatchError, RetryCount};
use crate::idgen::IdGenerator;
use crate::latency::LatencyCollection;
use crate::runtime::{ContainerOptions, RuntimeClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info};

/// Shape of a whole run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of concurrent batches
    pub batches: usize,
    /// Settings shared by every batch
    pub batch: BatchConfig,
    /// Options for every created container
    pub container_options: ContainerOptions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batches: 1,
            batch: BatchConfig::default(),
            container_options: ContainerOptions::default(),
        }
    }
}

/// Results of one finished batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub name: String,
    pub retries: RetryCount,
    pub errors: Vec<BatchError>,
}

/// Merged results of a run
#[derive(Debug)]
pub struct RunReport {
    /// Wall-clock time from launch until the last batch finished
    pub elapsed: Duration,
    /// Configuration the run used, after defaults were applied
    pub config: RunConfig,
    /// Per-batch outcomes, in batch order
    pub batches: Vec<BatchOutcome>,
    /// Batch tasks that panicked or were cancelled
    pub join_failures: Vec<String>,
    /// Samples from every batch, sorted
    pub latency: LatencyCollection,
    /// Summed retry counts
    pub retries: RetryCount,
}

impl RunReport {
    /// Total operation errors across all batches
    pub fn error_count(&self) -> usize {
        self.batches.iter().map(|b| b.errors.len()).sum()
    }
}

/// Launches batches and joins them
pub struct RunCoordinator {
    client: Arc<dyn RuntimeClient>,
    config: RunConfig,
    ids: Arc<IdGenerator>,
}

impl RunCoordinator {
    pub fn new(client: Arc<dyn RuntimeClient>, config: RunConfig) -> Self {
        Self {
            client,
            config,
            ids: Arc::new(IdGenerator::new()),
        }
    }

    /// Run every batch to completion and merge the results
    pub async fn run(self) -> RunReport {
        let mut config = self.config;
        config.batches = config.batches.max(1);
        config.batch = config.batch.normalized();

        info!(
            batches = config.batches,
            pods = config.batch.pods,
            containers = config.batch.containers,
            rounds = config.batch.rounds,
            "Starting load run"
        );

        let start = Instant::now();
        let mut tasks = JoinSet::new();
        for i in 0..config.batches {
            Batch::new(format!("batch{}", i), config.batch.clone(), self.ids.clone())
                .with_container_options(config.container_options.clone())
                .run(self.client.clone(), &mut tasks);
        }

        let mut finished = Vec::with_capacity(config.batches);
        let mut join_failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(batch) => finished.push(batch),
                Err(e) => {
                    error!(error = %e, "Batch task failed");
                    join_failures.push(e.to_string());
                }
            }
        }
        let elapsed = start.elapsed();

        // join order is completion order; report in batch order
        finished.sort_by_key(|b| batch_index(b.name()));

        let mut latency = LatencyCollection::new();
        let mut retries = RetryCount::default();
        let mut batches = Vec::with_capacity(finished.len());
        for batch in finished {
            let (name, batch_latency, batch_retries, errors) = batch.into_results();
            latency.add(&batch_latency);
            retries.add(&batch_retries);
            batches.push(BatchOutcome {
                name,
                retries: batch_retries,
                errors,
            });
        }
        latency.sort();

        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            samples = latency.total(),
            "Load run complete"
        );

        RunReport {
            elapsed,
            config,
            batches,
            join_failures,
            latency,
            retries,
        }
    }
}

fn batch_index(name: &str) -> usize {
    name.trim_start_matches("batch").parse().unwrap_or(usize::MAX)
}
