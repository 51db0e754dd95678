//! Prometheus metrics for the load generator
//!
//! Mirrors what the batches record internally so long runs can be watched
//! from a dashboard while they are in progress.

use crate::latency::OperationKind;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;

/// Histogram buckets for runtime operation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<LoadgenMetricsInner> = OnceLock::new();

struct LoadgenMetricsInner {
    operation_latency_seconds: HistogramVec,
    operation_errors: IntCounterVec,
    pod_create_retries: IntCounter,
    batches_running: IntGauge,
}

impl LoadgenMetricsInner {
    fn new() -> Self {
        Self {
            operation_latency_seconds: register_histogram_vec!(
                "cri_loadgen_operation_latency_seconds",
                "Latency of successful runtime operations",
                &["operation"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register operation_latency_seconds"),

            operation_errors: register_int_counter_vec!(
                "cri_loadgen_operation_errors_total",
                "Runtime operations that failed after all attempts",
                &["operation"]
            )
            .expect("Failed to register operation_errors"),

            pod_create_retries: register_int_counter!(
                "cri_loadgen_pod_create_retries_total",
                "Failed pod creation attempts"
            )
            .expect("Failed to register pod_create_retries"),

            batches_running: register_int_gauge!(
                "cri_loadgen_batches_running",
                "Number of batches currently executing rounds"
            )
            .expect("Failed to register batches_running"),
        }
    }
}

/// Handle to the global load generator metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct LoadgenMetrics {
    _private: (),
}

impl Default for LoadgenMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadgenMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(LoadgenMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &LoadgenMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_latency(&self, kind: OperationKind, elapsed: Duration) {
        self.inner()
            .operation_latency_seconds
            .with_label_values(&[kind.label()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn inc_errors(&self, kind: OperationKind) {
        self.inner()
            .operation_errors
            .with_label_values(&[kind.label()])
            .inc();
    }

    pub fn inc_pod_create_retries(&self) {
        self.inner().pod_create_retries.inc();
    }

    pub fn batch_started(&self) {
        self.inner().batches_running.inc();
    }

    pub fn batch_finished(&self) {
        self.inner().batches_running.dec();
    }
}

/// Encode every registered metric in the Prometheus text format
pub fn gather_text() -> Result<String, prometheus::Error> {
    use prometheus::{Encoder, TextEncoder};

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
