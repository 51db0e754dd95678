//! Unique identifier generation
//!
//! Every batch draws pod uids (and optionally names) from a single shared
//! generator, so each counter must advance exactly once per call no matter
//! how many batches are running.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for uids, pod names and container names
#[derive(Debug, Default)]
pub struct IdGenerator {
    uid: AtomicU64,
    pod: AtomicU64,
    ctr: AtomicU64,
}

impl IdGenerator {
    /// Create a generator with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unique id, formatted as `uid-<n>`
    pub fn generate_uid(&self) -> String {
        format!("uid-{}", next(&self.uid))
    }

    /// Next pod name, formatted as `pod-<n>`
    pub fn generate_pod_name(&self) -> String {
        format!("pod-{}", next(&self.pod))
    }

    /// Next container name, formatted as `ctr-<n>`
    pub fn generate_container_name(&self) -> String {
        format!("ctr-{}", next(&self.ctr))
    }
}

fn next(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed)
}
