//! Load generation library for CRI container runtimes
//!
//! This crate provides the core functionality for:
//! - Concurrent batches driving pod/container lifecycle rounds
//! - Latency collection, statistics and persistence
//! - CRI gRPC and simulated runtime clients
//! - Prometheus metrics

pub mod batch;
pub mod coordinator;
pub mod idgen;
pub mod latency;
pub mod observability;
pub mod proto;
pub mod runtime;
pub mod stats;

pub use batch::{Batch, BatchConfig, BatchError, RetryCount, Slot};
pub use coordinator::{BatchOutcome, RunConfig, RunCoordinator, RunReport};
pub use idgen::IdGenerator;
pub use latency::{LatencyCollection, OperationKind, PersistError, SaveTarget};
pub use observability::LoadgenMetrics;
pub use runtime::{ContainerOptions, RuntimeClient, RuntimeError};
pub use stats::{StatsError, Summary};
