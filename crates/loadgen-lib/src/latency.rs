//! Latency sample collection
//!
//! Each batch records one sample per successful runtime operation into its
//! own [`LatencyCollection`]. Once every batch has finished the coordinator
//! merges them, sorts the result and hands it to the statistics and
//! persistence code.

use crate::stats::{self, StatsError, Summary};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// A latency sample in microseconds
pub type Latency = f64;

/// Convert a measured duration into a latency sample
pub fn as_latency(d: Duration) -> Latency {
    d.as_nanos() as f64 / 1_000.0
}

/// Convert a latency sample back into a duration for display
pub fn as_duration(latency: Latency) -> Duration {
    Duration::from_nanos((latency.max(0.0) * 1_000.0) as u64)
}

/// The runtime operations driven by a batch round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreatePod,
    StopPod,
    RemovePod,
    CreateContainer,
    StartContainer,
    StopContainer,
    RemoveContainer,
}

impl OperationKind {
    /// All kinds, in report order
    pub const ALL: [OperationKind; 7] = [
        OperationKind::CreatePod,
        OperationKind::StopPod,
        OperationKind::RemovePod,
        OperationKind::CreateContainer,
        OperationKind::StartContainer,
        OperationKind::StopContainer,
        OperationKind::RemoveContainer,
    ];

    /// CRI method name, also used as the label in persisted results
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::CreatePod => "RunPodSandbox",
            OperationKind::StopPod => "StopPodSandbox",
            OperationKind::RemovePod => "RemovePodSandbox",
            OperationKind::CreateContainer => "CreateContainer",
            OperationKind::StartContainer => "StartContainer",
            OperationKind::StopContainer => "StopContainer",
            OperationKind::RemoveContainer => "RemoveContainer",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            OperationKind::CreatePod => "create pod",
            OperationKind::StopPod => "stop pod",
            OperationKind::RemovePod => "remove pod",
            OperationKind::CreateContainer => "create container",
            OperationKind::StartContainer => "start container",
            OperationKind::StopContainer => "stop container",
            OperationKind::RemoveContainer => "remove container",
        };
        f.write_str(action)
    }
}

/// Errors while saving or loading a latency collection
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("no save target given")]
    EmptyTarget,

    #[error("failed to create file {path}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("failed to open file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to JSON-encode results: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode results from {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write results: {0}")]
    Write(#[source] io::Error),
}

/// Where [`LatencyCollection::save`] wrote its output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Stdout,
    File(PathBuf),
}

/// Raw latency samples, one sequence per operation kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LatencyCollection {
    #[serde(default)]
    pub run_pod_sandbox: Vec<Latency>,
    #[serde(default)]
    pub stop_pod_sandbox: Vec<Latency>,
    #[serde(default)]
    pub remove_pod_sandbox: Vec<Latency>,
    #[serde(default)]
    pub create_container: Vec<Latency>,
    #[serde(default)]
    pub start_container: Vec<Latency>,
    #[serde(default)]
    pub stop_container: Vec<Latency>,
    #[serde(default)]
    pub remove_container: Vec<Latency>,
}

impl LatencyCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self, kind: OperationKind) -> &[Latency] {
        match kind {
            OperationKind::CreatePod => &self.run_pod_sandbox,
            OperationKind::StopPod => &self.stop_pod_sandbox,
            OperationKind::RemovePod => &self.remove_pod_sandbox,
            OperationKind::CreateContainer => &self.create_container,
            OperationKind::StartContainer => &self.start_container,
            OperationKind::StopContainer => &self.stop_container,
            OperationKind::RemoveContainer => &self.remove_container,
        }
    }

    fn samples_mut(&mut self, kind: OperationKind) -> &mut Vec<Latency> {
        match kind {
            OperationKind::CreatePod => &mut self.run_pod_sandbox,
            OperationKind::StopPod => &mut self.stop_pod_sandbox,
            OperationKind::RemovePod => &mut self.remove_pod_sandbox,
            OperationKind::CreateContainer => &mut self.create_container,
            OperationKind::StartContainer => &mut self.start_container,
            OperationKind::StopContainer => &mut self.stop_container,
            OperationKind::RemoveContainer => &mut self.remove_container,
        }
    }

    /// Append a sample for a successful operation
    pub fn record(&mut self, kind: OperationKind, latency: Latency) {
        self.samples_mut(kind).push(latency);
    }

    pub fn len(&self, kind: OperationKind) -> usize {
        self.samples(kind).len()
    }

    /// True if no kind has any samples
    pub fn is_empty(&self) -> bool {
        OperationKind::ALL.iter().all(|k| self.samples(*k).is_empty())
    }

    /// Total number of samples across all kinds
    pub fn total(&self) -> usize {
        OperationKind::ALL.iter().map(|k| self.len(*k)).sum()
    }

    /// Append every sample of `other` to this collection
    pub fn add(&mut self, other: &LatencyCollection) {
        for kind in OperationKind::ALL {
            self.samples_mut(kind)
                .extend_from_slice(other.samples(kind));
        }
    }

    /// Sort each sequence in ascending order
    pub fn sort(&mut self) {
        for kind in OperationKind::ALL {
            self.samples_mut(kind).sort_by(f64::total_cmp);
        }
    }

    /// Summary statistics for one kind. The collection must be sorted.
    pub fn summarize(&self, kind: OperationKind) -> Result<Summary, StatsError> {
        stats::summarize(kind, self.samples(kind))
    }

    /// Summaries for every kind, in report order
    pub fn summaries(&self) -> Vec<(OperationKind, Result<Summary, StatsError>)> {
        OperationKind::ALL
            .iter()
            .map(|kind| (*kind, self.summarize(*kind)))
            .collect()
    }

    /// Write the raw samples as JSON.
    ///
    /// A target of `-` writes to stdout; anything else is treated as a file
    /// path that gets a `.json` extension if it does not already have one.
    /// An empty target is rejected.
    pub fn save(&self, target: &str) -> Result<SaveTarget, PersistError> {
        if target.is_empty() {
            return Err(PersistError::EmptyTarget);
        }
        if target == "-" {
            let stdout = io::stdout();
            self.write_to(stdout.lock())?;
            return Ok(SaveTarget::Stdout);
        }

        let path = json_path(target);
        let file = File::create(&path).map_err(|source| PersistError::Create {
            path: path.clone(),
            source,
        })?;
        self.write_to(BufWriter::new(file))?;

        Ok(SaveTarget::File(path))
    }

    /// Encode the collection as a single JSON line
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), PersistError> {
        serde_json::to_writer(&mut writer, self).map_err(PersistError::Encode)?;
        writer.write_all(b"\n").map_err(PersistError::Write)?;
        writer.flush().map_err(PersistError::Write)
    }

    /// Read back a collection written by [`save`](Self::save)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| PersistError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(io::BufReader::new(file)).map_err(|source| PersistError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn json_path(target: &str) -> PathBuf {
    if target.ends_with(".json") {
        PathBuf::from(target)
    } else {
        PathBuf::from(format!("{}.json", target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_collection() -> LatencyCollection {
        let mut l = LatencyCollection::new();
        l.record(OperationKind::CreatePod, 30.0);
        l.record(OperationKind::CreatePod, 10.0);
        l.record(OperationKind::StopContainer, 7.5);
        l.record(OperationKind::RemovePod, 1.25);
        l
    }

    #[test]
    fn test_add_then_sort() {
        let mut a = LatencyCollection::new();
        a.record(OperationKind::StartContainer, 5.0);
        a.record(OperationKind::StartContainer, 1.0);
        let mut b = LatencyCollection::new();
        b.record(OperationKind::StartContainer, 3.0);

        a.add(&b);
        a.sort();

        assert_eq!(a.samples(OperationKind::StartContainer), &[1.0, 3.0, 5.0]);
        assert!(a.samples(OperationKind::CreatePod).is_empty());
    }

    #[test]
    fn test_add_keeps_other_kinds_separate() {
        let mut a = sample_collection();
        let b = sample_collection();
        a.add(&b);

        assert_eq!(a.len(OperationKind::CreatePod), 4);
        assert_eq!(a.len(OperationKind::StopContainer), 2);
        assert_eq!(a.len(OperationKind::RemovePod), 2);
        assert_eq!(a.len(OperationKind::CreateContainer), 0);
        assert_eq!(a.total(), 8);
    }

    #[test]
    fn test_sort_is_non_decreasing_and_idempotent() {
        let mut l = LatencyCollection::new();
        for v in [9.0, 3.0, 3.0, 12.5, 0.5, 7.0] {
            l.record(OperationKind::CreateContainer, v);
            l.record(OperationKind::RemoveContainer, 100.0 - v);
        }

        l.sort();
        let once = l.clone();
        l.sort();

        assert_eq!(l, once);
        for kind in OperationKind::ALL {
            assert!(l.samples(kind).windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_empty_collection() {
        let l = LatencyCollection::new();
        assert!(l.is_empty());
        assert_eq!(l.total(), 0);
        assert!(!sample_collection().is_empty());
    }

    #[test]
    fn test_summarize_empty_kind_fails() {
        let l = sample_collection();
        let err = l.summarize(OperationKind::StartContainer).unwrap_err();
        assert!(matches!(err, StatsError::NoSamples(OperationKind::StartContainer)));
    }

    #[test]
    fn test_save_appends_json_extension_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("results");
        let collection = sample_collection();

        let saved = collection.save(target.to_str().unwrap()).unwrap();
        let expected = dir.path().join("results.json");
        assert_eq!(saved, SaveTarget::File(expected.clone()));

        let loaded = LatencyCollection::load(&expected).unwrap();
        assert_eq!(loaded, collection);
    }

    #[test]
    fn test_save_keeps_existing_extension() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("raw.json");

        let mut sorted = sample_collection();
        sorted.sort();
        sorted.save(target.to_str().unwrap()).unwrap();

        assert_eq!(LatencyCollection::load(&target).unwrap(), sorted);
    }

    #[test]
    fn test_save_truncates_existing_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.json");
        std::fs::write(&target, "x".repeat(4096)).unwrap();

        let l = sample_collection();
        l.save(target.to_str().unwrap()).unwrap();

        assert_eq!(LatencyCollection::load(&target).unwrap(), l);
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("missing").join("out");

        let err = sample_collection()
            .save(target.to_str().unwrap())
            .unwrap_err();
        assert!(matches!(err, PersistError::Create { .. }));
    }

    #[test]
    fn test_labels_in_json() {
        let mut buf = Vec::new();
        sample_collection().write_to(&mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 7);
        for kind in OperationKind::ALL {
            assert!(obj.contains_key(kind.label()), "missing {}", kind.label());
        }
        assert_eq!(value["RunPodSandbox"], serde_json::json!([30.0, 10.0]));
    }

    #[test]
    fn test_latency_conversion() {
        assert_eq!(as_latency(Duration::from_micros(1500)), 1500.0);
        assert_eq!(as_latency(Duration::from_nanos(2500)), 2.5);
        assert_eq!(as_duration(1500.0), Duration::from_micros(1500));
    }

    #[test]
    fn test_save_rejects_empty_target() {
        let cwd_json = std::path::Path::new(".json");
        let existed = cwd_json.exists();

        let err = sample_collection().save("").unwrap_err();
        assert!(matches!(err, PersistError::EmptyTarget));
        assert_eq!(cwd_json.exists(), existed);
    }
}
