//! CLI integration tests

use loadgen_lib::{LatencyCollection, OperationKind};
use std::process::{Command, Output};
use tempfile::TempDir;

fn command(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cri-loadgen"));
    cmd.args(args)
        .env_remove("CONTAINER_RUNTIME_ENDPOINT")
        .env("NO_COLOR", "1");
    cmd
}

fn run(args: &[&str]) -> Output {
    command(args).output().expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    for flag in [
        "--batches",
        "--pods",
        "--containers",
        "--rounds",
        "--save",
        "--verbose",
        "--simulate",
    ] {
        assert!(stdout.contains(flag), "Should show {} option", flag);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("cri-loadgen"), "Should show binary name");
}

/// A simulated run saves every sample and reports no errors
#[test]
fn test_simulated_run_saves_results() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("results");

    let output = run(&[
        "--simulate",
        "--sim-latency-ms",
        "0",
        "--batches",
        "2",
        "--pods",
        "2",
        "--containers",
        "3",
        "--rounds",
        "2",
        "--save",
        target.to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Simulated run should succeed");
    assert!(stdout.contains("no errors encountered"));
    assert!(stdout.contains("RunPodSandbox"));

    // .json is appended to the target
    let latency = LatencyCollection::load(dir.path().join("results.json")).unwrap();
    // batches * pods * rounds
    assert_eq!(latency.len(OperationKind::CreatePod), 8);
    assert_eq!(latency.len(OperationKind::RemovePod), 8);
    // batches * pods * containers * rounds
    assert_eq!(latency.len(OperationKind::CreateContainer), 24);
    assert_eq!(latency.len(OperationKind::RemoveContainer), 24);

    let samples = latency.samples(OperationKind::StartContainer);
    assert!(samples.windows(2).all(|w| w[0] <= w[1]), "Saved samples should be sorted");
}

/// Saving to stdout leaves the JSON record as the last line
#[test]
fn test_save_to_stdout() {
    let output = run(&[
        "--simulate",
        "--sim-latency-ms",
        "0",
        "--rounds",
        "1",
        "--save",
        "-",
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let last = stdout.lines().last().expect("Should print the record");
    let record: serde_json::Value = serde_json::from_str(last).unwrap();

    for label in ["RunPodSandbox", "StopContainer", "RemovePodSandbox"] {
        assert_eq!(record[label].as_array().map(|a| a.len()), Some(1));
    }
}

/// Failing operations are reported but do not change the exit code
#[test]
fn test_operation_failures_exit_zero() {
    let output = run(&[
        "--simulate",
        "--sim-latency-ms",
        "0",
        "--sim-failure-rate",
        "1.0",
        "--rounds",
        "2",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("encountered 2 errors total"));
    assert!(stdout.contains("after 3 attempts"));
    assert!(stdout.contains("no samples for RunPodSandbox"));
}

/// A persistence failure exits with code 1
#[test]
fn test_save_failure_exits_one() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("missing").join("results");

    let output = run(&[
        "--simulate",
        "--sim-latency-ms",
        "0",
        "--rounds",
        "1",
        "--save",
        target.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to save results"));
}

/// An empty save target disables persistence
#[test]
fn test_empty_save_target_writes_nothing() {
    let dir = TempDir::new().unwrap();

    let output = command(&["--simulate", "--sim-latency-ms", "0", "--rounds", "1", "--save", ""])
        .current_dir(dir.path())
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(files.is_empty(), "Should not write any file, found {:?}", files);
}

/// The JSON report carries each batch's errors and explains missing samples
#[test]
fn test_json_report_lists_errors() {
    let output = run(&[
        "--simulate",
        "--sim-latency-ms",
        "0",
        "--sim-failure-rate",
        "1.0",
        "--rounds",
        "1",
        "--format",
        "json",
    ]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["errors"], 1);
    let errors = report["batches"][0]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().contains("failed to create pod #0"));

    let summaries = report["summaries"].as_array().unwrap();
    assert_eq!(summaries.len(), 7);
    assert!(summaries
        .iter()
        .all(|s| s["error"].as_str().unwrap_or("").starts_with("no samples for")));
}
