//! Report rendering

use clap::ValueEnum;
use colored::Colorize;
use loadgen_lib::latency::{as_duration, Latency};
use loadgen_lib::{OperationKind, RunReport, StatsError, Summary};
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

/// Output format for the run report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a latency sample (microseconds) as a human-readable duration
pub fn format_latency(latency: Latency) -> String {
    let d = as_duration(latency);
    // drop sub-microsecond noise before printing
    format!("{:?}", Duration::from_micros(d.as_micros() as u64))
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Operation")]
    operation: &'static str,
    #[tabled(rename = "Count")]
    count: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "StdDev")]
    std_dev: String,
    #[tabled(rename = "P25")]
    p25: String,
    #[tabled(rename = "P50")]
    p50: String,
    #[tabled(rename = "P75")]
    p75: String,
    #[tabled(rename = "P95")]
    p95: String,
    #[tabled(rename = "Max")]
    max: String,
}

impl SummaryRow {
    fn new(kind: OperationKind, summary: &Result<Summary, StatsError>) -> Self {
        match summary {
            Ok(s) => Self {
                operation: kind.label(),
                count: s.count.to_string(),
                min: format_latency(s.min),
                mean: format_latency(s.mean),
                std_dev: format_latency(s.std_dev),
                p25: format_latency(s.p25),
                p50: format_latency(s.p50),
                p75: format_latency(s.p75),
                p95: format_latency(s.p95),
                max: format_latency(s.max),
            },
            Err(_) => {
                let none = || "-".to_string();
                Self {
                    operation: kind.label(),
                    count: "0".to_string(),
                    min: none(),
                    mean: none(),
                    std_dev: none(),
                    p25: none(),
                    p50: none(),
                    p75: none(),
                    p95: none(),
                    max: none(),
                }
            }
        }
    }
}

/// One line describing the shape and duration of the run
pub fn header(report: &RunReport) -> String {
    let c = &report.config;
    format!(
        "{:?} to run {} rounds of {} batches of {} pods with {} containers",
        report.elapsed, c.batch.rounds, c.batches, c.batch.pods, c.batch.containers
    )
}

/// Errors grouped by batch, followed by the total count
pub fn error_report(report: &RunReport) -> String {
    let mut out = String::new();
    for batch in report.batches.iter().filter(|b| !b.errors.is_empty()) {
        let _ = writeln!(out, "{}: {} errors", batch.name, batch.errors.len());
        for err in &batch.errors {
            let _ = writeln!(out, "  {}", err);
        }
    }

    let total = report.error_count();
    if total == 0 {
        out.push_str("no errors encountered");
    } else {
        let _ = write!(out, "encountered {} errors total", total);
    }
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    elapsed_secs: f64,
    pods: usize,
    containers: usize,
    rounds: usize,
    errors: usize,
    pod_create_retries: u64,
    batches: Vec<JsonBatch<'a>>,
    join_failures: &'a [String],
    summaries: Vec<JsonSummary>,
}

#[derive(Serialize)]
struct JsonBatch<'a> {
    name: &'a str,
    retries: u64,
    errors: Vec<String>,
}

#[derive(Serialize)]
struct JsonSummary {
    operation: &'static str,
    #[serde(flatten)]
    summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn json_report(report: &RunReport) -> JsonReport<'_> {
    let c = &report.config;
    JsonReport {
        elapsed_secs: report.elapsed.as_secs_f64(),
        pods: c.batch.pods,
        containers: c.batch.containers,
        rounds: c.batch.rounds,
        errors: report.error_count(),
        pod_create_retries: report.retries.run_pod_sandbox,
        batches: report
            .batches
            .iter()
            .map(|b| JsonBatch {
                name: &b.name,
                retries: b.retries.run_pod_sandbox,
                errors: b.errors.iter().map(ToString::to_string).collect(),
            })
            .collect(),
        join_failures: &report.join_failures,
        summaries: report
            .latency
            .summaries()
            .into_iter()
            .map(|(kind, summary)| match summary {
                Ok(summary) => JsonSummary {
                    operation: kind.label(),
                    summary: Some(summary),
                    error: None,
                },
                Err(e) => JsonSummary {
                    operation: kind.label(),
                    summary: None,
                    error: Some(e.to_string()),
                },
            })
            .collect(),
    }
}

/// Print the full report for a finished run
pub fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            println!("{}", header(report).bold());

            let errors = error_report(report);
            if report.error_count() == 0 {
                println!("{}", errors.green());
            } else {
                println!("{}", errors.red());
            }

            if report.retries.total() > 0 {
                print_warning(&format!(
                    "{} pod creation attempts failed",
                    report.retries.run_pod_sandbox
                ));
            }
            for failure in &report.join_failures {
                print_warning(&format!("batch task failed: {}", failure));
            }

            let summaries = report.latency.summaries();
            for (_, summary) in &summaries {
                if let Err(e) = summary {
                    print_info(&e.to_string());
                }
            }

            let rows: Vec<SummaryRow> = summaries
                .iter()
                .map(|(kind, summary)| SummaryRow::new(*kind, summary))
                .collect();
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(text) = serde_json::to_string_pretty(&json_report(report)) {
                println!("{}", text);
            }
        }
    }
}
