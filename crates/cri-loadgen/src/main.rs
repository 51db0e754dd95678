//! CRI load generator
//!
//! Drives concurrent batches of pod and container lifecycle rounds against a
//! CRI runtime and reports per-operation latency statistics.

use anyhow::{Context, Result};
use clap::Parser;
use loadgen_lib::{
    runtime::{CriRuntime, SimulatedConfig, SimulatedRuntime},
    BatchConfig, ContainerOptions, LoadgenMetrics, RunConfig, RunCoordinator, RuntimeClient,
    SaveTarget,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod output;

/// Load generator for CRI container runtimes
#[derive(Parser, Debug)]
#[command(name = "cri-loadgen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of batches to run concurrently
    #[arg(long, default_value_t = 1)]
    pub batches: usize,

    /// Pods created by each batch per round
    #[arg(long, default_value_t = 1)]
    pub pods: usize,

    /// Containers created in each pod
    #[arg(long, default_value_t = 1)]
    pub containers: usize,

    /// Lifecycle rounds per batch
    #[arg(long, default_value_t = 10)]
    pub rounds: usize,

    /// Save raw latency samples as JSON to this path (`-` for stdout)
    #[arg(long)]
    pub save: Option<String>,

    /// Log every operation and error as it happens
    #[arg(long, short)]
    pub verbose: bool,

    /// Namespace for created pods
    #[arg(long)]
    pub namespace: Option<String>,

    /// CRI runtime endpoint (unix socket path or URL)
    #[arg(long, env = "CONTAINER_RUNTIME_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Image run by every container
    #[arg(long)]
    pub image: Option<String>,

    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run against an in-process simulated runtime
    #[arg(long)]
    pub simulate: bool,

    /// Base latency of simulated calls, in milliseconds
    #[arg(long, default_value_t = 1)]
    pub sim_latency_ms: u64,

    /// Fraction of simulated calls that fail
    #[arg(long, default_value_t = 0.0)]
    pub sim_failure_rate: f64,

    /// Serve /metrics and /healthz on this address while running
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Report format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout is reserved for the report
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn connect(cli: &Cli, config: &config::LoadgenConfig) -> Result<Arc<dyn RuntimeClient>> {
    if cli.simulate {
        let latency = Duration::from_millis(cli.sim_latency_ms);
        info!(
            latency_ms = cli.sim_latency_ms,
            failure_rate = cli.sim_failure_rate,
            "Using simulated runtime"
        );
        return Ok(Arc::new(SimulatedRuntime::new(SimulatedConfig {
            latency,
            jitter: latency / 2,
            failure_rate: cli.sim_failure_rate.clamp(0.0, 1.0),
        })));
    }

    let runtime = CriRuntime::connect(config.cri_config())
        .await
        .with_context(|| format!("Failed to connect to {}", config.endpoint))?;

    let version = runtime
        .version()
        .await
        .context("Failed to query runtime version")?;
    info!(
        runtime = %version.runtime_name,
        version = %version.runtime_version,
        api = %version.runtime_api_version,
        "Connected to runtime"
    );

    let image_ref = runtime
        .pull_image(&config.pause_image)
        .await
        .with_context(|| format!("Failed to pull {}", config.pause_image))?;
    info!(image = %config.pause_image, image_ref = %image_ref, "Image ready");

    Ok(Arc::new(runtime))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = config::LoadgenConfig::load(cli.config.as_deref())?;
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
    }
    if let Some(image) = &cli.image {
        config.pause_image = image.clone();
    }

    if let Some(addr) = cli.metrics_addr {
        LoadgenMetrics::new();
        tokio::spawn(async move {
            if let Err(e) = api::serve(addr).await {
                warn!(error = %e, "Metrics server stopped");
            }
        });
    }

    let client = connect(&cli, &config).await?;

    let run_config = RunConfig {
        batches: cli.batches,
        batch: BatchConfig {
            namespace: config.namespace.clone(),
            pods: cli.pods,
            containers: cli.containers,
            rounds: cli.rounds,
            verbose: cli.verbose,
        },
        container_options: ContainerOptions::without_command(config.pause_image.clone()),
    };

    let report = RunCoordinator::new(client, run_config).run().await;
    output::print_report(&report, cli.format);

    // an empty target means no persistence
    if let Some(target) = cli.save.as_deref().filter(|t| !t.is_empty()) {
        match report.latency.save(target) {
            Ok(SaveTarget::File(path)) => {
                output::print_success(&format!("Saved results to {}", path.display()));
            }
            Ok(SaveTarget::Stdout) => {}
            Err(e) => {
                output::print_error(&format!("Failed to save results: {}", e));
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["cri-loadgen"]);
        assert_eq!(cli.batches, 1);
        assert_eq!(cli.pods, 1);
        assert_eq!(cli.containers, 1);
        assert_eq!(cli.rounds, 10);
        assert!(cli.save.is_none());
        assert!(!cli.verbose);
        assert!(!cli.simulate);
        assert_eq!(cli.format, output::OutputFormat::Table);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "cri-loadgen",
            "--batches",
            "4",
            "--pods",
            "2",
            "--containers",
            "3",
            "--rounds",
            "5",
            "--save",
            "-",
            "--verbose",
            "--simulate",
            "--metrics-addr",
            "127.0.0.1:9100",
        ]);
        assert_eq!(cli.batches, 4);
        assert_eq!(cli.pods, 2);
        assert_eq!(cli.containers, 3);
        assert_eq!(cli.rounds, 5);
        assert_eq!(cli.save.as_deref(), Some("-"));
        assert!(cli.verbose);
        assert!(cli.simulate);
        assert_eq!(cli.metrics_addr, Some("127.0.0.1:9100".parse().unwrap()));
    }
}
