//! vaultbench CLI
//!
//! Runs one scenario family against in-process vaults and writes every
//! timing series as a JSON line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use vaultbench::report::{JsonLinesSink, SeriesLog};
use vaultbench::{run_suite, HarnessConfig, LocalLoader};

#[derive(Parser)]
#[command(name = "vaultbench")]
#[command(about = "Time every call into a boundary-isolated vault")]
#[command(version)]
struct Cli {
    /// Repetitions of each call kind
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Bytes moved per data call; 0 runs the lifecycle family
    #[arg(short = 'l', long)]
    data_len: Option<usize>,

    /// JSON file with base settings, overridden by the flags above
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append JSON lines here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vaultbench=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    if let Some(iterations) = cli.iterations {
        config.iterations = iterations;
    }
    if let Some(data_len) = cli.data_len {
        config.data_len = data_len;
    }

    let series = run_suite(LocalLoader::new(), &config)?;

    let mut log = SeriesLog::new();
    match &cli.output {
        Some(path) => log.add_forward_sink(Box::new(
            JsonLinesSink::append_to(path)
                .with_context(|| format!("opening {}", path.display()))?,
        )),
        None => log.add_forward_sink(Box::new(JsonLinesSink::stdout())),
    }
    for s in &series {
        log.append(s)?;
    }

    info!(series = log.len(), "run complete");
    Ok(())
}
