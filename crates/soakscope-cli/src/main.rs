//! soakscope - soak telemetry analyzer
//!
//! Reads the artifact directory of a soak run and produces a capacity-tuning
//! report for the admission controller and circuit breaker.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use soakscope_core::AnalysisConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

use commands::inspect::InspectArgs;
use commands::report::ReportArgs;

/// soakscope - soak telemetry analyzer
#[derive(Parser, Debug)]
#[command(name = "soakscope")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to an analysis configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze an artifact directory and write the markdown report
    Report(ReportArgs),

    /// Analyze an artifact directory and print a JSON snapshot
    Inspect(InspectArgs),
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only command output.
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = load_config(cli.config.as_ref())?;

    match &cli.command {
        Commands::Report(args) => commands::report::run_report(args, &config),
        Commands::Inspect(args) => commands::inspect::run_inspect(args, &config),
    }
}
