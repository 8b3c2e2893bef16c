//! The `report` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use soakscope_core::{AnalysisConfig, analyze_dir, write_report};

use super::resolve_artifact_dir;

/// Arguments for the `report` command.
#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Soak artifact directory.
    #[arg(long)]
    pub dir: PathBuf,

    /// Output markdown path.
    /// Defaults to the configured report name inside the artifact directory.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Runs the `report` command and prints the resolved report path.
pub fn run_report(args: &ReportArgs, config: &AnalysisConfig) -> Result<()> {
    let path = generate_report(args, config)?;
    println!("{}", path.display());
    Ok(())
}

/// Analyzes the artifact directory and writes the report, returning where
/// it was written.
fn generate_report(args: &ReportArgs, config: &AnalysisConfig) -> Result<PathBuf> {
    let dir = resolve_artifact_dir(&args.dir)?;
    let out = match &args.out {
        Some(out) => std::path::absolute(out)
            .with_context(|| format!("Failed to resolve output path {}", out.display()))?,
        None => dir.join(&config.inputs.report_name),
    };

    let analysis = analyze_dir(&dir, config);
    let markdown = analysis.report().to_markdown();
    write_report(&out, &markdown)
        .with_context(|| format!("Failed to write report to {}", out.display()))?;

    Ok(out)
}
