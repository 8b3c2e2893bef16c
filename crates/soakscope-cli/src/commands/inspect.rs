//! The `inspect` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use soakscope_core::{AnalysisConfig, SoakAnalysis, analyze_dir};

use super::resolve_artifact_dir;

/// Arguments for the `inspect` command.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Soak artifact directory.
    #[arg(long)]
    pub dir: PathBuf,

    /// Pretty-print the JSON output.
    #[arg(long, default_value = "false")]
    pub pretty: bool,
}

/// Runs the `inspect` command.
pub fn run_inspect(args: &InspectArgs, config: &AnalysisConfig) -> Result<()> {
    let dir = resolve_artifact_dir(&args.dir)?;
    let analysis = analyze_dir(&dir, config);
    println!("{}", to_json(&analysis, args.pretty)?);
    Ok(())
}

fn to_json(analysis: &SoakAnalysis, pretty: bool) -> Result<String> {
    let output = if pretty {
        serde_json::to_string_pretty(analysis)
    } else {
        serde_json::to_string(analysis)
    };
    output.context("Failed to serialize analysis")
}
