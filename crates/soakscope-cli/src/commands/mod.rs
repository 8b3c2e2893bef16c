//! CLI command implementations.
//!
//! # Subcommands
//!
//! - `report` - Write the markdown report for an artifact directory
//! - `inspect` - Print the analysis as JSON

pub mod inspect;
pub mod report;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Validates `dir` and returns its canonical form.
pub fn resolve_artifact_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        bail!("Artifact directory does not exist: {}", dir.display());
    }
    if !dir.is_dir() {
        bail!("Artifact path is not a directory: {}", dir.display());
    }
    dir.canonicalize()
        .with_context(|| format!("Failed to resolve artifact directory {}", dir.display()))
}
