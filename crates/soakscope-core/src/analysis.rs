//! End-to-end analysis of one soak artifact directory.
//!
//! ```text
//! artifact dir --load--> SoakArtifacts --analyze--> SoakAnalysis --report--> ReportDocument
//! ```
//!
//! Loading never fails: missing files and malformed lines degrade to empty
//! input. Writing the report is the only fallible step.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::admission::{self, AdmissionAggregate, AdmissionEvent, StatusSample};
use crate::config::{AnalysisConfig, InputFiles};
use crate::recommend::{self, Recommendation};
use crate::record::{self, LoadStats};
use crate::report::{self, PolicySnapshot, RecordCounts, ReportDocument, ReportInputs};
use crate::workload::{self, WorkloadAggregate, WorkloadEvent};

/// Errors writing the report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The output directory could not be created.
    #[error("failed to create report directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The report could not be written to a temporary file.
    #[error("failed to write report {path}: {source}")]
    Write {
        /// Final report path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The temporary file could not be renamed into place.
    #[error("failed to persist report: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Line accounting per input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InputStats {
    /// Admission log and its rotations.
    pub admission: LoadStats,
    /// Status samples.
    pub status: LoadStats,
    /// Workload log.
    pub workload: LoadStats,
}

/// Typed contents of an artifact directory.
#[derive(Debug, Clone)]
pub struct SoakArtifacts {
    /// Directory the artifacts were read from.
    pub dir: PathBuf,
    /// Admission events, rotations concatenated in fold order.
    pub admission_events: Vec<AdmissionEvent>,
    /// Status samples.
    pub status_samples: Vec<StatusSample>,
    /// Workload events.
    pub workload_events: Vec<WorkloadEvent>,
    /// End-of-run policy snapshot, when the final summary carries one.
    pub policy: Option<PolicySnapshot>,
    /// Line accounting per input.
    pub stats: InputStats,
}

impl SoakArtifacts {
    /// Reads every input named by `inputs` from `dir`.
    #[must_use]
    pub fn load(dir: &Path, inputs: &InputFiles) -> Self {
        let admission = record::load_rotated(dir, &inputs.admission_log);
        let status = record::load_ndjson(&dir.join(&inputs.status_log));
        let workload = record::load_ndjson(&dir.join(&inputs.workload_log));

        let summary_path = dir.join(&inputs.final_summary);
        let policy = record::load_summary_object(&summary_path).and_then(|summary| {
            let snapshot = PolicySnapshot::from_summary(&summary);
            if snapshot.is_none() {
                warn!(
                    path = %summary_path.display(),
                    "final summary has no usable policy snapshot"
                );
            }
            snapshot
        });

        Self {
            dir: dir.to_path_buf(),
            admission_events: admission
                .records
                .iter()
                .map(AdmissionEvent::from_record)
                .collect(),
            status_samples: status
                .records
                .iter()
                .map(StatusSample::from_record)
                .collect(),
            workload_events: workload
                .records
                .iter()
                .map(WorkloadEvent::from_record)
                .collect(),
            policy,
            stats: InputStats {
                admission: admission.stats,
                status: status.stats,
                workload: workload.stats,
            },
        }
    }

    /// Record counts as shown in the report header.
    #[must_use]
    pub fn counts(&self) -> RecordCounts {
        RecordCounts {
            admission_events: self.admission_events.len(),
            status_samples: self.status_samples.len(),
            workload_events: self.workload_events.len(),
            dropped_lines: self.stats.admission.dropped
                + self.stats.status.dropped
                + self.stats.workload.dropped,
        }
    }
}

/// Frozen result of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoakAnalysis {
    /// Directory the artifacts were read from.
    pub artifact_dir: PathBuf,
    /// Raw record counts.
    pub counts: RecordCounts,
    /// Admission-side aggregate.
    pub admission: AdmissionAggregate,
    /// Workload-side aggregate.
    pub workload: WorkloadAggregate,
    /// End-of-run policy snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicySnapshot>,
    /// Recommendations in rule-table order.
    pub recommendations: Vec<Recommendation>,
}

impl SoakAnalysis {
    /// Assembles the report document.
    #[must_use]
    pub fn report(&self) -> ReportDocument {
        report::assemble(&ReportInputs {
            artifact_dir: &self.artifact_dir,
            admission: &self.admission,
            workload: &self.workload,
            counts: self.counts,
            policy: self.policy.as_ref(),
            recommendations: &self.recommendations,
        })
    }
}

/// Reduces both streams and evaluates the rule table.
#[must_use]
pub fn analyze(artifacts: &SoakArtifacts, config: &AnalysisConfig) -> SoakAnalysis {
    let admission = admission::reduce(&artifacts.admission_events, &artifacts.status_samples);
    let workload = workload::reduce(&artifacts.workload_events);
    let recommendations = recommend::evaluate(&admission, &workload, config);
    let counts = artifacts.counts();

    info!(
        dir = %artifacts.dir.display(),
        admission_events = counts.admission_events,
        status_samples = counts.status_samples,
        workload_events = counts.workload_events,
        dropped_lines = counts.dropped_lines,
        recommendations = recommendations.len(),
        "analysis complete"
    );

    SoakAnalysis {
        artifact_dir: artifacts.dir.clone(),
        counts,
        admission,
        workload,
        policy: artifacts.policy.clone(),
        recommendations,
    }
}

/// Loads `dir` with the configured file names and analyzes it.
#[must_use]
pub fn analyze_dir(dir: &Path, config: &AnalysisConfig) -> SoakAnalysis {
    analyze(&SoakArtifacts::load(dir, &config.inputs), config)
}

/// Writes `contents` to `path` atomically, creating missing parent
/// directories.
///
/// The content goes to a temporary file in the target directory which is
/// then renamed over `path`, so readers never observe a partial report.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created, the
/// temporary file cannot be written, or the rename fails.
pub fn write_report(path: &Path, contents: &str) -> Result<(), ReportError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|source| ReportError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })?;

    let write_err = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    temp_file
        .write_all(contents.as_bytes())
        .and_then(|()| temp_file.flush())
        .map_err(write_err)?;
    temp_file.persist(path)?;

    info!(path = %path.display(), bytes = contents.len(), "report written");
    Ok(())
}
