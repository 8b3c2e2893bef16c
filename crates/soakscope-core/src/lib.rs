//! # soakscope-core
//!
//! Offline analysis of admission-control and circuit-breaker telemetry
//! captured during soak runs.
//!
//! A soak run leaves behind an artifact directory of append-only logs. This
//! crate replays them into aggregate state and turns that state into a
//! deterministic capacity-tuning report:
//!
//! ```text
//! record (loader) --> admission::reduce --\
//!                 \-> workload::reduce  ---+--> recommend::evaluate --> report::assemble --> markdown
//! ```
//!
//! - [`record`] reads newline-delimited JSON, including rotated logs, and
//!   tolerates missing files and malformed lines.
//! - [`admission`] reconstructs active run/slot counts, denial histograms
//!   and breaker trips from the admission log and status samples.
//! - [`workload`] separates synthetic probe traffic from organic denials.
//! - [`recommend`] holds the ordered rule table.
//! - [`report`] lays out the document and renders markdown.
//! - [`analysis`] wires the pipeline to an artifact directory.
//!
//! ## Example
//!
//! ```rust
//! use soakscope_core::admission::{self, AdmissionEvent};
//! use soakscope_core::recommend;
//! use soakscope_core::workload::WorkloadAggregate;
//!
//! let log = vec![
//!     AdmissionEvent::new("run_allowed"),
//!     AdmissionEvent::new("run_denied").with_code("RUN_CAP_REACHED"),
//! ];
//! let aggregate = admission::reduce(&log, &[]);
//! assert_eq!(aggregate.total_run_denied, 1);
//!
//! let advice = recommend::recommend(&aggregate, &WorkloadAggregate::default());
//! assert!(advice[0].contains("Consider raising"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod admission;
pub mod analysis;
pub mod config;
pub mod recommend;
pub mod record;
pub mod reducer;
pub mod report;
pub mod tally;
pub mod workload;

pub use admission::AdmissionAggregate;
pub use analysis::{ReportError, SoakAnalysis, SoakArtifacts, analyze, analyze_dir, write_report};
pub use config::{AnalysisConfig, ConfigError};
pub use recommend::Recommendation;
pub use report::{ReportDocument, render_markdown};
pub use tally::LabelCounter;
pub use workload::WorkloadAggregate;
