//! Report assembly.
//!
//! The assembler turns the two aggregates, the record counts, an optional
//! policy snapshot and the recommendations into a [`ReportDocument`]: a
//! title plus an ordered list of sections, each an ordered list of entries.
//! It performs no arithmetic beyond formatting; every number comes from an
//! aggregate.
//!
//! # Section order
//!
//! ```text
//! header
//! Policy Snapshot                    (only when a snapshot exists)
//! Admission Summary
//! Workload-Normalized View
//! Breaker + Denial Breakdown         (container for seven rankings)
//! Pressure + Circuit Status Samples
//! Recommendations
//! Raw Event Counts                   (container for two rankings)
//! ```
//!
//! The order is fixed. Rankings are sorted by count with ties in first-seen
//! order, and an empty ranking renders a single placeholder entry, so two
//! runs over the same input produce byte-identical documents.

mod markdown;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::admission::AdmissionAggregate;
use crate::recommend::Recommendation;
use crate::record::{self, Record};
use crate::tally::{LabelCounter, percent};
use crate::workload::WorkloadAggregate;

pub use markdown::render_markdown;

/// Document title.
pub const REPORT_TITLE: &str = "Mixed-Workload Soak Report";

/// Label of the single entry of an empty ranking.
pub const EMPTY_RANKING_LABEL: &str = "(none)";

/// Rendered in place of an absent timestamp.
pub const MISSING_TIMESTAMP: &str = "n/a";

/// One line of a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    /// `label: value`.
    Field {
        /// Field name.
        label: String,
        /// Rendered value.
        value: String,
    },
    /// `label: value`, with the value set as inline code.
    Code {
        /// Field name.
        label: String,
        /// Rendered value.
        value: String,
    },
    /// One line of a ranking.
    Ranking {
        /// Ranked label.
        label: String,
        /// Its count.
        count: u64,
    },
    /// Free text.
    Item {
        /// The text.
        text: String,
    },
}

impl Entry {
    fn field(label: &str, value: impl ToString) -> Self {
        Self::Field {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

/// A titled, ordered group of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Heading level (2 or 3).
    pub level: u8,
    /// Heading text.
    pub heading: String,
    /// Entries in output order.
    pub entries: Vec<Entry>,
}

impl Section {
    fn new(level: u8, heading: &str) -> Self {
        Self {
            level,
            heading: heading.to_string(),
            entries: Vec::new(),
        }
    }

    fn field(mut self, label: &str, value: impl ToString) -> Self {
        self.entries.push(Entry::field(label, value));
        self
    }

    /// Ranks `counter` largest first; an empty counter yields the placeholder.
    fn ranking(level: u8, heading: &str, counter: &LabelCounter) -> Self {
        let mut section = Self::new(level, heading);
        let ranked = counter.ranked();
        if ranked.is_empty() {
            section.entries.push(Entry::Ranking {
                label: EMPTY_RANKING_LABEL.to_string(),
                count: 0,
            });
        }
        section
            .entries
            .extend(ranked.into_iter().map(|(label, count)| Entry::Ranking {
                label: label.to_string(),
                count,
            }));
        section
    }
}

/// The assembled report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDocument {
    /// Document title.
    pub title: String,
    /// Metadata fields rendered directly under the title.
    pub header: Vec<Entry>,
    /// Sections in output order.
    pub sections: Vec<Section>,
}

impl ReportDocument {
    /// Renders the document as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        render_markdown(self)
    }
}

/// Number of records each input contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    /// Admission events across all rotations.
    pub admission_events: usize,
    /// Status samples.
    pub status_samples: usize,
    /// Workload events.
    pub workload_events: usize,
    /// Malformed lines dropped across all inputs.
    pub dropped_lines: usize,
}

/// Last-known tunable values from the end-of-run summary, in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PolicySnapshot {
    entries: BTreeMap<String, String>,
}

impl PolicySnapshot {
    /// Extracts the snapshot from a final-summary object.
    ///
    /// Looks at `policy`, then at `admission.policy`. String values are kept
    /// unquoted and other values become compact JSON. Returns `None` when
    /// neither location holds a non-empty object.
    #[must_use]
    pub fn from_summary(summary: &Record) -> Option<Self> {
        let policy = record::object(summary, "policy")
            .or_else(|| record::object(record::object(summary, "admission")?, "policy"))?;
        if policy.is_empty() {
            return None;
        }

        let entries = policy
            .keys()
            .map(|key| (key.clone(), record::label(policy, key, "null")))
            .collect();
        Some(Self { entries })
    }

    /// Iterates `(name, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of tunables in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the assembler lays out.
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    /// Directory the artifacts were read from.
    pub artifact_dir: &'a Path,
    /// Admission-side aggregate.
    pub admission: &'a AdmissionAggregate,
    /// Workload-side aggregate.
    pub workload: &'a WorkloadAggregate,
    /// Raw record counts.
    pub counts: RecordCounts,
    /// End-of-run policy snapshot, when one was found.
    pub policy: Option<&'a PolicySnapshot>,
    /// Recommendations in output order.
    pub recommendations: &'a [Recommendation],
}

/// Formats an epoch-millisecond timestamp as RFC 3339 UTC, or `n/a`.
#[must_use]
pub fn format_timestamp(ms: Option<i64>) -> String {
    ms.filter(|ms| *ms > 0)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(
            || MISSING_TIMESTAMP.to_string(),
            |ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
}

/// Lays out the report in its fixed section order.
#[must_use]
pub fn assemble(inputs: &ReportInputs<'_>) -> ReportDocument {
    let ReportInputs {
        artifact_dir,
        admission,
        workload,
        counts,
        policy,
        recommendations,
    } = *inputs;

    let header = vec![
        Entry::Code {
            label: "artifact dir".to_string(),
            value: artifact_dir.display().to_string(),
        },
        Entry::field("workload start (UTC)", format_timestamp(workload.first_ts)),
        Entry::field("workload end (UTC)", format_timestamp(workload.last_ts)),
        Entry::field("admission events", counts.admission_events),
        Entry::field("status samples", counts.status_samples),
        Entry::field("workload events", counts.workload_events),
    ];

    let mut sections = Vec::new();

    if let Some(policy) = policy {
        let mut section = Section::new(2, "Policy Snapshot");
        section
            .entries
            .extend(policy.iter().map(|(key, value)| Entry::field(key, value)));
        sections.push(section);
    }

    sections.push(admission_summary(admission));
    sections.push(workload_view(workload));

    sections.push(Section::new(2, "Breaker + Denial Breakdown"));
    sections.extend([
        Section::ranking(3, "Circuit trips by reason", &admission.breaker_trips),
        Section::ranking(3, "Run denials by code", &admission.run_denials),
        Section::ranking(3, "Slot denials by code", &admission.slot_denials),
        Section::ranking(3, "Tool-gate denials by code", &admission.tool_gate_denials),
        Section::ranking(3, "Operational run denials by code", &workload.operational_denials),
        Section::ranking(3, "Depth-probe outcomes", &workload.depth_probe_outcomes),
        Section::ranking(3, "Gap-probe outcomes", &workload.gap_probe_outcomes),
    ]);

    sections.push(
        Section::new(2, "Pressure + Circuit Status Samples")
            .field("pressure=critical samples", admission.critical_samples)
            .field("pressure=warn samples", admission.warn_samples)
            .field("pressure=ok samples", admission.ok_samples)
            .field("circuit=open samples", admission.circuit_open_samples)
            .field("circuit=closed samples", admission.circuit_closed_samples),
    );

    let mut section = Section::new(2, "Recommendations");
    section
        .entries
        .extend(recommendations.iter().map(|rec| Entry::Item {
            text: rec.message.clone(),
        }));
    sections.push(section);

    sections.push(Section::new(2, "Raw Event Counts"));
    sections.extend([
        Section::ranking(3, "Admission event kinds", &admission.event_counts),
        Section::ranking(3, "Workload event kinds", &workload.event_counts),
    ]);

    ReportDocument {
        title: REPORT_TITLE.to_string(),
        header,
        sections,
    }
}

fn admission_summary(admission: &AdmissionAggregate) -> Section {
    Section::new(2, "Admission Summary")
        .field("run allowed", admission.total_run_allowed)
        .field(
            "run denied",
            format!(
                "{} ({})",
                admission.total_run_denied,
                percent(admission.run_denial_ratio())
            ),
        )
        .field("slot allowed", admission.total_slot_allowed)
        .field(
            "slot denied",
            format!(
                "{} ({})",
                admission.total_slot_denied,
                percent(admission.slot_denial_ratio())
            ),
        )
        .field("tool-gate denied", admission.total_tool_gate_denied)
        .field("max active runs observed", admission.max_active_runs)
        .field("max active slots observed", admission.max_active_slots)
        .field("max call/result gap observed", admission.max_gap)
}

fn workload_view(workload: &WorkloadAggregate) -> Section {
    Section::new(2, "Workload-Normalized View")
        .field("runs completed", workload.total_completed)
        .field(
            "operational run denied",
            format!(
                "{} ({})",
                workload.total_operational_denied,
                percent(workload.operational_denial_ratio())
            ),
        )
        .field("probe denials excluded", workload.probe_denials)
        .field(
            "depth probes",
            format!(
                "{} ({} rejected)",
                workload.total_depth_probed, workload.depth_probe_rejected
            ),
        )
        .field(
            "gap probes",
            format!(
                "{} ({} rejected)",
                workload.total_gap_probed, workload.gap_probe_rejected
            ),
        )
        .field("burst runs", workload.burst_runs)
        .field("burst slots granted", workload.burst_granted_slots)
        .field(
            "burst slots denied",
            format!(
                "{} ({})",
                workload.burst_denied_slots,
                percent(workload.burst_denial_ratio())
            ),
        )
}
