//! Admission-control telemetry: events, status samples and their reduction.
//!
//! The admission controller logs every grant, denial, release and breaker
//! trip, and a watchdog samples its live status periodically. This module
//! replays both streams into one [`AdmissionAggregate`].
//!
//! # Active-count reconstruction
//!
//! ```text
//! run_allowed  --> active_runs += 1, raise max
//! run_end      --> active_runs -= 1, clamped at 0
//! slot_allowed --> active_slots += 1, raise max
//! slot_release --> active_slots -= 1, clamped at 0
//! ```
//!
//! Logs may begin mid-run, so unmatched ends and releases are expected and
//! clamp at zero. Status samples then raise the high-water marks to whatever
//! the controller itself reported. Taking the larger of the two is an
//! approximation: a peak that falls between two samples and before the first
//! logged grant is still missed.


use serde::Serialize;

use crate::record::{self, Record};
use crate::reducer::{Reducer, ReducerContext, replay};
use crate::tally::{LabelCounter, ratio};

/// Default label for an event with no `kind`.
pub const UNKNOWN_KIND: &str = "unknown";

/// Default label for a denial with no `code`.
pub const UNKNOWN_CODE: &str = "UNKNOWN";

/// Default label for a breaker trip with no `reason`.
pub const UNKNOWN_REASON: &str = "unknown";

/// Breaker trip reason for missing tool results.
pub const REASON_CALL_RESULT_GAP: &str = "call_result_gap";

/// Breaker trip reason for host pressure.
pub const REASON_HOST_PRESSURE: &str = "host_pressure";

/// Kinds of admission events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionKind {
    /// A run was admitted.
    RunAllowed,
    /// A run was refused.
    RunDenied,
    /// An admitted run finished.
    RunEnd,
    /// A slot was granted.
    SlotAllowed,
    /// A slot was refused.
    SlotDenied,
    /// A granted slot was returned.
    SlotRelease,
    /// A tool call was refused by the gate.
    ToolGateDenied,
    /// The breaker opened.
    CircuitOpen,
    /// Any other kind; still counted in the kind histogram.
    Other,
}

impl AdmissionKind {
    /// Maps a raw `kind` label to its variant.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label {
            "run_allowed" => Self::RunAllowed,
            "run_denied" => Self::RunDenied,
            "run_end" => Self::RunEnd,
            "slot_allowed" => Self::SlotAllowed,
            "slot_denied" => Self::SlotDenied,
            "slot_release" => Self::SlotRelease,
            "tool_gate_denied" => Self::ToolGateDenied,
            "circuit_open" => Self::CircuitOpen,
            _ => Self::Other,
        }
    }
}

/// One line of the admission event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionEvent {
    /// Classified kind.
    pub kind: AdmissionKind,
    /// The raw kind label, as counted in the histogram.
    pub kind_label: String,
    /// Denial code, when present.
    pub code: Option<String>,
    /// Breaker trip reason, when present.
    pub reason: Option<String>,
    /// Event timestamp (milliseconds since the epoch, 0 when absent).
    pub ts: i64,
}

impl AdmissionEvent {
    /// Builds an event with no code or reason.
    #[must_use]
    pub fn new(kind_label: impl Into<String>) -> Self {
        let kind_label = kind_label.into();
        Self {
            kind: AdmissionKind::parse(&kind_label),
            kind_label,
            code: None,
            reason: None,
            ts: 0,
        }
    }

    /// Sets the denial code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the breaker trip reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_ts(mut self, ts: i64) -> Self {
        self.ts = ts;
        self
    }

    /// Reads an event from a loosely-typed record.
    #[must_use]
    pub fn from_record(row: &Record) -> Self {
        let kind_label = record::label(row, "kind", UNKNOWN_KIND);
        Self {
            kind: AdmissionKind::parse(&kind_label),
            kind_label,
            code: record::opt_label(row, "code"),
            reason: record::opt_label(row, "reason"),
            ts: record::integer(row, "ts"),
        }
    }

    fn code_or_default(&self) -> &str {
        self.code.as_deref().unwrap_or(UNKNOWN_CODE)
    }
}

/// Host pressure classification reported in a status sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureSeverity {
    /// Normal load (also the default for anything unrecognized).
    #[default]
    Ok,
    /// Elevated load.
    Warn,
    /// Critical load.
    Critical,
}

impl PressureSeverity {
    /// Maps a raw severity label; unrecognized labels read as `Ok`.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label {
            "critical" => Self::Critical,
            "warn" => Self::Warn,
            _ => Self::Ok,
        }
    }
}

/// Breaker status reported in a status sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    /// Admission is blocked.
    Open,
    /// Admission is flowing (also the default for anything unrecognized).
    #[default]
    Closed,
}

impl CircuitStatus {
    /// Maps a raw status label; only `"open"` reads as `Open`.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        if label == "open" { Self::Open } else { Self::Closed }
    }
}

/// One periodic controller status snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSample {
    /// Runs the controller reported as active.
    pub active_runs: i64,
    /// Slots the controller reported as active.
    pub active_slots: i64,
    /// Largest outstanding call/result gap.
    pub max_gap: i64,
    /// Host pressure classification.
    pub severity: PressureSeverity,
    /// Breaker status.
    pub circuit: CircuitStatus,
}

impl StatusSample {
    /// Reads a sample from a loosely-typed record.
    ///
    /// `pressure.severity` defaults to `"ok"` and `circuit.status` to
    /// `"closed"`; a missing or non-object `pressure`/`circuit` reads as
    /// empty.
    #[must_use]
    pub fn from_record(row: &Record) -> Self {
        let empty = Record::new();
        let pressure = record::object(row, "pressure").unwrap_or(&empty);
        let circuit = record::object(row, "circuit").unwrap_or(&empty);
        Self {
            active_runs: record::integer(row, "activeRuns"),
            active_slots: record::integer(row, "activeSlots"),
            max_gap: record::integer(row, "maxGap"),
            severity: PressureSeverity::parse(&record::label(pressure, "severity", "ok")),
            circuit: CircuitStatus::parse(&record::label(circuit, "status", "closed")),
        }
    }
}

/// Aggregate reconstructed from the admission log and status samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdmissionAggregate {
    /// Events per raw kind label.
    pub event_counts: LabelCounter,
    /// Run denials per code.
    pub run_denials: LabelCounter,
    /// Slot denials per code.
    pub slot_denials: LabelCounter,
    /// Tool-gate denials per code.
    pub tool_gate_denials: LabelCounter,
    /// Breaker trips per reason.
    pub breaker_trips: LabelCounter,

    /// Total `run_allowed` events.
    pub total_run_allowed: u64,
    /// Total `run_denied` events.
    pub total_run_denied: u64,
    /// Total `slot_allowed` events.
    pub total_slot_allowed: u64,
    /// Total `slot_denied` events.
    pub total_slot_denied: u64,
    /// Total `tool_gate_denied` events.
    pub total_tool_gate_denied: u64,

    /// Live run counter at the end of the event stream.
    pub active_runs: u64,
    /// Live slot counter at the end of the event stream.
    pub active_slots: u64,
    /// Run high-water mark derived from events alone.
    pub event_max_active_runs: u64,
    /// Slot high-water mark derived from events alone.
    pub event_max_active_slots: u64,
    /// Run high-water mark reported by status samples alone.
    pub status_max_active_runs: u64,
    /// Slot high-water mark reported by status samples alone.
    pub status_max_active_slots: u64,
    /// Reconciled run high-water mark (larger of the two sources).
    pub max_active_runs: u64,
    /// Reconciled slot high-water mark (larger of the two sources).
    pub max_active_slots: u64,
    /// Largest call/result gap any sample reported.
    pub max_gap: u64,

    /// Samples with `pressure.severity == "critical"`.
    pub critical_samples: u64,
    /// Samples with `pressure.severity == "warn"`.
    pub warn_samples: u64,
    /// All other samples.
    pub ok_samples: u64,
    /// Samples with `circuit.status == "open"`.
    pub circuit_open_samples: u64,
    /// All other samples.
    pub circuit_closed_samples: u64,

    /// Earliest positive event timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_ts: Option<i64>,
    /// Latest positive event timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ts: Option<i64>,
}

impl AdmissionAggregate {
    /// Share of run requests that were denied.
    #[must_use]
    pub fn run_denial_ratio(&self) -> f64 {
        ratio(
            self.total_run_denied,
            self.total_run_allowed + self.total_run_denied,
        )
    }

    /// Share of slot requests that were denied.
    #[must_use]
    pub fn slot_denial_ratio(&self) -> f64 {
        ratio(
            self.total_slot_denied,
            self.total_slot_allowed + self.total_slot_denied,
        )
    }

    /// Number of status samples folded.
    #[must_use]
    pub const fn status_samples(&self) -> u64 {
        self.critical_samples + self.warn_samples + self.ok_samples
    }

    /// Share of status samples reporting critical pressure.
    #[must_use]
    pub fn critical_sample_share(&self) -> f64 {
        ratio(self.critical_samples, self.status_samples())
    }
}

/// Input to the [`AdmissionReducer`]: either stream, interleaved freely.
#[derive(Debug, Clone, Copy)]
pub enum AdmissionInput<'a> {
    /// An admission log event.
    Event(&'a AdmissionEvent),
    /// A status sample.
    Status(&'a StatusSample),
}

/// Reducer that folds admission events and status samples.
#[derive(Debug, Default)]
pub struct AdmissionReducer {
    state: AdmissionAggregate,
}

impl AdmissionReducer {
    /// Creates an empty reducer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_event(&mut self, event: &AdmissionEvent) {
        let state = &mut self.state;
        state.event_counts.increment(&event.kind_label);
        if event.ts > 0 {
            state.first_ts = Some(state.first_ts.map_or(event.ts, |ts| ts.min(event.ts)));
            state.last_ts = Some(state.last_ts.map_or(event.ts, |ts| ts.max(event.ts)));
        }

        match event.kind {
            AdmissionKind::RunAllowed => {
                state.total_run_allowed += 1;
                state.active_runs += 1;
                state.event_max_active_runs = state.event_max_active_runs.max(state.active_runs);
                state.max_active_runs = state.max_active_runs.max(state.active_runs);
            },
            AdmissionKind::RunEnd => {
                state.active_runs = state.active_runs.saturating_sub(1);
            },
            AdmissionKind::RunDenied => {
                state.total_run_denied += 1;
                state.run_denials.increment(event.code_or_default());
            },
            AdmissionKind::SlotAllowed => {
                state.total_slot_allowed += 1;
                state.active_slots += 1;
                state.event_max_active_slots =
                    state.event_max_active_slots.max(state.active_slots);
                state.max_active_slots = state.max_active_slots.max(state.active_slots);
            },
            AdmissionKind::SlotRelease => {
                state.active_slots = state.active_slots.saturating_sub(1);
            },
            AdmissionKind::SlotDenied => {
                state.total_slot_denied += 1;
                state.slot_denials.increment(event.code_or_default());
            },
            AdmissionKind::ToolGateDenied => {
                state.total_tool_gate_denied += 1;
                state.tool_gate_denials.increment(event.code_or_default());
            },
            AdmissionKind::CircuitOpen => {
                state
                    .breaker_trips
                    .increment(event.reason.as_deref().unwrap_or(UNKNOWN_REASON));
            },
            AdmissionKind::Other => {},
        }
    }

    fn apply_status(&mut self, sample: &StatusSample) {
        let state = &mut self.state;
        let runs = record::non_negative(sample.active_runs);
        let slots = record::non_negative(sample.active_slots);

        state.status_max_active_runs = state.status_max_active_runs.max(runs);
        state.status_max_active_slots = state.status_max_active_slots.max(slots);
        state.max_active_runs = state.max_active_runs.max(runs);
        state.max_active_slots = state.max_active_slots.max(slots);
        state.max_gap = state.max_gap.max(record::non_negative(sample.max_gap));

        match sample.severity {
            PressureSeverity::Critical => state.critical_samples += 1,
            PressureSeverity::Warn => state.warn_samples += 1,
            PressureSeverity::Ok => state.ok_samples += 1,
        }
        match sample.circuit {
            CircuitStatus::Open => state.circuit_open_samples += 1,
            CircuitStatus::Closed => state.circuit_closed_samples += 1,
        }
    }
}

impl Reducer for AdmissionReducer {
    type Input<'a> = AdmissionInput<'a>;
    type State = AdmissionAggregate;

    fn name(&self) -> &'static str {
        "admission"
    }

    fn apply(&mut self, input: AdmissionInput<'_>, _ctx: &ReducerContext) {
        match input {
            AdmissionInput::Event(event) => self.apply_event(event),
            AdmissionInput::Status(sample) => self.apply_status(sample),
        }
    }

    fn state(&self) -> &Self::State {
        &self.state
    }

    fn reset(&mut self) {
        self.state = AdmissionAggregate::default();
    }

    fn into_state(self) -> Self::State {
        self.state
    }
}

/// Replays `events` in order, then `statuses`, into a frozen aggregate.
///
/// Pure: no I/O and no state survives between calls.
#[must_use]
pub fn reduce(events: &[AdmissionEvent], statuses: &[StatusSample]) -> AdmissionAggregate {
    let mut reducer = AdmissionReducer::new();
    replay(
        &mut reducer,
        events
            .iter()
            .map(AdmissionInput::Event)
            .chain(statuses.iter().map(AdmissionInput::Status)),
    );
    reducer.into_state()
}
