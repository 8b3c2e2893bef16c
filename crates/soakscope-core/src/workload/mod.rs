//! Workload-harness telemetry and its normalized reduction.
//!
//! The harness drives mixed traffic against the runtime and records what it
//! saw from the calling side. Some of that traffic is synthetic: depth and
//! gap probes exist to be rejected, and burst runs deliberately ask for more
//! slots than their declared parallelism. This reducer keeps that traffic
//! apart from organic runs so that expected rejections are not read as
//! capacity pressure.
//!
//! | kind            | effect                                                   |
//! |-----------------|----------------------------------------------------------|
//! | `run_denied`    | operational denial by `code`, unless it is probe traffic |
//! | `run_completed` | completion by `runKind`; burst totals when over-cap      |
//! | `depth_probe`   | outcome by `rejection` (or `ok`)                          |
//! | `gap_probe`     | outcome by `rejection` (or `ok`)                          |

use serde::Serialize;

use crate::record::{self, Record};
use crate::reducer::{Reducer, ReducerContext, replay};
use crate::tally::{LabelCounter, ratio};

/// Default label for an event with no `kind`.
pub const UNKNOWN_KIND: &str = "unknown";

/// Default label for a denial or rejection with no code.
pub const UNKNOWN_CODE: &str = "UNKNOWN";

/// Outcome label for a probe that was accepted.
pub const PROBE_ACCEPTED: &str = "ok";

/// Suffix of `runKind` values that mark synthetic probe runs.
const PROBE_RUN_KIND_SUFFIX: &str = "_probe";

/// Kinds of workload events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    /// The harness saw a run refused.
    RunDenied,
    /// A run finished.
    RunCompleted,
    /// A synthetic over-depth request.
    DepthProbe,
    /// A synthetic call/result gap injection.
    GapProbe,
    /// Anything else; counted in the kind histogram only.
    Other,
}

impl WorkloadKind {
    /// Maps a raw `kind` label to its variant.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label {
            "run_denied" => Self::RunDenied,
            "run_completed" => Self::RunCompleted,
            "depth_probe" => Self::DepthProbe,
            "gap_probe" => Self::GapProbe,
            _ => Self::Other,
        }
    }
}

/// One line of the workload event log.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadEvent {
    /// Classified kind.
    pub kind: WorkloadKind,
    /// The raw kind label, as counted in the histogram.
    pub kind_label: String,
    /// Event timestamp (milliseconds since the epoch, 0 when absent).
    pub ts: i64,
    /// Kind-specific fields.
    pub detail: Record,
}

impl WorkloadEvent {
    /// Builds an event with the given detail object.
    #[must_use]
    pub fn new(kind_label: impl Into<String>, detail: Record) -> Self {
        let kind_label = kind_label.into();
        Self {
            kind: WorkloadKind::parse(&kind_label),
            kind_label,
            ts: 0,
            detail,
        }
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_ts(mut self, ts: i64) -> Self {
        self.ts = ts;
        self
    }

    /// Reads an event from a loosely-typed record. A missing or non-object
    /// `detail` reads as empty.
    #[must_use]
    pub fn from_record(row: &Record) -> Self {
        let detail = record::object(row, "detail").cloned().unwrap_or_default();
        Self::new(record::label(row, "kind", UNKNOWN_KIND), detail)
            .with_ts(record::integer(row, "ts"))
    }

    /// Whether a `run_denied` came from synthetic probe traffic.
    fn is_probe_denial(&self) -> bool {
        record::boolean(&self.detail, "probe") == Some(true)
            || record::opt_label(&self.detail, "runKind")
                .is_some_and(|kind| kind.ends_with(PROBE_RUN_KIND_SUFFIX))
    }

    fn probe_outcome(&self) -> String {
        if record::boolean(&self.detail, "ok") == Some(true) {
            PROBE_ACCEPTED.to_string()
        } else {
            record::label(&self.detail, "rejection", UNKNOWN_CODE)
        }
    }
}

/// Aggregate of workload-harness traffic, split into organic and synthetic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkloadAggregate {
    /// Events per raw kind label.
    pub event_counts: LabelCounter,
    /// Organic run denials per code.
    pub operational_denials: LabelCounter,
    /// Completed runs per `runKind`.
    pub completed_by_kind: LabelCounter,
    /// Depth-probe outcomes (`ok` or the rejection code).
    pub depth_probe_outcomes: LabelCounter,
    /// Gap-probe outcomes (`ok` or the rejection code).
    pub gap_probe_outcomes: LabelCounter,

    /// Total `run_completed` events.
    pub total_completed: u64,
    /// `run_denied` events from organic traffic.
    pub total_operational_denied: u64,
    /// `run_denied` events excluded as probe traffic.
    pub probe_denials: u64,
    /// Total `depth_probe` events.
    pub total_depth_probed: u64,
    /// Depth probes that were rejected.
    pub depth_probe_rejected: u64,
    /// Total `gap_probe` events.
    pub total_gap_probed: u64,
    /// Gap probes that were rejected.
    pub gap_probe_rejected: u64,

    /// Completed runs that asked for more slots than their parallelism.
    pub burst_runs: u64,
    /// Slots granted to burst runs.
    pub burst_granted_slots: u64,
    /// Slots denied to burst runs.
    pub burst_denied_slots: u64,

    /// Earliest positive event timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_ts: Option<i64>,
    /// Latest positive event timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ts: Option<i64>,
}

impl WorkloadAggregate {
    /// Share of organic run attempts that the harness saw denied.
    #[must_use]
    pub fn operational_denial_ratio(&self) -> f64 {
        ratio(
            self.total_operational_denied,
            self.total_completed + self.total_operational_denied,
        )
    }

    /// Share of burst slot requests that were denied.
    #[must_use]
    pub fn burst_denial_ratio(&self) -> f64 {
        ratio(
            self.burst_denied_slots,
            self.burst_granted_slots + self.burst_denied_slots,
        )
    }

    /// Share of depth probes that were rejected.
    #[must_use]
    pub fn depth_probe_rejection_share(&self) -> f64 {
        ratio(self.depth_probe_rejected, self.total_depth_probed)
    }
}

/// Reducer that folds workload events.
#[derive(Debug, Default)]
pub struct WorkloadReducer {
    state: WorkloadAggregate,
}

impl WorkloadReducer {
    /// Creates an empty reducer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_completed(&mut self, event: &WorkloadEvent) {
        let state = &mut self.state;
        let detail = &event.detail;

        state.total_completed += 1;
        state
            .completed_by_kind
            .increment(&record::label(detail, "runKind", UNKNOWN_KIND));

        let attempts = record::integer(detail, "slotAttempts");
        let parallelism = record::integer(detail, "requestedParallelism");
        if attempts > parallelism {
            state.burst_runs += 1;
            state.burst_granted_slots = state
                .burst_granted_slots
                .saturating_add(record::non_negative(record::integer(detail, "grantedSlots")));
            state.burst_denied_slots = state
                .burst_denied_slots
                .saturating_add(record::non_negative(record::integer(detail, "deniedSlots")));
        }
    }
}

impl Reducer for WorkloadReducer {
    type Input<'a> = &'a WorkloadEvent;
    type State = WorkloadAggregate;

    fn name(&self) -> &'static str {
        "workload"
    }

    fn apply(&mut self, event: &WorkloadEvent, _ctx: &ReducerContext) {
        self.state.event_counts.increment(&event.kind_label);
        if event.ts > 0 {
            let state = &mut self.state;
            state.first_ts = Some(state.first_ts.map_or(event.ts, |ts| ts.min(event.ts)));
            state.last_ts = Some(state.last_ts.map_or(event.ts, |ts| ts.max(event.ts)));
        }

        match event.kind {
            WorkloadKind::RunDenied => {
                if event.is_probe_denial() {
                    self.state.probe_denials += 1;
                } else {
                    self.state.total_operational_denied += 1;
                    self.state
                        .operational_denials
                        .increment(&record::label(&event.detail, "code", UNKNOWN_CODE));
                }
            },
            WorkloadKind::RunCompleted => self.apply_completed(event),
            WorkloadKind::DepthProbe => {
                let outcome = event.probe_outcome();
                self.state.total_depth_probed += 1;
                if outcome != PROBE_ACCEPTED {
                    self.state.depth_probe_rejected += 1;
                }
                self.state.depth_probe_outcomes.increment(&outcome);
            },
            WorkloadKind::GapProbe => {
                let outcome = event.probe_outcome();
                self.state.total_gap_probed += 1;
                if outcome != PROBE_ACCEPTED {
                    self.state.gap_probe_rejected += 1;
                }
                self.state.gap_probe_outcomes.increment(&outcome);
            },
            WorkloadKind::Other => {},
        }
    }

    fn state(&self) -> &Self::State {
        &self.state
    }

    fn reset(&mut self) {
        self.state = WorkloadAggregate::default();
    }

    fn into_state(self) -> Self::State {
        self.state
    }
}

/// Replays `events` in order into a frozen aggregate.
#[must_use]
pub fn reduce(events: &[WorkloadEvent]) -> WorkloadAggregate {
    let mut reducer = WorkloadReducer::new();
    replay(&mut reducer, events);
    reducer.into_state()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{Value, json};

    use super::*;

    fn event(kind: &str, detail: Value) -> WorkloadEvent {
        WorkloadEvent::new(kind, detail.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_depth_probe_scenario() {
        let events: Vec<WorkloadEvent> = (0..10)
            .map(|_| event("depth_probe", json!({"ok": false, "rejection": "DEPTH_EXCEEDED"})))
            .collect();

        let aggregate = reduce(&events);

        assert_eq!(aggregate.total_depth_probed, 10);
        assert_eq!(aggregate.depth_probe_rejected, 10);
        assert_eq!(aggregate.depth_probe_outcomes.get("DEPTH_EXCEEDED"), 10);
        assert_eq!(aggregate.depth_probe_outcomes.len(), 1);
        assert!((aggregate.depth_probe_rejection_share() - 1.0).abs() < f64::EPSILON);
        assert_eq!(aggregate.total_operational_denied, 0);
    }

    #[test]
    fn test_probe_outcome_labels() {
        let events = vec![
            event("gap_probe", json!({"ok": true})),
            event("gap_probe", json!({"ok": false})),
            event("gap_probe", json!({"rejection": "GAP_TRIPPED"})),
            event("gap_probe", json!({"ok": "yes", "rejection": "GAP_TRIPPED"})),
        ];

        let aggregate = reduce(&events);

        assert_eq!(aggregate.total_gap_probed, 4);
        assert_eq!(aggregate.gap_probe_rejected, 3);
        assert_eq!(aggregate.gap_probe_outcomes.get(PROBE_ACCEPTED), 1);
        assert_eq!(aggregate.gap_probe_outcomes.get(UNKNOWN_CODE), 1);
        assert_eq!(aggregate.gap_probe_outcomes.get("GAP_TRIPPED"), 2);
    }

    #[test]
    fn test_burst_totals_only_for_over_cap_runs() {
        let events = vec![
            event(
                "run_completed",
                json!({"runKind": "team", "slotAttempts": 8, "requestedParallelism": 4,
                       "grantedSlots": 4, "deniedSlots": 4}),
            ),
            event(
                "run_completed",
                json!({"runKind": "team", "slotAttempts": 4, "requestedParallelism": 4,
                       "grantedSlots": 3, "deniedSlots": 1}),
            ),
            event(
                "run_completed",
                json!({"runKind": "chain", "slotAttempts": 6, "requestedParallelism": 2,
                       "grantedSlots": 2, "deniedSlots": 4}),
            ),
            event("run_completed", json!({})),
        ];

        let aggregate = reduce(&events);

        assert_eq!(aggregate.total_completed, 4);
        assert_eq!(aggregate.burst_runs, 2);
        assert_eq!(aggregate.burst_granted_slots, 6);
        assert_eq!(aggregate.burst_denied_slots, 8);
        assert_eq!(aggregate.completed_by_kind.get("team"), 2);
        assert_eq!(aggregate.completed_by_kind.get(UNKNOWN_KIND), 1);
        assert!((aggregate.burst_denial_ratio() - 8.0 / 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_probe_traffic_is_excluded_from_operational_denials() {
        let events = vec![
            event("run_denied", json!({"code": "RUN_CAP_REACHED", "runKind": "interactive"})),
            event("run_denied", json!({"code": "DEPTH_EXCEEDED", "runKind": "depth_probe"})),
            event("run_denied", json!({"code": "CIRCUIT_OPEN", "probe": true})),
            event("run_denied", json!({})),
            event("run_completed", json!({"runKind": "interactive"})),
            event("run_completed", json!({"runKind": "interactive"})),
        ];

        let aggregate = reduce(&events);

        assert_eq!(aggregate.total_operational_denied, 2);
        assert_eq!(aggregate.probe_denials, 2);
        assert_eq!(aggregate.operational_denials.get("RUN_CAP_REACHED"), 1);
        assert_eq!(aggregate.operational_denials.get(UNKNOWN_CODE), 1);
        assert_eq!(aggregate.operational_denials.get("DEPTH_EXCEEDED"), 0);
        assert!((aggregate.operational_denial_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_from_record_tolerates_missing_detail() {
        let rows = [
            json!({"kind": "run_completed", "ts": 1_700_000_000_000_i64}),
            json!({"kind": "depth_probe", "detail": "garbage", "ts": 1_700_000_005_000_i64}),
            json!({"detail": {"runKind": "x"}}),
        ];
        let events: Vec<WorkloadEvent> = rows
            .iter()
            .map(|row| WorkloadEvent::from_record(row.as_object().unwrap()))
            .collect();

        let aggregate = reduce(&events);

        assert_eq!(aggregate.total_completed, 1);
        assert_eq!(aggregate.depth_probe_outcomes.get(UNKNOWN_CODE), 1);
        assert_eq!(aggregate.event_counts.get(UNKNOWN_KIND), 1);
        assert_eq!(aggregate.first_ts, Some(1_700_000_000_000));
        assert_eq!(aggregate.last_ts, Some(1_700_000_005_000));
    }

    #[test]
    fn test_empty_ratios_are_zero() {
        let aggregate = reduce(&[]);
        assert!(aggregate.operational_denial_ratio().abs() < f64::EPSILON);
        assert!(aggregate.burst_denial_ratio().abs() < f64::EPSILON);
        assert!(aggregate.depth_probe_rejection_share().abs() < f64::EPSILON);
    }

    fn workload_strategy() -> impl Strategy<Value = WorkloadEvent> {
        (
            prop::sample::select(vec!["run_denied", "run_completed", "depth_probe", "gap_probe", "x"]),
            any::<bool>(),
            0i64..10,
            0i64..10,
        )
            .prop_map(|(kind, ok, attempts, parallelism)| {
                event(
                    kind,
                    json!({"ok": ok, "slotAttempts": attempts, "requestedParallelism": parallelism,
                           "grantedSlots": parallelism, "deniedSlots": attempts - parallelism}),
                )
            })
    }

    proptest! {
        #[test]
        fn prop_workload_reduction_is_idempotent(events in prop::collection::vec(workload_strategy(), 0..120)) {
            prop_assert_eq!(reduce(&events), reduce(&events));
        }

        #[test]
        fn prop_denials_partition(events in prop::collection::vec(workload_strategy(), 0..120)) {
            let aggregate = reduce(&events);
            let denied = events.iter().filter(|e| e.kind == WorkloadKind::RunDenied).count() as u64;

            prop_assert_eq!(aggregate.total_operational_denied + aggregate.probe_denials, denied);
            prop_assert_eq!(aggregate.operational_denials.total(), aggregate.total_operational_denied);
            prop_assert!(aggregate.burst_runs <= aggregate.total_completed);
        }
    }
}
