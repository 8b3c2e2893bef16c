//! Rule-by-rule tests for the recommendation table.

use serde_json::json;

use super::*;
use crate::admission::{self, AdmissionEvent, CircuitStatus, PressureSeverity, StatusSample};
use crate::tally::LabelCounter;
use crate::workload::{self, WorkloadEvent};

fn rule_ids(recs: &[Recommendation]) -> Vec<&'static str> {
    recs.iter().map(|rec| rec.rule).collect()
}

fn counter(labels: &[(&str, u64)]) -> LabelCounter {
    let mut counter = LabelCounter::new();
    for (label, count) in labels {
        counter.add(label, *count);
    }
    counter
}

fn inputs_eval(admission: &AdmissionAggregate, workload: &WorkloadAggregate) -> Vec<Recommendation> {
    evaluate(admission, workload, &AnalysisConfig::default())
}

fn status(severity: &str) -> StatusSample {
    StatusSample {
        severity: PressureSeverity::parse(severity),
        circuit: CircuitStatus::Closed,
        ..StatusSample::default()
    }
}

#[test]
fn test_run_cap_scenario_suggests_raising_cap() {
    let mut log: Vec<AdmissionEvent> = (0..5).map(|_| AdmissionEvent::new("run_allowed")).collect();
    log.extend((0..3).map(|_| AdmissionEvent::new("run_end")));
    log.extend((0..2).map(|_| AdmissionEvent::new("run_denied").with_code(RUN_CAP_REACHED)));

    let messages = recommend(&admission::reduce(&log, &[]), &WorkloadAggregate::default());

    assert!(
        messages
            .iter()
            .any(|m| m.contains("Consider raising PI_ORCH_ADM_MAX_RUNS")),
        "{messages:?}"
    );
    assert!(!messages.iter().any(|m| m.contains("No urgent threshold change")));
}

#[test]
fn test_quiet_run_emits_note_and_fallback() {
    let recs = inputs_eval(&AdmissionAggregate::default(), &WorkloadAggregate::default());

    assert_eq!(rule_ids(&recs), vec!["run-cap", STEADY_STATE_RULE]);
    assert_eq!(recs[0].severity, Severity::Info);
    assert!(recs[0].message.contains("no evidence supports raising"));
    assert!(recs[1].message.starts_with("No urgent threshold change"));
}

#[test]
fn test_slot_cap_prefers_burst_explanation() {
    let admission = AdmissionAggregate {
        slot_denials: counter(&[(SLOT_CAP_REACHED, 8)]),
        total_slot_allowed: 2,
        total_slot_denied: 8,
        ..AdmissionAggregate::default()
    };
    let workload = WorkloadAggregate {
        burst_granted_slots: 6,
        burst_denied_slots: 4,
        ..WorkloadAggregate::default()
    };

    let recs = inputs_eval(&admission, &workload);
    let slot = recs.iter().find(|rec| rec.rule == "slot-cap").unwrap();

    assert!(slot.message.contains("40.0% of burst slot requests denied"), "{}", slot.message);
    assert!(slot.message.contains("Keep PI_ORCH_ADM_MAX_SLOTS"));
}

#[test]
fn test_slot_cap_organic_branch_respects_pressure() {
    let mut admission = AdmissionAggregate {
        slot_denials: counter(&[(SLOT_CAP_REACHED, 4)]),
        total_slot_allowed: 6,
        total_slot_denied: 4,
        ok_samples: 19,
        critical_samples: 1,
        ..AdmissionAggregate::default()
    };

    let recs = inputs_eval(&admission, &WorkloadAggregate::default());
    let slot = recs.iter().find(|rec| rec.rule == "slot-cap").unwrap();
    assert!(slot.message.contains("High slot denial ratio (40.0%)"), "{}", slot.message);

    admission.critical_samples = 5;
    let recs = inputs_eval(&admission, &WorkloadAggregate::default());
    assert!(!rule_ids(&recs).contains(&"slot-cap"));
}

#[test]
fn test_slot_cap_organic_ratio_excludes_burst_slots() {
    let admission = AdmissionAggregate {
        slot_denials: counter(&[(SLOT_CAP_REACHED, 8)]),
        total_slot_allowed: 6,
        total_slot_denied: 8,
        ok_samples: 20,
        ..AdmissionAggregate::default()
    };
    let mut workload = WorkloadAggregate {
        burst_runs: 1,
        burst_denied_slots: 4,
        ..WorkloadAggregate::default()
    };

    let recs = inputs_eval(&admission, &workload);
    let slot = recs.iter().find(|rec| rec.rule == "slot-cap").unwrap();
    assert!(slot.message.contains("High slot denial ratio (40.0%)"), "{}", slot.message);

    workload.burst_denied_slots = 7;
    let recs = inputs_eval(&admission, &workload);
    assert!(!rule_ids(&recs).contains(&"slot-cap"));
}

#[test]
fn test_slot_cap_needs_cap_code() {
    let admission = AdmissionAggregate {
        slot_denials: counter(&[("TEAM_LIMIT", 9)]),
        total_slot_denied: 9,
        ..AdmissionAggregate::default()
    };

    let recs = inputs_eval(&admission, &WorkloadAggregate::default());
    assert!(!rule_ids(&recs).contains(&"slot-cap"));
}

#[test]
fn test_gap_breaker_threshold_and_numbers() {
    let mut admission = AdmissionAggregate {
        breaker_trips: counter(&[(REASON_CALL_RESULT_GAP, 2)]),
        ..AdmissionAggregate::default()
    };
    assert!(!rule_ids(&inputs_eval(&admission, &WorkloadAggregate::default())).contains(&"gap-breaker"));

    admission.breaker_trips.increment(REASON_CALL_RESULT_GAP);
    let recs = inputs_eval(&admission, &WorkloadAggregate::default());
    let gap = recs.iter().find(|rec| rec.rule == "gap-breaker").unwrap();

    assert_eq!(gap.severity, Severity::Action);
    assert!(gap.message.contains("PI_ORCH_ADM_BREAKER_COOLDOWN_MS=120000"), "{}", gap.message);
    assert!(gap.message.contains("PI_ORCH_ADM_GAP_MAX=2"));
    assert!(gap.message.contains("PI_ORCH_ADM_GAP_RESET_QUIET_MS=30000"));
}

#[test]
fn test_depth_guard_scenario() {
    let events: Vec<WorkloadEvent> = (0..10)
        .map(|_| {
            let detail = json!({"ok": false, "rejection": "DEPTH_EXCEEDED"});
            WorkloadEvent::new("depth_probe", detail.as_object().cloned().unwrap())
        })
        .collect();
    let workload = workload::reduce(&events);

    let recs = inputs_eval(&AdmissionAggregate::default(), &workload);
    let depth = recs.iter().find(|rec| rec.rule == "depth-guard").unwrap();

    assert_eq!(depth.severity, Severity::Signal);
    assert!(depth.message.contains("10/10 depth probes rejected with DEPTH_EXCEEDED"));
    assert!(!rule_ids(&recs).contains(&STEADY_STATE_RULE));
}

#[test]
fn test_depth_guard_needs_every_probe_rejected_with_expected_code() {
    let workload = WorkloadAggregate {
        total_depth_probed: 10,
        depth_probe_rejected: 10,
        depth_probe_outcomes: counter(&[("DEPTH_EXCEEDED", 9), ("UNKNOWN", 1)]),
        ..WorkloadAggregate::default()
    };
    assert!(!rule_ids(&inputs_eval(&AdmissionAggregate::default(), &workload)).contains(&"depth-guard"));

    let none = WorkloadAggregate::default();
    assert!(!rule_ids(&inputs_eval(&AdmissionAggregate::default(), &none)).contains(&"depth-guard"));
}

#[test]
fn test_denial_inflation_compares_ratios() {
    let admission = AdmissionAggregate {
        total_run_allowed: 6,
        total_run_denied: 4,
        ..AdmissionAggregate::default()
    };
    let calm = WorkloadAggregate {
        total_completed: 19,
        total_operational_denied: 1,
        ..WorkloadAggregate::default()
    };
    let strained = WorkloadAggregate {
        total_completed: 5,
        total_operational_denied: 5,
        ..WorkloadAggregate::default()
    };

    let recs = inputs_eval(&admission, &calm);
    let inflation = recs.iter().find(|rec| rec.rule == "denial-inflation").unwrap();
    assert!(inflation.message.contains("(40.0%)"));
    assert!(inflation.message.contains("(5.0%)"));

    assert!(!rule_ids(&inputs_eval(&admission, &strained)).contains(&"denial-inflation"));
}

#[test]
fn test_pressure_freshness_is_conjunctive() {
    let all_ok: Vec<StatusSample> = (0..8).map(|_| status("ok")).collect();
    let log = vec![AdmissionEvent::new("circuit_open").with_reason("call_result_gap")];
    let recs = inputs_eval(&admission::reduce(&log, &all_ok), &WorkloadAggregate::default());
    assert!(!rule_ids(&recs).contains(&"pressure-freshness"));

    let critical = [status("critical"), status("ok")];
    let tripped = vec![AdmissionEvent::new("circuit_open").with_reason(REASON_HOST_PRESSURE)];
    let recs = inputs_eval(&admission::reduce(&tripped, &critical), &WorkloadAggregate::default());
    assert!(!rule_ids(&recs).contains(&"pressure-freshness"));

    let recs = inputs_eval(&admission::reduce(&[], &critical), &WorkloadAggregate::default());
    assert!(rule_ids(&recs).contains(&"pressure-freshness"));
}

#[test]
fn test_output_follows_table_order() {
    let admission = AdmissionAggregate {
        run_denials: counter(&[(RUN_CAP_REACHED, 3)]),
        total_run_allowed: 2,
        total_run_denied: 3,
        breaker_trips: counter(&[(REASON_CALL_RESULT_GAP, 5)]),
        critical_samples: 2,
        ..AdmissionAggregate::default()
    };
    let workload = WorkloadAggregate {
        total_completed: 10,
        total_depth_probed: 1,
        depth_probe_rejected: 1,
        depth_probe_outcomes: counter(&[("DEPTH_EXCEEDED", 1)]),
        ..WorkloadAggregate::default()
    };

    let recs = inputs_eval(&admission, &workload);

    assert_eq!(
        rule_ids(&recs),
        vec![
            "run-cap",
            "gap-breaker",
            "depth-guard",
            "denial-inflation",
            "pressure-freshness"
        ]
    );
}

#[test]
fn test_tunable_names_come_from_config() {
    let mut config = AnalysisConfig::default();
    config.tunables.run_cap = "MAX_RUNS".to_string();

    let recs = evaluate(
        &AdmissionAggregate::default(),
        &WorkloadAggregate::default(),
        &config,
    );
    assert!(recs[0].message.contains("raising MAX_RUNS"));
}

#[test]
fn test_every_rule_is_independent() {
    let admission = AdmissionAggregate::default();
    let workload = WorkloadAggregate::default();
    let config = AnalysisConfig::default();
    let inputs = RuleInputs {
        admission: &admission,
        workload: &workload,
        config: &config,
    };

    for rule in RULES {
        let first = (rule.evaluate)(&inputs);
        let second = (rule.evaluate)(&inputs);
        assert_eq!(first, second, "rule {} is not deterministic", rule.id);
    }
    assert_eq!(RULES.len(), 6);
}
