//! Threshold rules that turn aggregates into tuning advice.
//!
//! The rules live in one ordered table, [`RULES`]. Each rule is a pure
//! function of the two aggregates and the configured thresholds, and is
//! evaluated independently of the others. Output preserves table order.
//!
//! A rule yields a [`Verdict`]:
//!
//! - `Fire`: actionable advice.
//! - `Note`: an informational statement; emitted, but it does not count as
//!   advice when deciding whether the steady-state fallback applies.
//! - `Pass`: nothing to say.
//!
//! When no rule fires, a single steady-state statement is emitted.

#[cfg(test)]
mod tests;

use serde::Serialize;

use crate::admission::{AdmissionAggregate, REASON_CALL_RESULT_GAP, REASON_HOST_PRESSURE};
use crate::config::AnalysisConfig;
use crate::tally::{percent, ratio};
use crate::workload::WorkloadAggregate;

/// Run-denial code that indicates the run cap was hit.
pub const RUN_CAP_REACHED: &str = "RUN_CAP_REACHED";

/// Slot-denial code that indicates the slot cap was hit.
pub const SLOT_CAP_REACHED: &str = "SLOT_CAP_REACHED";

/// Identifier of the fallback emitted when no rule fires.
pub const STEADY_STATE_RULE: &str = "steady-state";

const STEADY_STATE_MESSAGE: &str = "No urgent threshold change indicated from this run; keep \
                                    defaults and continue periodic soak runs.";

/// Outcome of evaluating one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Actionable advice.
    Fire(String),
    /// Informational statement that does not suppress the fallback.
    Note(String),
    /// The rule has nothing to say.
    Pass,
}

/// How a recommendation should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Change a tunable.
    Action,
    /// Investigate before trusting the numbers.
    Warning,
    /// A guardrail behaved as intended.
    Signal,
    /// Informational.
    Info,
}

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleInputs<'a> {
    /// Admission-side aggregate.
    pub admission: &'a AdmissionAggregate,
    /// Workload-side aggregate.
    pub workload: &'a WorkloadAggregate,
    /// Thresholds and tunable names.
    pub config: &'a AnalysisConfig,
}

/// One entry of the rule table.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Stable identifier.
    pub id: &'static str,
    /// Severity of a `Fire` verdict; notes are always [`Severity::Info`].
    pub severity: Severity,
    /// The condition and message.
    pub evaluate: fn(&RuleInputs<'_>) -> Verdict,
}

/// The rule table, in output order.
pub const RULES: &[Rule] = &[
    Rule {
        id: "run-cap",
        severity: Severity::Action,
        evaluate: run_cap,
    },
    Rule {
        id: "slot-cap",
        severity: Severity::Action,
        evaluate: slot_cap,
    },
    Rule {
        id: "gap-breaker",
        severity: Severity::Action,
        evaluate: gap_breaker,
    },
    Rule {
        id: "depth-guard",
        severity: Severity::Signal,
        evaluate: depth_guard,
    },
    Rule {
        id: "denial-inflation",
        severity: Severity::Warning,
        evaluate: denial_inflation,
    },
    Rule {
        id: "pressure-freshness",
        severity: Severity::Warning,
        evaluate: pressure_freshness,
    },
];

/// One emitted recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    /// Identifier of the rule that produced it.
    pub rule: &'static str,
    /// How to read it.
    pub severity: Severity,
    /// Human-readable text.
    pub message: String,
}

/// Evaluates the rule table against both aggregates.
///
/// Returns recommendations in table order, or the single steady-state
/// statement appended when no rule fired.
#[must_use]
pub fn evaluate(
    admission: &AdmissionAggregate,
    workload: &WorkloadAggregate,
    config: &AnalysisConfig,
) -> Vec<Recommendation> {
    let inputs = RuleInputs {
        admission,
        workload,
        config,
    };

    let mut out = Vec::new();
    let mut fired = false;
    for rule in RULES {
        match (rule.evaluate)(&inputs) {
            Verdict::Fire(message) => {
                fired = true;
                out.push(Recommendation {
                    rule: rule.id,
                    severity: rule.severity,
                    message,
                });
            },
            Verdict::Note(message) => out.push(Recommendation {
                rule: rule.id,
                severity: Severity::Info,
                message,
            }),
            Verdict::Pass => {},
        }
    }

    if !fired {
        out.push(Recommendation {
            rule: STEADY_STATE_RULE,
            severity: Severity::Info,
            message: STEADY_STATE_MESSAGE.to_string(),
        });
    }
    out
}

/// Recommendation messages under the default configuration.
#[must_use]
pub fn recommend(admission: &AdmissionAggregate, workload: &WorkloadAggregate) -> Vec<String> {
    evaluate(admission, workload, &AnalysisConfig::default())
        .into_iter()
        .map(|rec| rec.message)
        .collect()
}

// ============================================================================
// Rules
// ============================================================================

fn run_cap(inputs: &RuleInputs<'_>) -> Verdict {
    let tunable = &inputs.config.tunables.run_cap;
    let hits = inputs.admission.run_denials.get(RUN_CAP_REACHED);
    if hits > 0 {
        Verdict::Fire(format!(
            "{RUN_CAP_REACHED} denials observed ({hits}). Consider raising {tunable} or \
             reducing background fan-out."
        ))
    } else {
        Verdict::Note(format!(
            "No {RUN_CAP_REACHED} denials observed; no evidence supports raising {tunable}."
        ))
    }
}

fn slot_cap(inputs: &RuleInputs<'_>) -> Verdict {
    let RuleInputs {
        admission,
        workload,
        config,
    } = *inputs;
    if admission.slot_denials.get(SLOT_CAP_REACHED) == 0 {
        return Verdict::Pass;
    }

    let tunable = &config.tunables.slot_cap;
    if workload.burst_denied_slots > 0 && workload.burst_granted_slots > 0 {
        return Verdict::Fire(format!(
            "{SLOT_CAP_REACHED} denials are dominated by burst probes ({} of burst slot \
             requests denied). Keep {tunable} unless interactive lanes starve.",
            percent(workload.burst_denial_ratio())
        ));
    }

    let slot_ratio = organic_slot_denial_ratio(admission, workload);
    let critical_share = admission.critical_sample_share();
    if slot_ratio > config.thresholds.slot_denial_ratio
        && critical_share < config.thresholds.critical_share_ceiling
    {
        return Verdict::Fire(format!(
            "High slot denial ratio ({}) with low critical pressure share ({}). Consider \
             tuning {tunable} and/or team concurrency defaults.",
            percent(slot_ratio),
            percent(critical_share)
        ));
    }
    Verdict::Pass
}

/// Slot denial ratio with burst-probe slot requests taken out.
fn organic_slot_denial_ratio(admission: &AdmissionAggregate, workload: &WorkloadAggregate) -> f64 {
    let denied = admission
        .total_slot_denied
        .saturating_sub(workload.burst_denied_slots);
    let allowed = admission
        .total_slot_allowed
        .saturating_sub(workload.burst_granted_slots);
    ratio(denied, allowed + denied)
}

fn gap_breaker(inputs: &RuleInputs<'_>) -> Verdict {
    let trips = inputs.admission.breaker_trips.get(REASON_CALL_RESULT_GAP);
    let thresholds = &inputs.config.thresholds;
    if trips < thresholds.gap_trip_min {
        return Verdict::Pass;
    }

    let tunables = &inputs.config.tunables;
    Verdict::Fire(format!(
        "Frequent {REASON_CALL_RESULT_GAP} breaker trips ({trips}). Review tool_call/tool_result \
         pairing and tighten the breaker: {}={}, {}={}, {}={}.",
        tunables.breaker_cooldown,
        thresholds.suggested_cooldown_ms,
        tunables.gap_threshold,
        thresholds.suggested_gap_max,
        tunables.gap_quiet_window,
        thresholds.suggested_quiet_window_ms,
    ))
}

fn depth_guard(inputs: &RuleInputs<'_>) -> Verdict {
    let workload = inputs.workload;
    let expected = &inputs.config.thresholds.expected_depth_rejection;
    let probed = workload.total_depth_probed;
    if probed == 0 || workload.depth_probe_outcomes.get(expected) != probed {
        return Verdict::Pass;
    }

    Verdict::Fire(format!(
        "Depth guard behaved as expected: {probed}/{probed} depth probes rejected with \
         {expected}."
    ))
}

fn denial_inflation(inputs: &RuleInputs<'_>) -> Verdict {
    let aggregate_ratio = inputs.admission.run_denial_ratio();
    let operational_ratio = inputs.workload.operational_denial_ratio();
    if aggregate_ratio <= inputs.config.thresholds.inflated_run_denial_ratio
        || operational_ratio >= aggregate_ratio
    {
        return Verdict::Pass;
    }

    Verdict::Fire(format!(
        "Aggregate run denial ratio ({}) exceeds the operational ratio ({}); probe and cooldown \
         traffic is inflating it. Base capacity decisions on the operational ratio.",
        percent(aggregate_ratio),
        percent(operational_ratio)
    ))
}

fn pressure_freshness(inputs: &RuleInputs<'_>) -> Verdict {
    let admission = inputs.admission;
    if admission.critical_samples == 0 || admission.breaker_trips.get(REASON_HOST_PRESSURE) > 0 {
        return Verdict::Pass;
    }

    Verdict::Fire(format!(
        "Critical pressure samples observed ({}) without {REASON_HOST_PRESSURE} breaker trips. \
         Verify pressure freshness window and ops-watchdog log feed.",
        admission.critical_samples
    ))
}
