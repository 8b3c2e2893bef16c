//! Analysis configuration.
//!
//! Every field has a default, so an absent, empty or partial TOML file all
//! produce a usable [`AnalysisConfig`]. Unknown keys are rejected so that a
//! misspelled threshold fails loudly instead of silently using its default.
//!
//! ```toml
//! [inputs]
//! admission_log = "orchestration-admission.ndjson"
//! report_name = "soak-report.md"
//!
//! [thresholds]
//! slot_denial_ratio = 0.30
//! gap_trip_min = 3
//!
//! [tunables]
//! run_cap = "PI_ORCH_ADM_MAX_RUNS"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level analysis configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// File names inside the artifact directory.
    #[serde(default)]
    pub inputs: InputFiles,

    /// Numbers used by the recommendation rules.
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Parameter names quoted in recommendation text.
    #[serde(default)]
    pub tunables: TunableNames,
}

impl AnalysisConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// threshold is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML is invalid or contains unknown keys
    /// - A ratio threshold is outside `0.0..=1.0`
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.thresholds.validate()?;
        Ok(config)
    }
}

/// Input and output file names, resolved against the artifact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputFiles {
    /// Admission event log (rotations share this base name).
    pub admission_log: String,
    /// Periodic controller status samples.
    pub status_log: String,
    /// Workload-harness event log.
    pub workload_log: String,
    /// End-of-run summary carrying the policy snapshot.
    pub final_summary: String,
    /// Report file name used when no explicit output path is given.
    pub report_name: String,
}

impl Default for InputFiles {
    fn default() -> Self {
        Self {
            admission_log: "orchestration-admission.ndjson".to_string(),
            status_log: "status.ndjson".to_string(),
            workload_log: "workload.ndjson".to_string(),
            final_summary: "final-summary.json".to_string(),
            report_name: "soak-report.md".to_string(),
        }
    }
}

/// Default slot-denial ratio above which the slot cap is worth tuning.
pub const DEFAULT_SLOT_DENIAL_RATIO: f64 = 0.30;

/// Default critical-sample share below which denials are not pressure-driven.
pub const DEFAULT_CRITICAL_SHARE_CEILING: f64 = 0.10;

/// Default aggregate run-denial ratio above which inflation is suspected.
pub const DEFAULT_INFLATED_RUN_DENIAL_RATIO: f64 = 0.20;

/// Default number of gap trips that warrants breaker tuning.
pub const DEFAULT_GAP_TRIP_MIN: u64 = 3;

/// Thresholds and suggested values for the recommendation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    /// Slot-denial ratio that must be exceeded to suggest slot-cap tuning.
    pub slot_denial_ratio: f64,
    /// Critical-sample share that must not be reached for capacity advice.
    pub critical_share_ceiling: f64,
    /// Aggregate run-denial ratio above which probe inflation is checked.
    pub inflated_run_denial_ratio: f64,
    /// Minimum `call_result_gap` trips to suggest breaker tuning.
    pub gap_trip_min: u64,
    /// Rejection code a healthy depth guard returns.
    pub expected_depth_rejection: String,
    /// Breaker cooldown quoted in gap-trip advice.
    pub suggested_cooldown_ms: u64,
    /// Gap threshold quoted in gap-trip advice.
    pub suggested_gap_max: u64,
    /// Quiet window quoted in gap-trip advice.
    pub suggested_quiet_window_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            slot_denial_ratio: DEFAULT_SLOT_DENIAL_RATIO,
            critical_share_ceiling: DEFAULT_CRITICAL_SHARE_CEILING,
            inflated_run_denial_ratio: DEFAULT_INFLATED_RUN_DENIAL_RATIO,
            gap_trip_min: DEFAULT_GAP_TRIP_MIN,
            expected_depth_rejection: "DEPTH_EXCEEDED".to_string(),
            suggested_cooldown_ms: 120_000,
            suggested_gap_max: 2,
            suggested_quiet_window_ms: 30_000,
        }
    }
}

impl Thresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("slot_denial_ratio", self.slot_denial_ratio),
            ("critical_share_ceiling", self.critical_share_ceiling),
            ("inflated_run_denial_ratio", self.inflated_run_denial_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "thresholds.{name} must be within 0.0..=1.0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Human-readable names of the runtime parameters a suggestion refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TunableNames {
    /// Run concurrency cap.
    pub run_cap: String,
    /// Slot concurrency cap.
    pub slot_cap: String,
    /// Breaker cooldown duration.
    pub breaker_cooldown: String,
    /// Call/result gap threshold.
    pub gap_threshold: String,
    /// Gap-reset quiet window.
    pub gap_quiet_window: String,
}

impl Default for TunableNames {
    fn default() -> Self {
        Self {
            run_cap: "PI_ORCH_ADM_MAX_RUNS".to_string(),
            slot_cap: "PI_ORCH_ADM_MAX_SLOTS".to_string(),
            breaker_cooldown: "PI_ORCH_ADM_BREAKER_COOLDOWN_MS".to_string(),
            gap_threshold: "PI_ORCH_ADM_GAP_MAX".to_string(),
            gap_quiet_window: "PI_ORCH_ADM_GAP_RESET_QUIET_MS".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
