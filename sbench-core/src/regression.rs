//! Regression math and the dual-threshold gate decision.
//!
//! A metric only fails the gate when its relative regression exceeds the
//! configured limit *and* its absolute delta exceeds the floor. On sub-10ms
//! operations a double-digit percentage is frequently 1-2ms of scheduler
//! noise; the floor suppresses those, while the relative limit stops slow
//! operations from absorbing large absolute regressions.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::sampling::{LatencySummary, round2};

/// Relative regression in percent. Defined as 0.0 when `before <= 0`:
/// a zero or negative baseline carries no regression signal.
pub fn regression_percent(before: f64, after: f64) -> f64 {
    if before <= 0.0 {
        return 0.0;
    }
    (after - before) / before * 100.0
}

/// Signed absolute delta; positive means slower/larger.
pub fn absolute_delta(before: f64, after: f64) -> f64 {
    after - before
}

/// Gate thresholds: relative limit plus the absolute regression floor.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GateThresholds {
    pub limit_pct: f64,
    pub absolute_floor_ms: f64,
}

impl GateThresholds {
    /// The dual-threshold rule: both conditions must hold to fail.
    pub fn fails(&self, regression_pct: f64, delta_ms: f64) -> bool {
        regression_pct > self.limit_pct && delta_ms > self.absolute_floor_ms
    }
}

/// One named before/after comparison. Covers both comparator shapes:
/// baseline binary vs candidate binary, and a binary vs itself under a
/// different mode (feature-overhead bounding).
#[derive(Debug, Clone)]
pub struct MetricComparison {
    pub metric: String,
    pub before: f64,
    pub after: f64,
    pub limit_pct: f64,
}

impl MetricComparison {
    pub fn new(metric: impl Into<String>, before: f64, after: f64, limit_pct: f64) -> Self {
        Self {
            metric: metric.into(),
            before,
            after,
            limit_pct,
        }
    }
}

/// Derived maps plus the ordered list of failed metric names.
#[derive(Debug, Clone, Serialize)]
pub struct GateEvaluation {
    pub regression_pct: BTreeMap<String, f64>,
    pub regression_abs_ms: BTreeMap<String, f64>,
    pub limits: BTreeMap<String, f64>,
    pub failed: Vec<String>,
}

/// Evaluate every comparison against its limit and the shared floor.
pub fn evaluate_gate(comparisons: &[MetricComparison], absolute_floor_ms: f64) -> GateEvaluation {
    let mut regression_pct = BTreeMap::new();
    let mut regression_abs_ms = BTreeMap::new();
    let mut limits = BTreeMap::new();
    let mut failed = Vec::new();

    for cmp in comparisons {
        let pct = regression_percent(cmp.before, cmp.after);
        let delta = absolute_delta(cmp.before, cmp.after);
        let thresholds = GateThresholds {
            limit_pct: cmp.limit_pct,
            absolute_floor_ms,
        };
        if thresholds.fails(pct, delta) {
            failed.push(cmp.metric.clone());
        }
        regression_pct.insert(cmp.metric.clone(), round2(pct));
        regression_abs_ms.insert(cmp.metric.clone(), round2(delta));
        limits.insert(cmp.metric.clone(), cmp.limit_pct);
    }

    GateEvaluation {
        regression_pct,
        regression_abs_ms,
        limits,
        failed,
    }
}

/// How the numbers in a payload were produced. Field names are stable for
/// downstream consumers.
#[derive(Debug, Clone, Serialize)]
pub struct Methodology {
    pub latency_p50: &'static str,
    pub latency_p95: &'static str,
    pub measured_runs_per_metric: u32,
    pub warmup_runs_per_metric: u32,
}

impl Methodology {
    pub fn new(runs: u32, warmup: u32) -> Self {
        Self {
            latency_p50: "median",
            latency_p95: "nearest-rank",
            measured_runs_per_metric: runs,
            warmup_runs_per_metric: warmup,
        }
    }
}

/// Recorded when a capability probe forced a fallback (e.g. the baseline
/// binary predates a subcommand and the candidate is mirrored as its own
/// baseline to keep the gate deterministic and non-blocking).
#[derive(Debug, Clone, Serialize)]
pub struct CompatNote {
    pub probed: String,
    pub supported: bool,
    pub fallback: String,
}

/// Percentile summaries for both sides of a gate.
#[derive(Debug, Clone, Serialize)]
pub struct PercentileBlock {
    pub baseline: BTreeMap<String, LatencySummary>,
    pub candidate: BTreeMap<String, LatencySummary>,
}

/// The complete comparator output for one gate run. Built once; the
/// reporting layer serializes it as-is.
#[derive(Debug, Clone, Serialize)]
pub struct GatePayload {
    pub runs: u32,
    pub warmup: u32,
    pub files: usize,
    pub methodology: Methodology,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compat: Option<CompatNote>,
    pub baseline: BTreeMap<String, f64>,
    pub candidate: BTreeMap<String, f64>,
    pub percentiles: PercentileBlock,
    pub regression_pct: BTreeMap<String, f64>,
    pub regression_abs_ms: BTreeMap<String, f64>,
    pub limits: BTreeMap<String, f64>,
    pub absolute_regression_floor_ms: f64,
    pub failed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_baseline_means_no_regression_signal() {
        assert_eq!(regression_percent(0.0, 1234.0), 0.0);
        assert_eq!(regression_percent(-5.0, 1234.0), 0.0);
    }

    #[test]
    fn regression_percent_is_relative() {
        assert_eq!(regression_percent(100.0, 110.0), 10.0);
        assert_eq!(absolute_delta(100.0, 110.0), 10.0);
    }

    #[test]
    fn fast_metric_noise_is_suppressed_by_the_floor() {
        // 25% regression but only 0.5ms slower: not a failure.
        let thresholds = GateThresholds {
            limit_pct: 10.0,
            absolute_floor_ms: 3.0,
        };
        let pct = regression_percent(2.0, 2.5);
        let delta = absolute_delta(2.0, 2.5);
        assert!((pct - 25.0).abs() < 1e-9);
        assert!(!thresholds.fails(pct, delta));
    }

    #[test]
    fn slow_metric_regression_exceeding_both_fails() {
        let thresholds = GateThresholds {
            limit_pct: 10.0,
            absolute_floor_ms: 3.0,
        };
        let pct = regression_percent(100.0, 115.0);
        let delta = absolute_delta(100.0, 115.0);
        assert!(thresholds.fails(pct, delta));
    }

    #[test]
    fn improvements_never_fail() {
        let thresholds = GateThresholds {
            limit_pct: 10.0,
            absolute_floor_ms: 3.0,
        };
        let pct = regression_percent(100.0, 40.0);
        let delta = absolute_delta(100.0, 40.0);
        assert!(!thresholds.fails(pct, delta));
    }

    #[test]
    fn evaluate_gate_collects_failures_in_order() {
        let comparisons = vec![
            MetricComparison::new("fast_noise_ms", 2.0, 2.5, 10.0),
            MetricComparison::new("slow_regressed_ms", 100.0, 115.0, 10.0),
            MetricComparison::new("improved_ms", 50.0, 30.0, 10.0),
        ];
        let eval = evaluate_gate(&comparisons, 3.0);
        assert_eq!(eval.failed, vec!["slow_regressed_ms".to_string()]);
        assert_eq!(eval.regression_pct["slow_regressed_ms"], 15.0);
        assert_eq!(eval.regression_abs_ms["slow_regressed_ms"], 15.0);
        assert_eq!(eval.limits.len(), 3);
    }

    #[test]
    fn derived_maps_are_rounded() {
        let comparisons = vec![MetricComparison::new("m", 3.0, 4.0, 10.0)];
        let eval = evaluate_gate(&comparisons, 3.0);
        // 33.333...% rounds to 33.33
        assert_eq!(eval.regression_pct["m"], 33.33);
    }

    #[test]
    fn payload_serializes_with_stable_field_names() {
        let payload = GatePayload {
            runs: 5,
            warmup: 2,
            files: 800,
            methodology: Methodology::new(5, 2),
            compat: None,
            baseline: BTreeMap::from([("locate_simple_ms".to_string(), 10.0)]),
            candidate: BTreeMap::from([("locate_simple_ms".to_string(), 11.0)]),
            percentiles: PercentileBlock {
                baseline: BTreeMap::new(),
                candidate: BTreeMap::new(),
            },
            regression_pct: BTreeMap::new(),
            regression_abs_ms: BTreeMap::new(),
            limits: BTreeMap::new(),
            absolute_regression_floor_ms: 3.0,
            failed: Vec::new(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("baseline").is_some());
        assert!(json.get("candidate").is_some());
        assert!(json.get("percentiles").is_some());
        assert!(json.get("regression_pct").is_some());
        assert!(json.get("limits").is_some());
        assert!(json.get("failed").is_some());
        // compat is omitted entirely when no fallback happened
        assert!(json.get("compat").is_none());
    }
}
