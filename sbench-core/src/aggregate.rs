//! Cross-scenario summarization.
//!
//! Pure functions over scenario results; the arithmetic edge cases
//! (zero baselines, zero totals) are defined values, never panics.

use serde::{Serialize, Serializer};

use crate::engine::ScenarioResult;
use crate::sampling::round2;

/// Percentage reduction of `other` relative to `baseline`; 0.0 when the
/// baseline is 0.
pub fn reduction_percent(baseline: f64, other: f64) -> f64 {
    if baseline <= 0.0 {
        return 0.0;
    }
    (baseline - other) / baseline * 100.0
}

/// Compression ratio `baseline / other`. Unbounded (`+inf`) when `other`
/// is 0 and the baseline is positive; 0.0 when both are 0.
pub fn compression_ratio(baseline: f64, other: f64) -> f64 {
    if other == 0.0 {
        if baseline == 0.0 { 0.0 } else { f64::INFINITY }
    } else {
        baseline / other
    }
}

// JSON has no Infinity literal; an unbounded ratio serializes as null.
fn serialize_ratio<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

/// Totals and derived statistics across all scenarios of one run.
#[derive(Debug, Clone, Serialize)]
pub struct EfficiencySummary {
    pub scenario_count: usize,
    pub baseline_total_tokens: usize,
    pub structured_total_tokens: usize,
    pub baseline_total_latency_ms: f64,
    pub structured_total_latency_ms: f64,
    pub baseline_completed: usize,
    pub structured_completed: usize,
    pub token_reduction_percent: f64,
    #[serde(serialize_with = "serialize_ratio")]
    pub token_compression_x: f64,
}

/// Sum and derive the summary for a list of scenario results.
pub fn summarize_results(results: &[ScenarioResult]) -> EfficiencySummary {
    let baseline_total_tokens: usize =
        results.iter().map(|r| r.baseline.tokens_to_completion).sum();
    let structured_total_tokens: usize = results
        .iter()
        .map(|r| r.structured.tokens_to_completion)
        .sum();
    let baseline_total_latency_ms: f64 = results
        .iter()
        .map(|r| r.baseline.latency_to_completion_ms)
        .sum();
    let structured_total_latency_ms: f64 = results
        .iter()
        .map(|r| r.structured.latency_to_completion_ms)
        .sum();

    EfficiencySummary {
        scenario_count: results.len(),
        baseline_total_tokens,
        structured_total_tokens,
        baseline_total_latency_ms: round2(baseline_total_latency_ms),
        structured_total_latency_ms: round2(structured_total_latency_ms),
        baseline_completed: results.iter().filter(|r| r.baseline.completed).count(),
        structured_completed: results.iter().filter(|r| r.structured.completed).count(),
        token_reduction_percent: round2(reduction_percent(
            baseline_total_tokens as f64,
            structured_total_tokens as f64,
        )),
        token_compression_x: compression_ratio(
            baseline_total_tokens as f64,
            structured_total_tokens as f64,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StrategyOutcome;

    fn outcome(strategy: &str, tokens: usize, latency: f64, completed: bool) -> StrategyOutcome {
        StrategyOutcome {
            strategy: strategy.into(),
            attempts: Vec::new(),
            attempt_count: 1,
            tokens_to_completion: tokens,
            latency_to_completion_ms: latency,
            completed,
        }
    }

    fn result(baseline_tokens: usize, structured_tokens: usize) -> ScenarioResult {
        ScenarioResult {
            id: "s".into(),
            objective: "o".into(),
            baseline: outcome("grep", baseline_tokens, 100.0, true),
            structured: outcome("structured", structured_tokens, 40.0, true),
            token_reduction_percent: 0.0,
        }
    }

    #[test]
    fn reduction_guards_zero_baseline() {
        assert_eq!(reduction_percent(0.0, 500.0), 0.0);
        assert_eq!(reduction_percent(1000.0, 250.0), 75.0);
    }

    #[test]
    fn compression_is_unbounded_when_other_is_zero() {
        assert!(compression_ratio(100.0, 0.0).is_infinite());
        assert_eq!(compression_ratio(0.0, 0.0), 0.0);
        assert_eq!(compression_ratio(100.0, 25.0), 4.0);
    }

    #[test]
    fn summary_totals_and_counts() {
        let results = vec![result(1000, 200), result(500, 100)];
        let summary = summarize_results(&results);
        assert_eq!(summary.scenario_count, 2);
        assert_eq!(summary.baseline_total_tokens, 1500);
        assert_eq!(summary.structured_total_tokens, 300);
        assert_eq!(summary.baseline_completed, 2);
        assert_eq!(summary.token_reduction_percent, 80.0);
        assert_eq!(summary.token_compression_x, 5.0);
        assert_eq!(summary.baseline_total_latency_ms, 200.0);
        assert_eq!(summary.structured_total_latency_ms, 80.0);
    }

    #[test]
    fn summary_of_empty_results_is_all_zero() {
        let summary = summarize_results(&[]);
        assert_eq!(summary.scenario_count, 0);
        assert_eq!(summary.baseline_total_tokens, 0);
        assert_eq!(summary.token_reduction_percent, 0.0);
        assert_eq!(summary.token_compression_x, 0.0);
    }

    #[test]
    fn unbounded_compression_serializes_as_null() {
        let summary = summarize_results(&[result(100, 0)]);
        assert!(summary.token_compression_x.is_infinite());
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["token_compression_x"].is_null());
    }
}
