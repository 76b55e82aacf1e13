//! Warmup/measured sampling and percentile reduction.
//!
//! Warmup runs let filesystem caches and process-start overhead stabilize
//! and are discarded; measured runs are strictly sequential so background
//! drift affects every sample of a metric uniformly. p50 is the standard
//! median; p95 is nearest-rank, so on small sample counts the reported
//! value is always one that was actually observed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::HarnessResult;

/// Run `op` `warmup` times discarding results, then `runs` times collecting
/// millisecond durations. Any failure aborts the whole sample set; there
/// is no partial-sample tolerance.
pub fn collect_samples<F>(warmup: u32, runs: u32, mut op: F) -> HarnessResult<Vec<f64>>
where
    F: FnMut() -> HarnessResult<f64>,
{
    for i in 0..warmup {
        debug!(warmup_run = i + 1, warmup, "warmup run");
        op()?;
    }
    let mut samples = Vec::with_capacity(runs as usize);
    for i in 0..runs {
        let ms = op()?;
        debug!(measured_run = i + 1, runs, ms, "measured run");
        samples.push(ms);
    }
    Ok(samples)
}

/// Standard median: average of the two middle values for even counts.
/// Empty input yields 0.0.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut ordered = values.to_vec();
    ordered.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = ordered.len();
    if n % 2 == 1 {
        ordered[n / 2]
    } else {
        (ordered[n / 2 - 1] + ordered[n / 2]) / 2.0
    }
}

/// Nearest-rank percentile: `rank = max(1, ceil(p/100 * n))`, 1-based into
/// the ascending sort. Deliberately interpolation-free so the result is an
/// observed sample. Empty input yields 0.0.
pub fn percentile_nearest_rank(values: &[f64], percentile: u8) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut ordered = values.to_vec();
    ordered.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if percentile == 0 {
        return ordered[0];
    }
    if percentile >= 100 {
        return ordered[ordered.len() - 1];
    }
    let position = (f64::from(percentile) / 100.0) * ordered.len() as f64;
    let rank = (position.ceil() as usize).max(1);
    ordered[rank - 1]
}

/// Round to two decimal places, the precision reported in payloads.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// p50/p95 pair for one metric, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub p50: f64,
    pub p95: f64,
}

/// Reduce a sample set to its latency summary.
pub fn summarize(samples: &[f64]) -> LatencySummary {
    LatencySummary {
        p50: round2(median(samples)),
        p95: round2(percentile_nearest_rank(samples, 95)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn median_of_odd_count_is_middle_value() {
        assert_eq!(median(&[30.0, 10.0, 20.0]), 20.0);
    }

    #[test]
    fn median_of_even_count_averages_the_middle_pair() {
        assert_eq!(median(&[10.0, 20.0, 30.0, 40.0]), 25.0);
    }

    #[test]
    fn p95_of_three_samples_is_the_maximum() {
        assert_eq!(percentile_nearest_rank(&[10.0, 20.0, 30.0], 95), 30.0);
    }

    #[test]
    fn p95_of_four_samples_takes_rank_four() {
        // ceil(0.95 * 4) = 4
        assert_eq!(percentile_nearest_rank(&[10.0, 20.0, 30.0, 40.0], 95), 40.0);
    }

    #[test]
    fn percentile_of_empty_input_is_zero() {
        assert_eq!(percentile_nearest_rank(&[], 95), 0.0);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn percentile_endpoints_clamp() {
        let values = [5.0, 1.0, 9.0];
        assert_eq!(percentile_nearest_rank(&values, 0), 1.0);
        assert_eq!(percentile_nearest_rank(&values, 100), 9.0);
    }

    #[test]
    fn summary_rounds_to_two_decimals() {
        let summary = summarize(&[1.005, 1.005, 1.005]);
        assert_eq!(summary.p50, 1.01);
        assert_eq!(summary.p95, 1.01);
    }

    #[test]
    fn warmup_runs_precede_and_are_discarded() {
        let mut calls = Vec::new();
        let mut counter = 0u32;
        let samples = collect_samples(2, 3, || {
            counter += 1;
            calls.push(counter);
            Ok(f64::from(counter))
        })
        .unwrap();
        assert_eq!(calls, vec![1, 2, 3, 4, 5]);
        // The first two invocations are warmup and never enter the set.
        assert_eq!(samples, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn a_failing_run_aborts_the_whole_sample_set() {
        let mut counter = 0u32;
        let result = collect_samples(0, 5, || {
            counter += 1;
            if counter == 3 {
                Err(crate::errors::HarnessError::Config("boom".into()))
            } else {
                Ok(1.0)
            }
        });
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn median_is_within_observed_range(values in prop::collection::vec(0.0f64..10_000.0, 1..64)) {
            let m = median(&values);
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(m >= min && m <= max);
        }

        #[test]
        fn p95_is_an_observed_sample(values in prop::collection::vec(0.0f64..10_000.0, 1..64)) {
            let p = percentile_nearest_rank(&values, 95);
            prop_assert!(values.contains(&p));
        }
    }
}
