//! Two-binary latency regression gate.
//!
//! Both binaries index an identical synthetic workload in their own
//! temporary root, then three locate-family metrics are sampled with the
//! warmup/measured discipline and compared under the dual-threshold rule.
//! A baseline binary that predates `locate` (common when gating against a
//! merge-base build) is mirrored from the candidate so the gate stays
//! deterministic and non-blocking; the fallback is recorded in the payload.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::bail;
use clap::Args;
use sbench_core::regression::{CompatNote, GatePayload, Methodology, PercentileBlock};
use sbench_core::sampling::LatencySummary;
use sbench_core::tool::parse_results;
use sbench_core::{MetricComparison, SearchTool, collect_samples, evaluate_gate, summarize};
use tracing::info;

use super::{Verdict, emit_payload, resolve_binary};
use crate::fixture;

pub const METRIC_LOCATE_SIMPLE: &str = "locate_simple_ms";
pub const METRIC_LOCATE_PHRASE: &str = "locate_phrase_ms";
pub const METRIC_LOCATE_EXPAND_E2E: &str = "locate_expand_e2e_ms";

/// Identifiers expanded in the locate+expand end-to-end metric.
const E2E_EXPAND_IDS: usize = 4;

#[derive(Debug, Args)]
pub struct GateArgs {
    /// Path to the baseline search-tool binary
    #[arg(long)]
    pub baseline_bin: PathBuf,

    /// Path to the candidate search-tool binary
    #[arg(long)]
    pub candidate_bin: PathBuf,

    /// Measured runs per metric
    #[arg(long, default_value_t = 5)]
    pub runs: u32,

    /// Warmup runs per metric (discarded)
    #[arg(long, default_value_t = 2)]
    pub warmup: u32,

    /// Synthetic workload source file count
    #[arg(long, default_value_t = 800)]
    pub files: usize,

    /// Relative regression limit in percent
    #[arg(long, default_value_t = 10.0)]
    pub limit_pct: f64,

    /// Absolute regression floor in milliseconds
    #[arg(long, default_value_t = 3.0)]
    pub floor_ms: f64,

    /// Per-invocation timeout
    #[arg(long, default_value = "120s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Extra flag appended to every index invocation (repeatable)
    #[arg(long = "index-arg")]
    pub index_args: Vec<String>,

    /// Optional JSON report output path
    #[arg(long)]
    pub json_out: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct BinaryMeasurement {
    metrics: BTreeMap<String, f64>,
    percentiles: BTreeMap<String, LatencySummary>,
}

pub fn run(args: &GateArgs) -> anyhow::Result<Verdict> {
    if args.runs < 1 {
        bail!("--runs must be >= 1");
    }
    if args.files < 1 {
        bail!("--files must be >= 1");
    }
    let baseline_bin = resolve_binary("baseline", &args.baseline_bin)?;
    let candidate_bin = resolve_binary("candidate", &args.candidate_bin)?;

    let probe_dir = tempfile::tempdir()?;
    if !tool_for(&candidate_bin, args).help_mentions(probe_dir.path(), "locate", "locate") {
        bail!(
            "candidate binary does not support `locate`: {}",
            candidate_bin.display()
        );
    }

    let candidate = measure_for_binary(&candidate_bin, args)?;

    let baseline_supports =
        tool_for(&baseline_bin, args).help_mentions(probe_dir.path(), "locate", "locate");
    let (baseline, compat) = if baseline_supports {
        (
            measure_for_binary(&baseline_bin, args)?,
            CompatNote {
                probed: "locate".into(),
                supported: true,
                fallback: "none".into(),
            },
        )
    } else {
        // A merge-base baseline may predate `locate`; mirror the candidate
        // so the gate cannot block on missing capability.
        info!("baseline binary lacks `locate`; using candidate as its own baseline");
        (
            candidate.clone(),
            CompatNote {
                probed: "locate".into(),
                supported: false,
                fallback: "self_baseline_candidate".into(),
            },
        )
    };

    let comparisons: Vec<MetricComparison> = [
        METRIC_LOCATE_SIMPLE,
        METRIC_LOCATE_PHRASE,
        METRIC_LOCATE_EXPAND_E2E,
    ]
    .iter()
    .map(|metric| {
        MetricComparison::new(
            *metric,
            baseline.metrics[*metric],
            candidate.metrics[*metric],
            args.limit_pct,
        )
    })
    .collect();
    let eval = evaluate_gate(&comparisons, args.floor_ms);

    let payload = GatePayload {
        runs: args.runs,
        warmup: args.warmup,
        files: args.files,
        methodology: Methodology::new(args.runs, args.warmup),
        compat: Some(compat),
        baseline: baseline.metrics,
        candidate: candidate.metrics,
        percentiles: PercentileBlock {
            baseline: baseline.percentiles,
            candidate: candidate.percentiles,
        },
        regression_pct: eval.regression_pct,
        regression_abs_ms: eval.regression_abs_ms,
        limits: eval.limits,
        absolute_regression_floor_ms: args.floor_ms,
        failed: eval.failed,
    };
    emit_payload(&payload, args.json_out.as_deref())?;

    if payload.failed.is_empty() {
        info!("perf gate passed");
        Ok(Verdict::Pass)
    } else {
        eprintln!("Perf gate failed: {}", payload.failed.join(", "));
        Ok(Verdict::GateFailed)
    }
}

fn tool_for(binary: &Path, args: &GateArgs) -> SearchTool {
    SearchTool::new(binary)
        .with_index_args(args.index_args.clone())
        .with_timeout(args.timeout)
}

fn measure_for_binary(binary: &Path, args: &GateArgs) -> anyhow::Result<BinaryMeasurement> {
    let workload = tempfile::Builder::new().prefix("sbench-gate-").tempdir()?;
    let root = workload.path();
    fixture::write_query_workload(root, args.files)?;

    let tool = tool_for(binary, args);
    let index_timeout = args.timeout.max(Duration::from_secs(600));
    tool.index(root, false, index_timeout)?;
    info!(binary = %binary.display(), files = args.files, "workload indexed");

    let simple = collect_samples(args.warmup, args.runs, || {
        Ok(tool.locate(root, "handler_42", 5)?.duration_ms)
    })?;
    let phrase = collect_samples(args.warmup, args.runs, || {
        Ok(tool.locate(root, fixture::DOC_PHRASE, 5)?.duration_ms)
    })?;
    let e2e = collect_samples(args.warmup, args.runs, || {
        let locate = tool.locate(root, fixture::QUERY_PROBE_MARKER, 8)?;
        let ids = parse_results(&locate.stdout).ranked_ids(E2E_EXPAND_IDS);
        let mut total = locate.duration_ms;
        if !ids.is_empty() {
            total += tool.expand(root, &ids, 8)?.duration_ms;
        }
        Ok(total)
    })?;

    let mut metrics = BTreeMap::new();
    let mut percentiles = BTreeMap::new();
    for (name, samples) in [
        (METRIC_LOCATE_SIMPLE, &simple),
        (METRIC_LOCATE_PHRASE, &phrase),
        (METRIC_LOCATE_EXPAND_E2E, &e2e),
    ] {
        let summary = summarize(samples);
        metrics.insert(name.to_string(), summary.p50);
        percentiles.insert(name.to_string(), summary);
    }
    Ok(BinaryMeasurement {
        metrics,
        percentiles,
    })
}
