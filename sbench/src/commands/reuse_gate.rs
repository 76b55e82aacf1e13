//! Warm-start cache regression gate.
//!
//! The subject under test is the deliberately shared cache directory: a
//! seeded bare origin is cloned into a fresh checkout per trial (isolated
//! mutated workload), while the cache directory, exported to the tool
//! through an additive environment variable, persists across trials.
//! Cold indexing and the first search after a warm index are compared
//! baseline-vs-candidate; warm-vs-cold indexing on the candidate bounds
//! the overhead of the cache path against the same binary with the
//! feature off. One dual-threshold rule covers both shapes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::bail;
use clap::Args;
use sbench_core::errors::HarnessResult;
use sbench_core::regression::{CompatNote, GatePayload, Methodology, PercentileBlock};
use sbench_core::sampling::LatencySummary;
use sbench_core::{MetricComparison, SearchTool, collect_samples, evaluate_gate, summarize};
use tracing::info;

use super::{Verdict, emit_payload, resolve_binary};
use crate::{fixture, gitfix};

pub const METRIC_COLD_INDEX: &str = "cold_index_ms";
pub const METRIC_WARM_INDEX: &str = "warm_index_ms";
pub const METRIC_FIRST_SEARCH_WARM: &str = "first_search_warm_ms";
pub const METRIC_WARM_OVERHEAD: &str = "warm_index_overhead_ms";

#[derive(Debug, Args)]
pub struct ReuseGateArgs {
    /// Path to the baseline search-tool binary
    #[arg(long)]
    pub baseline_bin: PathBuf,

    /// Path to the candidate search-tool binary
    #[arg(long)]
    pub candidate_bin: PathBuf,

    /// Measured runs per metric
    #[arg(long, default_value_t = 3)]
    pub runs: u32,

    /// Warmup runs per metric (discarded)
    #[arg(long, default_value_t = 1)]
    pub warmup: u32,

    /// Synthetic workload source file count
    #[arg(long, default_value_t = 1200)]
    pub files: usize,

    /// Relative limit for warm-overhead and first-search metrics (percent)
    #[arg(long, default_value_t = 10.0)]
    pub limit_pct: f64,

    /// Relative limit for the cold index regression (percent)
    #[arg(long, default_value_t = 5.0)]
    pub cold_limit_pct: f64,

    /// Absolute regression floor in milliseconds
    #[arg(long, default_value_t = 3.0)]
    pub floor_ms: f64,

    /// Environment variable the tool reads for its shared cache directory
    #[arg(long, default_value = "SEARCHTOOL_CACHE_DIR")]
    pub cache_env: String,

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
struct ReuseMeasurement {
    metrics: BTreeMap<String, f64>,
    percentiles: BTreeMap<String, LatencySummary>,
    reuse_supported: bool,
}

pub fn run(args: &ReuseGateArgs) -> anyhow::Result<Verdict> {
    if args.runs < 1 {
        bail!("--runs must be >= 1");
    }
    if args.files < 1 {
        bail!("--files must be >= 1");
    }
    let baseline_bin = resolve_binary("baseline", &args.baseline_bin)?;
    let candidate_bin = resolve_binary("candidate", &args.candidate_bin)?;

    let baseline = measure_for_binary(&baseline_bin, args)?;
    let candidate = measure_for_binary(&candidate_bin, args)?;

    let comparisons = vec![
        // Shape (a): baseline binary vs candidate binary.
        MetricComparison::new(
            METRIC_COLD_INDEX,
            baseline.metrics[METRIC_COLD_INDEX],
            candidate.metrics[METRIC_COLD_INDEX],
            args.cold_limit_pct,
        ),
        MetricComparison::new(
            METRIC_FIRST_SEARCH_WARM,
            baseline.metrics[METRIC_FIRST_SEARCH_WARM],
            candidate.metrics[METRIC_FIRST_SEARCH_WARM],
            args.limit_pct,
        ),
        // Shape (b): the candidate against itself with the cache off,
        // bounding the overhead of the optional code path.
        MetricComparison::new(
            METRIC_WARM_OVERHEAD,
            candidate.metrics[METRIC_COLD_INDEX],
            candidate.metrics[METRIC_WARM_INDEX],
            args.limit_pct,
        ),
    ];
    let eval = evaluate_gate(&comparisons, args.floor_ms);

    let compat = CompatNote {
        probed: "index --reuse".into(),
        supported: candidate.reuse_supported,
        fallback: if candidate.reuse_supported {
            "none".into()
        } else {
            "mirror_cold_metrics".into()
        },
    };

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
        info!("reuse gate passed");
        Ok(Verdict::Pass)
    } else {
        eprintln!("Reuse gate failed: {}", payload.failed.join(", "));
        Ok(Verdict::GateFailed)
    }
}

fn measure_for_binary(binary: &Path, args: &ReuseGateArgs) -> anyhow::Result<ReuseMeasurement> {
    let scenario = tempfile::Builder::new().prefix("sbench-reuse-").tempdir()?;
    let root = scenario.path();
    let origin = gitfix::setup_origin(root, |seed| fixture::write_reuse_workload(seed, args.files))?;
    let cache_root = root.join("cache");
    std::fs::create_dir_all(&cache_root)?;

    let base_tool = SearchTool::new(binary)
        .with_timeout(args.timeout)
        .with_env(&args.cache_env, cache_root.to_string_lossy());
    let reuse_supported = base_tool.help_mentions(root, "index", "--reuse");
    info!(binary = %binary.display(), reuse_supported, "reuse capability probed");

    let tool_with_mode = |mode: Option<&str>| -> SearchTool {
        let mut index_args = args.index_args.clone();
        if let Some(mode) = mode {
            index_args.push("--reuse".to_string());
            index_args.push(mode.to_string());
        }
        base_tool.clone().with_index_args(index_args)
    };
    let cold_mode = if reuse_supported { Some("off") } else { None };
    let index_timeout = args.timeout.max(Duration::from_secs(600));

    if reuse_supported {
        // Seed the shared cache once so warm trials actually hit it.
        let seed_clone = root.join("seed-clone");
        gitfix::clone_origin(&origin, &seed_clone)?;
        tool_with_mode(Some("strict")).index(&seed_clone, false, index_timeout)?;
    }

    let mut trial = 0usize;
    let mut next_clone = |label: &str| -> HarnessResult<PathBuf> {
        trial += 1;
        let dst = root.join(format!("{label}-{trial}"));
        gitfix::clone_origin(&origin, &dst)?;
        Ok(dst)
    };

    let cold = collect_samples(args.warmup, args.runs, || {
        let clone = next_clone("idx-cold")?;
        Ok(tool_with_mode(cold_mode)
            .index(&clone, false, index_timeout)?
            .duration_ms)
    })?;

    let warm = if reuse_supported {
        collect_samples(args.warmup, args.runs, || {
            let clone = next_clone("idx-warm")?;
            Ok(tool_with_mode(Some("strict"))
                .index(&clone, false, index_timeout)?
                .duration_ms)
        })?
    } else {
        cold.clone()
    };

    let search_mode = if reuse_supported { Some("strict") } else { None };
    let first_search = collect_samples(args.warmup, args.runs, || {
        let clone = next_clone("search-warm")?;
        tool_with_mode(search_mode).index(&clone, false, index_timeout)?;
        Ok(base_tool
            .search(&clone, fixture::REUSE_PROBE_MARKER, 100)?
            .duration_ms)
    })?;

    let mut metrics = BTreeMap::new();
    let mut percentiles = BTreeMap::new();
    for (name, samples) in [
        (METRIC_COLD_INDEX, &cold),
        (METRIC_WARM_INDEX, &warm),
        (METRIC_FIRST_SEARCH_WARM, &first_search),
    ] {
        let summary = summarize(samples);
        metrics.insert(name.to_string(), summary.p50);
        percentiles.insert(name.to_string(), summary);
    }
    Ok(ReuseMeasurement {
        metrics,
        percentiles,
        reuse_supported,
    })
}
