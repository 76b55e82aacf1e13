//! Completion-tiered retrieval-efficiency benchmark.
//!
//! Runs the engine over a scenario registry: the built-in one against a
//! generated synthetic workload, or a user-supplied JSON registry against
//! `--repo`. Reports tokens-to-completion and latency-to-completion
//! for the grep strategy vs the structured locate/expand strategy.
//! Exhausted strategies are a valid outcome; the run still exits 0 unless
//! `--min-reduction-pct` turns the aggregate reduction into a verdict.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Args;
use sbench_core::engine::{
    CompletionEngine, GrepConfig, GrepStrategy, ScenarioResult, StructuredConfig,
    StructuredStrategy, TierPlan,
};
use sbench_core::sampling::round2;
use sbench_core::scenario::{Scenario, builtin_scenarios, load_scenarios};
use sbench_core::{EfficiencySummary, SearchTool, TokenizerKind, summarize_results};
use serde::Serialize;
use tracing::info;

use super::{Verdict, emit_payload, resolve_binary, write_report};
use crate::{fixture, gitfix, report};

#[derive(Debug, Args)]
pub struct EfficiencyArgs {
    /// Path to the search-tool binary under test
    #[arg(long)]
    pub tool_bin: PathBuf,

    /// Target repository (a synthetic workload is generated when omitted)
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// JSON file replacing the built-in scenario registry
    #[arg(long)]
    pub scenarios: Option<PathBuf>,

    /// File-count tiers for the grep strategy
    #[arg(long, default_value = "2,4,8")]
    pub file_tiers: String,

    /// Identifier-count tiers for the structured strategy
    #[arg(long, default_value = "2,4,6")]
    pub id_tiers: String,

    /// Per-file match cap passed to grep
    #[arg(long, default_value_t = 300)]
    pub grep_max_matches: usize,

    /// Context lines around each grep match when expanding a file
    #[arg(long, default_value_t = 20)]
    pub context_lines: usize,

    /// Snippet windows expanded per file
    #[arg(long, default_value_t = 2)]
    pub max_windows_per_file: usize,

    /// Ranked identifiers requested from locate
    #[arg(long, default_value_t = 12)]
    pub locate_limit: usize,

    /// Context passed to each expand invocation
    #[arg(long, default_value_t = 8)]
    pub expand_context: u32,

    /// Character cap per attempt payload before truncation
    #[arg(long, default_value_t = 180_000)]
    pub max_payload_chars: usize,

    /// Use the punctuation-weighted tokenizer approximation
    #[arg(long)]
    pub exact_tokens: bool,

    /// Fail (exit 1) when overall token reduction is below this percentage
    #[arg(long)]
    pub min_reduction_pct: Option<f64>,

    /// Per-invocation timeout
    #[arg(long, default_value = "300s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Index rebuild timeout
    #[arg(long, default_value = "600s", value_parser = humantime::parse_duration)]
    pub index_timeout: Duration,

    /// Skip the index rebuild before measuring
    #[arg(long)]
    pub skip_index: bool,

    /// Extra flag appended to every index invocation (repeatable)
    #[arg(long = "index-arg")]
    pub index_args: Vec<String>,

    /// Optional JSON report output path
    #[arg(long)]
    pub json_out: Option<PathBuf>,

    /// Optional Markdown report output path
    #[arg(long)]
    pub md_out: Option<PathBuf>,

    /// Directory receiving a timestamped JSON snapshot per run, for
    /// periodic tracking
    #[arg(long)]
    pub history_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub harness_version: String,
    pub workload_commit: String,
    pub workload_file_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EfficiencyConfig {
    pub tool_bin: String,
    pub workload: String,
    pub synthetic_workload: bool,
    pub tokenizer: String,
    pub file_tiers: Vec<usize>,
    pub id_tiers: Vec<usize>,
    pub grep_max_matches: usize,
    pub context_lines: usize,
    pub max_windows_per_file: usize,
    pub locate_limit: usize,
    pub expand_context: u32,
    pub max_payload_chars: usize,
    pub scenario_count: usize,
    pub skip_index: bool,
}

#[derive(Debug, Serialize)]
pub struct IndexInfo {
    pub skipped: bool,
    pub duration_ms: f64,
}

/// The full report payload handed to serialization and Markdown rendering.
#[derive(Debug, Serialize)]
pub struct EfficiencyPayload {
    pub generated_at_utc: String,
    pub environment: EnvironmentInfo,
    pub config: EfficiencyConfig,
    pub index: IndexInfo,
    pub scenario_results: Vec<ScenarioResult>,
    pub summary: EfficiencySummary,
}

pub fn run(args: &EfficiencyArgs) -> anyhow::Result<Verdict> {
    let tool_bin = resolve_binary("tool", &args.tool_bin)?;
    let file_tiers = TierPlan::parse(&args.file_tiers)?;
    let id_tiers = TierPlan::parse(&args.id_tiers)?;
    let scenarios: Vec<Scenario> = match &args.scenarios {
        Some(path) => load_scenarios(path)?,
        None => builtin_scenarios(),
    };

    // Keep the TempDir guard alive for the whole run when the workload is
    // generated rather than supplied.
    let mut _workload_guard = None;
    let (workload, synthetic) = match &args.repo {
        Some(repo) => {
            let repo = repo
                .canonicalize()
                .with_context(|| format!("invalid --repo path: {}", repo.display()))?;
            if !repo.is_dir() {
                bail!("--repo is not a directory: {}", repo.display());
            }
            (repo, false)
        }
        None => {
            let dir = tempfile::Builder::new().prefix("sbench-eff-").tempdir()?;
            fixture::write_efficiency_workload(dir.path())?;
            let path = dir.path().to_path_buf();
            _workload_guard = Some(dir);
            (path, true)
        }
    };

    let tool = SearchTool::new(&tool_bin)
        .with_timeout(args.timeout)
        .with_index_args(args.index_args.clone());

    let index = if args.skip_index {
        IndexInfo {
            skipped: true,
            duration_ms: 0.0,
        }
    } else {
        let run = tool.index(&workload, true, args.index_timeout)?;
        info!(duration_ms = run.duration_ms, "index built");
        IndexInfo {
            skipped: false,
            duration_ms: round2(run.duration_ms),
        }
    };

    let tokenizer = if args.exact_tokens {
        TokenizerKind::Weighted
    } else {
        TokenizerKind::Approx
    };
    let engine = CompletionEngine::new(args.max_payload_chars, tokenizer.counter());

    let mut results = Vec::with_capacity(scenarios.len());
    for scenario in &scenarios {
        info!(scenario = %scenario.id, "running scenario");
        let mut grep = GrepStrategy::new(
            &workload,
            GrepConfig {
                max_matches: args.grep_max_matches,
                context_lines: args.context_lines,
                max_windows_per_file: args.max_windows_per_file,
                timeout: args.timeout,
            },
        );
        let mut structured = StructuredStrategy::new(
            tool.clone(),
            &workload,
            StructuredConfig {
                locate_limit: args.locate_limit,
                expand_context: args.expand_context,
            },
        );
        let result =
            engine.run_scenario(scenario, &file_tiers, &mut grep, &id_tiers, &mut structured)?;
        results.push(result);
    }

    let summary = summarize_results(&results);
    info!(
        reduction_pct = summary.token_reduction_percent,
        baseline_tokens = summary.baseline_total_tokens,
        structured_tokens = summary.structured_total_tokens,
        "benchmark complete"
    );

    let payload = EfficiencyPayload {
        generated_at_utc: chrono::Utc::now().to_rfc3339(),
        environment: EnvironmentInfo {
            os: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            harness_version: env!("CARGO_PKG_VERSION").to_string(),
            workload_commit: gitfix::rev_short(&workload),
            workload_file_count: gitfix::tracked_file_count(&workload),
        },
        config: EfficiencyConfig {
            tool_bin: tool_bin.display().to_string(),
            workload: workload.display().to_string(),
            synthetic_workload: synthetic,
            tokenizer: tokenizer.label().to_string(),
            file_tiers: file_tiers.sizes().to_vec(),
            id_tiers: id_tiers.sizes().to_vec(),
            grep_max_matches: args.grep_max_matches,
            context_lines: args.context_lines,
            max_windows_per_file: args.max_windows_per_file,
            locate_limit: args.locate_limit,
            expand_context: args.expand_context,
            max_payload_chars: args.max_payload_chars,
            scenario_count: scenarios.len(),
            skip_index: args.skip_index,
        },
        index,
        scenario_results: results,
        summary,
    };
    emit_payload(&payload, args.json_out.as_deref())?;
    if let Some(md_out) = &args.md_out {
        write_report(md_out, &report::render_markdown(&payload))?;
    }
    if let Some(history_dir) = &args.history_dir {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
        let snapshot = history_dir.join(format!("efficiency-{stamp}.json"));
        write_report(&snapshot, &format!("{}\n", serde_json::to_string_pretty(&payload)?))?;
    }

    if let Some(min) = args.min_reduction_pct
        && payload.summary.token_reduction_percent < min
    {
        eprintln!(
            "Efficiency gate failed: token reduction {:.1}% is below {min:.1}%",
            payload.summary.token_reduction_percent
        );
        return Ok(Verdict::GateFailed);
    }
    Ok(Verdict::Pass)
}
