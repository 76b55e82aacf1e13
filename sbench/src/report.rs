//! Markdown rendering of the efficiency payload.

use crate::commands::efficiency::EfficiencyPayload;

pub fn render_markdown(payload: &EfficiencyPayload) -> String {
    let env = &payload.environment;
    let cfg = &payload.config;
    let summary = &payload.summary;

    let mut lines: Vec<String> = Vec::new();
    lines.push("# Retrieval Efficiency Benchmark".into());
    lines.push(String::new());
    lines.push(format!("Generated: {}", payload.generated_at_utc));
    lines.push(String::new());
    lines.push("## What This Measures".into());
    lines.push(String::new());
    lines.push(
        "1. **Baseline (grep):** one recursive text search, then snippet windows \
         expanded from matched files in increasing tiers."
            .into(),
    );
    lines.push(
        "2. **Structured:** one ranked `locate`, then `expand` per tier over only \
         the newly added identifiers."
            .into(),
    );
    lines.push(
        "3. **Primary metric:** cumulative token volume until every completion \
         marker group is satisfied (or the evidence pool is exhausted)."
            .into(),
    );
    lines.push(format!("4. **Tokenizer:** `{}`.", cfg.tokenizer));
    lines.push(String::new());
    lines.push("## Environment".into());
    lines.push(String::new());
    lines.push(format!("- OS: `{}`", env.os));
    lines.push(format!("- harness: `sbench {}`", env.harness_version));
    lines.push(format!("- workload: `{}`", cfg.workload));
    lines.push(format!("- workload commit: `{}`", env.workload_commit));
    lines.push(format!(
        "- workload files (`git ls-files`): `{}`",
        env.workload_file_count
    ));
    lines.push(format!(
        "- tiers: files `{:?}`, identifiers `{:?}`",
        cfg.file_tiers, cfg.id_tiers
    ));
    if !payload.index.skipped {
        lines.push(format!(
            "- one-time index build: `{:.2} ms`",
            payload.index.duration_ms
        ));
    }
    lines.push(String::new());
    lines.push("## Results".into());
    lines.push(String::new());
    lines.push(
        "| Scenario | Baseline tokens | Structured tokens | Reduction | \
         Baseline attempts | Structured attempts | Baseline latency (ms) | \
         Structured latency (ms) |"
            .into(),
    );
    lines.push("|---|---:|---:|---:|---:|---:|---:|---:|".into());
    for row in &payload.scenario_results {
        lines.push(format!(
            "| {} | {} | {} | {:.1}% | {}{} | {}{} | {:.2} | {:.2} |",
            row.id,
            row.baseline.tokens_to_completion,
            row.structured.tokens_to_completion,
            row.token_reduction_percent,
            row.baseline.attempt_count,
            completion_mark(row.baseline.completed),
            row.structured.attempt_count,
            completion_mark(row.structured.completed),
            row.baseline.latency_to_completion_ms,
            row.structured.latency_to_completion_ms,
        ));
    }
    lines.push(String::new());
    lines.push("## Aggregate".into());
    lines.push(String::new());
    lines.push(format!(
        "- Baseline total tokens: **{}**",
        summary.baseline_total_tokens
    ));
    lines.push(format!(
        "- Structured total tokens: **{}**",
        summary.structured_total_tokens
    ));
    lines.push(format!(
        "- Token reduction: **{:.1}%**",
        summary.token_reduction_percent
    ));
    if summary.token_compression_x.is_finite() {
        lines.push(format!(
            "- Token compression ratio (baseline/structured): **{:.2}x**",
            summary.token_compression_x
        ));
    } else {
        lines.push(
            "- Token compression ratio (baseline/structured): **unbounded**".into(),
        );
    }
    lines.push(format!(
        "- Completed scenarios: baseline **{}/{}**, structured **{}/{}**",
        summary.baseline_completed,
        summary.scenario_count,
        summary.structured_completed,
        summary.scenario_count
    ));
    lines.push(String::new());
    lines.push("## Re-run".into());
    lines.push(String::new());
    lines.push("```bash".into());
    lines.push(format!("sbench efficiency --tool-bin {}", cfg.tool_bin));
    lines.push("```".into());
    lines.push(String::new());
    lines.join("\n")
}

fn completion_mark(completed: bool) -> &'static str {
    if completed { "" } else { " (exhausted)" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::efficiency::{
        EfficiencyConfig, EnvironmentInfo, IndexInfo,
    };
    use sbench_core::engine::{ScenarioResult, StrategyOutcome};
    use sbench_core::summarize_results;

    fn outcome(strategy: &str, tokens: usize, completed: bool) -> StrategyOutcome {
        StrategyOutcome {
            strategy: strategy.into(),
            attempts: Vec::new(),
            attempt_count: 2,
            tokens_to_completion: tokens,
            latency_to_completion_ms: 12.5,
            completed,
        }
    }

    fn payload() -> EfficiencyPayload {
        let results = vec![ScenarioResult {
            id: "auth_session_validation".into(),
            objective: "Find where session token validation is implemented.".into(),
            baseline: outcome("grep", 4000, true),
            structured: outcome("structured", 400, true),
            token_reduction_percent: 90.0,
        }];
        let summary = summarize_results(&results);
        EfficiencyPayload {
            generated_at_utc: "2026-01-01T00:00:00Z".into(),
            environment: EnvironmentInfo {
                os: "linux x86_64".into(),
                harness_version: "0.4.1".into(),
                workload_commit: "unknown".into(),
                workload_file_count: 0,
            },
            config: EfficiencyConfig {
                tool_bin: "/opt/search-tool".into(),
                workload: "/tmp/workload".into(),
                synthetic_workload: true,
                tokenizer: "approx:bytes_div_4".into(),
                file_tiers: vec![2, 4, 8],
                id_tiers: vec![2, 4, 6],
                grep_max_matches: 300,
                context_lines: 20,
                max_windows_per_file: 2,
                locate_limit: 12,
                expand_context: 8,
                max_payload_chars: 180_000,
                scenario_count: 1,
                skip_index: false,
            },
            index: IndexInfo {
                skipped: false,
                duration_ms: 850.25,
            },
            scenario_results: results,
            summary,
        }
    }

    #[test]
    fn report_carries_scenario_rows_and_aggregate() {
        let md = render_markdown(&payload());
        assert!(md.contains("# Retrieval Efficiency Benchmark"));
        assert!(md.contains("| auth_session_validation | 4000 | 400 | 90.0% |"));
        assert!(md.contains("Token reduction: **90.0%**"));
        assert!(md.contains("compression ratio (baseline/structured): **10.00x**"));
        assert!(md.contains("sbench efficiency --tool-bin /opt/search-tool"));
    }

    #[test]
    fn exhausted_strategies_are_marked() {
        let mut p = payload();
        p.scenario_results[0].structured.completed = false;
        let md = render_markdown(&p);
        assert!(md.contains("(exhausted)"));
    }

    #[test]
    fn unbounded_compression_renders_as_text() {
        let mut p = payload();
        p.summary.token_compression_x = f64::INFINITY;
        let md = render_markdown(&p);
        assert!(md.contains("**unbounded**"));
    }
}
