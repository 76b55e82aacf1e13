//! Synthetic workload generation.
//!
//! Workloads are written fresh into a temporary root for every gate run so
//! repeated trials are independent. Marker cadence is sparse on purpose:
//! probe tokens appear in a small fraction of files so locate-style queries
//! do real ranking work instead of matching everywhere.

use std::path::Path;

use sbench_core::errors::{HarnessError, HarnessResult};

/// Probe marker planted every 13th file of the query-gate workload.
pub const QUERY_PROBE_MARKER: &str = "latency_probe_token";

/// Probe marker planted every 17th file of the reuse-gate workload.
pub const REUSE_PROBE_MARKER: &str = "cache_probe_token";

/// Phrase repeated in the docs file; exercises multi-word queries.
pub const DOC_PHRASE: &str = "session routing retry flow orchestration";

/// The service modules the built-in efficiency scenarios target.
const AUTH_RS: &str = r#"pub fn validate_session_token(token: &str) -> bool {
    token.starts_with("sess_")
}

pub fn renew_session_token(token: &str) -> String {
    format!("{token}-renewed")
}
"#;

const ROUTER_RS: &str = r#"pub struct RouteTable {
    pub entries: Vec<(String, String)>,
}

pub fn resolve_route<'a>(table: &'a RouteTable, path: &str) -> Option<&'a str> {
    table
        .entries
        .iter()
        .find(|(prefix, _)| path.starts_with(prefix.as_str()))
        .map(|(_, target)| target.as_str())
}
"#;

const RETRY_RS: &str = r#"pub struct RetryBudget {
    pub remaining: u32,
    pub base_delay_ms: u64,
}

pub fn compute_backoff(budget: &RetryBudget, attempt: u32) -> u64 {
    budget.base_delay_ms.saturating_mul(1 << attempt.min(6))
}
"#;

const TELEMETRY_RS: &str = r#"pub fn flush_spans(buffer: &mut Vec<String>) -> usize {
    let flushed = buffer.len();
    buffer.clear();
    flushed
}
"#;

fn write(path: &Path, contents: &str) -> HarnessResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| HarnessError::Setup(format!("creating {}: {e}", parent.display())))?;
    }
    std::fs::write(path, contents)
        .map_err(|e| HarnessError::Setup(format!("writing {}: {e}", path.display())))
}

/// Workload for the query-latency gate: numbered handler modules with a
/// sparse probe marker plus a docs file carrying a multi-word phrase.
pub fn write_query_workload(root: &Path, files: usize) -> HarnessResult<()> {
    let src = root.join("src");
    for i in 0..files {
        let marker = if i % 13 == 0 { QUERY_PROBE_MARKER } else { "noise" };
        let contents = format!(
            "pub fn handler_{i}(input: i32) -> i32 {{\n    // {marker}\n    input + {i}\n}}\npub fn dispatch_{i}() -> i32 {{ handler_{i}(1) }}\n"
        );
        write(&src.join(format!("mod_{i}.rs")), &contents)?;
    }
    write(
        &root.join("docs").join("overview.md"),
        &format!("{DOC_PHRASE}\n{DOC_PHRASE}\n{DOC_PHRASE}\n"),
    )
}

/// Workload for the warm-start gate: worker modules with a sparse cache
/// probe and enough body to make indexing non-trivial.
pub fn write_reuse_workload(root: &Path, files: usize) -> HarnessResult<()> {
    let src = root.join("src");
    let body = "    let value = input + 1;\n".repeat(20);
    for i in 0..files {
        let marker = if i % 17 == 0 { REUSE_PROBE_MARKER } else { "noise" };
        let contents = format!(
            "pub fn worker_{i}(input: i32) -> i32 {{\n    // {marker}\n{body}    input + {i}\n}}\n"
        );
        write(&src.join(format!("mod_{i}.rs")), &contents)?;
    }
    Ok(())
}

/// How many vendor noise files the efficiency workload carries.
const VENDOR_NOISE_FILES: usize = 120;

/// Workload for the efficiency benchmark: a small service-shaped codebase
/// the built-in scenarios target, plus a vendor directory whose repeated
/// matches inflate the cost of naive recursive search.
pub fn write_efficiency_workload(root: &Path) -> HarnessResult<()> {
    let src = root.join("src");
    write(&src.join("auth.rs"), AUTH_RS)?;
    write(&src.join("router.rs"), ROUTER_RS)?;
    write(&src.join("retry.rs"), RETRY_RS)?;
    write(&src.join("telemetry.rs"), TELEMETRY_RS)?;

    let noise = "validate_session_token resolve_route noisy vendor payload\n".repeat(30);
    for i in 0..VENDOR_NOISE_FILES {
        write(&root.join("vendor").join(format!("noise_{i}.rs")), &noise)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_workload_plants_probe_markers_sparsely() {
        let dir = tempfile::tempdir().unwrap();
        write_query_workload(dir.path(), 27).unwrap();

        let probed = std::fs::read_to_string(dir.path().join("src/mod_0.rs")).unwrap();
        assert!(probed.contains(QUERY_PROBE_MARKER));
        let plain = std::fs::read_to_string(dir.path().join("src/mod_1.rs")).unwrap();
        assert!(!plain.contains(QUERY_PROBE_MARKER));

        let docs = std::fs::read_to_string(dir.path().join("docs/overview.md")).unwrap();
        assert!(docs.contains(DOC_PHRASE));
    }

    #[test]
    fn reuse_workload_writes_the_requested_file_count() {
        let dir = tempfile::tempdir().unwrap();
        write_reuse_workload(dir.path(), 18).unwrap();
        let count = std::fs::read_dir(dir.path().join("src")).unwrap().count();
        assert_eq!(count, 18);
        let probed = std::fs::read_to_string(dir.path().join("src/mod_17.rs")).unwrap();
        assert!(probed.contains(REUSE_PROBE_MARKER));
    }

    #[test]
    fn efficiency_workload_matches_the_builtin_registry() {
        let dir = tempfile::tempdir().unwrap();
        write_efficiency_workload(dir.path()).unwrap();

        for scenario in sbench_core::scenario::builtin_scenarios() {
            // Every grep pattern must hit at least one file under src/.
            let mut found = false;
            for entry in std::fs::read_dir(dir.path().join("src")).unwrap() {
                let contents = std::fs::read_to_string(entry.unwrap().path()).unwrap();
                if contents.contains(&scenario.grep_pattern) {
                    found = true;
                    break;
                }
            }
            assert!(found, "pattern {} not planted", scenario.grep_pattern);
        }
        assert!(dir.path().join("vendor/noise_0.rs").exists());
    }
}
