//! Boundary with the externally invoked search tool.
//!
//! The tool is a black box reached through its CLI: an `index` subcommand
//! (must succeed), a `search` subcommand whose exit 1 means "no matches",
//! and a `locate`/`expand` pair where locate returns ranked identifiers
//! and expand returns detailed content for an identifier list. Output is
//! JSON with a `results` array; records carry at least a `path` and may
//! carry a `snippet`, an `id`, and a `meta.path_aliases` map. Output that
//! fails to parse is treated as "no evidence produced", not as a crash.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::errors::HarnessResult;
use crate::process::{CommandSpec, CommandRun, DEFAULT_COMMAND_TIMEOUT, ExitExpectation};

/// Wrapper around one search-tool binary plus the invocation context shared
/// by all of its subcommand calls.
#[derive(Debug, Clone)]
pub struct SearchTool {
    binary: PathBuf,
    index_args: Vec<String>,
    envs: BTreeMap<String, String>,
    timeout: Duration,
    lenient: bool,
}

impl SearchTool {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            index_args: Vec::new(),
            envs: BTreeMap::new(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            lenient: false,
        }
    }

    /// Extra flags appended to every `index` invocation (feature toggles
    /// such as disabling embeddings are tool-specific and pass through).
    #[must_use]
    pub fn with_index_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Additive environment override (e.g. pointing the tool at a shared
    /// cache directory).
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// In lenient mode query subcommands accept any exit code; the caller
    /// inspects the run. Used by efficiency benchmarks where a failed query
    /// is a recorded empty result rather than an abort.
    #[must_use]
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn spec(&self, cwd: &Path) -> CommandSpec {
        CommandSpec::new(&self.binary, cwd)
            .envs(&self.envs)
            .timeout(self.timeout)
    }

    fn query_expectation(&self) -> ExitExpectation {
        if self.lenient {
            ExitExpectation::Any
        } else {
            ExitExpectation::Tolerate(vec![1])
        }
    }

    /// Build or refresh the index. Always mandatory: a broken index
    /// invalidates every measurement that would follow.
    pub fn index(&self, cwd: &Path, force: bool, timeout: Duration) -> HarnessResult<CommandRun> {
        let mut spec = self
            .spec(cwd)
            .timeout(timeout)
            .arg("index")
            .args(self.index_args.iter().cloned());
        if force {
            spec = spec.arg("--force");
        }
        spec.run()
    }

    /// Text search with machine-readable output. Exit 1 is "no matches".
    pub fn search(&self, cwd: &Path, query: &str, limit: usize) -> HarnessResult<CommandRun> {
        self.spec(cwd)
            .args(["--format", "json", "search"])
            .arg(query)
            .args(["--limit".to_string(), limit.to_string()])
            .expectation(self.query_expectation())
            .run()
    }

    /// Ranked-identifier lookup for a natural-language query.
    pub fn locate(&self, cwd: &Path, query: &str, limit: usize) -> HarnessResult<CommandRun> {
        self.spec(cwd)
            .args(["--format", "json", "locate"])
            .arg(query)
            .args(["--limit".to_string(), limit.to_string()])
            .expectation(self.query_expectation())
            .run()
    }

    /// Detailed content for a list of identifiers from a prior locate.
    pub fn expand(&self, cwd: &Path, ids: &[String], context: u32) -> HarnessResult<CommandRun> {
        let mut spec = self
            .spec(cwd)
            .args(["--format", "json", "expand"])
            .args(["--context".to_string(), context.to_string()]);
        for id in ids {
            spec = spec.args(["--id".to_string(), id.clone()]);
        }
        spec.expectation(self.query_expectation()).run()
    }

    /// Probe `<subcommand> --help` for a capability marker. Nonzero exit
    /// means "not supported", never an error.
    pub fn help_mentions(&self, cwd: &Path, subcommand: &str, needle: &str) -> bool {
        let run = self
            .spec(cwd)
            .args([subcommand, "--help"])
            .expectation(ExitExpectation::Any)
            .run();
        match run {
            Ok(run) => {
                let help = format!("{}\n{}", run.stdout, run.stderr).to_lowercase();
                help.contains(&needle.to_lowercase())
            }
            Err(err) => {
                debug!(subcommand, %err, "capability probe failed");
                false
            }
        }
    }
}

/// One record from the tool's `results` array.
#[derive(Debug, Clone, Default)]
pub struct ResultRow {
    pub path: Option<String>,
    pub snippet: Option<String>,
    pub id: Option<String>,
}

/// Parsed structured output, tolerant of shape drift.
#[derive(Debug, Clone, Default)]
pub struct ParsedResults {
    pub rows: Vec<ResultRow>,
    pub path_aliases: BTreeMap<String, String>,
}

impl ParsedResults {
    /// Result paths with the alias map applied.
    pub fn resolved_paths(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.path.as_ref())
            .map(|raw| {
                self.path_aliases
                    .get(raw)
                    .cloned()
                    .unwrap_or_else(|| raw.clone())
            })
            .collect()
    }

    /// Ranked identifiers, capped at `max`.
    pub fn ranked_ids(&self, max: usize) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.id.clone())
            .filter(|id| !id.is_empty())
            .take(max)
            .collect()
    }
}

/// Parse the tool's JSON output. Accepts either an object with a `results`
/// array or a bare array of records; anything else (including unparsable
/// text) yields an empty result set.
pub fn parse_results(stdout: &str) -> ParsedResults {
    let value: Value = match serde_json::from_str(stdout) {
        Ok(v) => v,
        Err(_) => return ParsedResults::default(),
    };

    let records = match &value {
        Value::Object(obj) => obj.get("results").and_then(Value::as_array).cloned(),
        Value::Array(arr) => Some(arr.clone()),
        _ => None,
    };
    let Some(records) = records else {
        return ParsedResults::default();
    };

    let mut aliases = BTreeMap::new();
    if let Some(map) = value
        .get("meta")
        .and_then(|m| m.get("path_aliases"))
        .and_then(Value::as_object)
    {
        for (k, v) in map {
            if let Some(target) = v.as_str() {
                aliases.insert(k.clone(), target.to_string());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(Value::as_object)
        .map(|record| ResultRow {
            path: record.get("path").and_then(Value::as_str).map(String::from),
            snippet: record
                .get("snippet")
                .and_then(Value::as_str)
                .map(String::from),
            id: record.get("id").and_then(Value::as_str).map(String::from),
        })
        .collect();

    ParsedResults {
        rows,
        path_aliases: aliases,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_results_object_with_aliases() {
        let stdout = r#"{
            "results": [
                {"path": "1", "snippet": "fn validate()"},
                {"path": "src/other.rs"}
            ],
            "meta": {"path_aliases": {"1": "src/auth.rs"}}
        }"#;
        let parsed = parse_results(stdout);
        assert_eq!(
            parsed.resolved_paths(),
            vec!["src/auth.rs".to_string(), "src/other.rs".to_string()]
        );
    }

    #[test]
    fn parses_bare_array_of_records() {
        let stdout = r#"[{"id": "sym-1"}, {"id": "sym-2"}, {"id": ""}]"#;
        let parsed = parse_results(stdout);
        assert_eq!(parsed.ranked_ids(10), vec!["sym-1", "sym-2"]);
    }

    #[test]
    fn ranked_ids_respects_the_cap() {
        let stdout = r#"[{"id": "a"}, {"id": "b"}, {"id": "c"}]"#;
        assert_eq!(parse_results(stdout).ranked_ids(2), vec!["a", "b"]);
    }

    #[test]
    fn malformed_output_is_empty_evidence_not_an_error() {
        let parsed = parse_results("garbage { not json");
        assert!(parsed.rows.is_empty());
        assert!(parsed.resolved_paths().is_empty());
    }

    #[test]
    fn non_record_shapes_are_ignored() {
        assert!(parse_results(r#""just a string""#).rows.is_empty());
        assert!(parse_results(r#"{"results": 7}"#).rows.is_empty());
        assert!(parse_results(r#"[1, 2, 3]"#).rows.is_empty());
    }

    #[cfg(unix)]
    mod with_stub_tool {
        use super::super::*;
        use std::os::unix::fs::PermissionsExt;

        fn write_stub(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("stub-tool");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        }

        #[test]
        fn help_probe_detects_capability_markers() {
            let dir = tempfile::tempdir().unwrap();
            let stub = write_stub(dir.path(), "printf 'usage: tool locate --reuse'");
            let tool = SearchTool::new(&stub);
            assert!(tool.help_mentions(dir.path(), "index", "--reuse"));
            assert!(!tool.help_mentions(dir.path(), "index", "--no-such-flag"));
        }

        #[test]
        fn lenient_mode_accepts_any_exit_code() {
            let dir = tempfile::tempdir().unwrap();
            let stub = write_stub(dir.path(), "exit 7");
            let tool = SearchTool::new(&stub).lenient();
            let run = tool.locate(dir.path(), "anything", 5).unwrap();
            assert_eq!(run.exit_code, 7);
        }

        #[test]
        fn strict_mode_rejects_unexpected_exit_codes() {
            let dir = tempfile::tempdir().unwrap();
            let stub = write_stub(dir.path(), "exit 7");
            let tool = SearchTool::new(&stub);
            assert!(tool.locate(dir.path(), "anything", 5).is_err());
        }
    }
}
