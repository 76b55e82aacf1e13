//! The two competing retrieval strategies.
//!
//! The grep strategy pays one recursive scan up front and expands evidence
//! by reading snippet windows straight from disk, so its per-tier cost is
//! token volume rather than latency. The structured strategy pays one
//! ranked locate up front and one `expand` invocation per tier, covering
//! only the identifiers that tier added.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::HarnessResult;
use crate::process::CommandSpec;
use crate::scenario::Scenario;
use crate::tool::{SearchTool, parse_results};

use super::{EvidenceStrategy, Expansion, InitialRetrieval};

/// Lines of the raw grep output kept in the initial-retrieval summary.
const GREP_SUMMARY_LINES: usize = 200;

/// Knobs for the grep-based baseline strategy.
#[derive(Debug, Clone)]
pub struct GrepConfig {
    /// Per-file match cap passed to grep (`-m`).
    pub max_matches: usize,
    /// Context lines around each match line when expanding a file.
    pub context_lines: usize,
    /// Snippet windows expanded per file.
    pub max_windows_per_file: usize,
    pub timeout: Duration,
}

impl Default for GrepConfig {
    fn default() -> Self {
        Self {
            max_matches: 300,
            context_lines: 20,
            max_windows_per_file: 2,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Baseline strategy: recursive text search plus manual snippet expansion.
pub struct GrepStrategy {
    repo: PathBuf,
    config: GrepConfig,
    lines_by_file: BTreeMap<String, Vec<usize>>,
}

impl GrepStrategy {
    pub fn new(repo: impl Into<PathBuf>, config: GrepConfig) -> Self {
        Self {
            repo: repo.into(),
            config,
            lines_by_file: BTreeMap::new(),
        }
    }
}

impl EvidenceStrategy for GrepStrategy {
    fn name(&self) -> &str {
        "grep"
    }

    fn open(&mut self, scenario: &Scenario) -> HarnessResult<InitialRetrieval> {
        // Exit 1 is "no matches" and yields an empty pool.
        let run = CommandSpec::new("grep", &self.repo)
            .args([
                "-R",
                "-n",
                "-I",
                "-E",
                "--color=never",
                "--exclude-dir=.git",
                "-m",
            ])
            .arg(self.config.max_matches.to_string())
            .args(["-e", scenario.grep_pattern.as_str(), "."])
            .timeout(self.config.timeout)
            .tolerate(&[1])
            .run()?;

        self.lines_by_file.clear();
        let mut pool = Vec::new();
        let mut parsed = 0usize;
        for line in run.stdout.lines() {
            if parsed >= self.config.max_matches {
                break;
            }
            let Some((path, line_no)) = parse_grep_line(line) else {
                continue;
            };
            parsed += 1;
            let windows = self.lines_by_file.entry(path.clone()).or_insert_with(|| {
                pool.push(path.clone());
                Vec::new()
            });
            if windows.len() < self.config.max_windows_per_file {
                windows.push(line_no);
            }
        }

        debug!(
            scenario = %scenario.id,
            matches = parsed,
            files = pool.len(),
            grep_ms = run.duration_ms,
            "grep substrate established"
        );

        let summary = run
            .stdout
            .lines()
            .take(GREP_SUMMARY_LINES)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(InitialRetrieval {
            summary,
            pool,
            latency_ms: run.duration_ms,
        })
    }

    fn expand(&mut self, _scenario: &Scenario, new_units: &[String]) -> HarnessResult<Expansion> {
        let mut sections = Vec::new();
        for rel in new_units {
            let Some(lines) = read_lines(&self.repo.join(rel)) else {
                continue;
            };
            let window_lines = self.lines_by_file.get(rel).cloned().unwrap_or_default();
            for &line_no in &window_lines {
                let start = line_no.saturating_sub(self.config.context_lines).max(1);
                let end = (line_no + self.config.context_lines).min(lines.len());
                if start > end {
                    continue;
                }
                let body = lines[start - 1..end].join("\n");
                sections.push(format!("--- {rel}:{start}-{end} ---\n{body}"));
            }
        }
        // Snippet expansion reads local files; no subprocess cost accrues.
        Ok(Expansion {
            text: sections.join("\n\n"),
            latency_ms: 0.0,
        })
    }
}

fn parse_grep_line(line: &str) -> Option<(String, usize)> {
    let mut parts = line.splitn(3, ':');
    let path = parts.next()?;
    let line_no: usize = parts.next()?.parse().ok()?;
    parts.next()?;
    let path = path.strip_prefix("./").unwrap_or(path);
    if path.is_empty() {
        return None;
    }
    Some((path.to_string(), line_no))
}

fn read_lines(path: &Path) -> Option<Vec<String>> {
    std::fs::read(path).ok().map(|bytes| {
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(String::from)
            .collect()
    })
}

/// Knobs for the structured locate/expand strategy.
#[derive(Debug, Clone)]
pub struct StructuredConfig {
    /// Ranked identifiers requested from locate.
    pub locate_limit: usize,
    /// Context passed to each expand invocation.
    pub expand_context: u32,
}

impl Default for StructuredConfig {
    fn default() -> Self {
        Self {
            locate_limit: 12,
            expand_context: 8,
        }
    }
}

/// Structured strategy: ranked locate once, then one expand per tier over
/// only the newly added identifiers.
pub struct StructuredStrategy {
    tool: SearchTool,
    repo: PathBuf,
    config: StructuredConfig,
}

impl StructuredStrategy {
    pub fn new(tool: SearchTool, repo: impl Into<PathBuf>, config: StructuredConfig) -> Self {
        Self {
            // Query failures are recorded as empty evidence here, never
            // aborts: partial data is an acceptable benchmark outcome.
            tool: tool.lenient(),
            repo: repo.into(),
            config,
        }
    }
}

impl EvidenceStrategy for StructuredStrategy {
    fn name(&self) -> &str {
        "structured"
    }

    fn open(&mut self, scenario: &Scenario) -> HarnessResult<InitialRetrieval> {
        let run = self
            .tool
            .locate(&self.repo, &scenario.tool_query, self.config.locate_limit)?;

        if !run.success() {
            warn!(
                scenario = %scenario.id,
                exit_code = run.exit_code,
                "locate exited nonzero; proceeding with empty evidence"
            );
        }

        let ids = parse_results(&run.stdout).ranked_ids(self.config.locate_limit);
        debug!(
            scenario = %scenario.id,
            ids = ids.len(),
            locate_ms = run.duration_ms,
            "locate substrate established"
        );

        Ok(InitialRetrieval {
            summary: run.stdout.trim_end().to_string(),
            pool: ids,
            latency_ms: run.duration_ms,
        })
    }

    fn expand(&mut self, scenario: &Scenario, new_units: &[String]) -> HarnessResult<Expansion> {
        let run = self
            .tool
            .expand(&self.repo, new_units, self.config.expand_context)?;
        if !run.success() {
            warn!(
                scenario = %scenario.id,
                exit_code = run.exit_code,
                "expand exited nonzero; tier contributes no evidence"
            );
        }
        Ok(Expansion {
            text: run.stdout.trim_end().to_string(),
            latency_ms: run.duration_ms,
        })
    }
}
