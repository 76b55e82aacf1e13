//! Benchmark scenarios and completion-marker matching.
//!
//! A scenario is satisfied when every marker group is satisfied; a group is
//! satisfied when any one of its markers appears, case-insensitively, in
//! the accumulated evidence text. The registry is built once and passed
//! explicitly to the engine so tests can substitute synthetic sets.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{HarnessError, HarnessResult};

/// A set of interchangeable markers (OR semantics within the group).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerGroup(pub Vec<String>);

impl MarkerGroup {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(markers.into_iter().map(Into::into).collect())
    }

    /// `haystack_lower` must already be lowercased.
    fn matched_by(&self, haystack_lower: &str) -> bool {
        self.0
            .iter()
            .any(|marker| haystack_lower.contains(&marker.to_lowercase()))
    }

    /// Label used when reporting the group as still missing.
    pub fn label(&self) -> String {
        self.0.join("|")
    }
}

/// One benchmark case: what to look for and when the evidence is enough.
/// Immutable after registry construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    /// Human-readable task statement; becomes the payload preamble.
    pub objective: String,
    /// Pattern handed to the recursive-grep strategy.
    pub grep_pattern: String,
    /// Natural-language query handed to the structured locate strategy.
    pub tool_query: String,
    /// AND across groups, OR within a group.
    pub completion_groups: Vec<MarkerGroup>,
}

impl Scenario {
    /// Labels of the groups not yet satisfied by the cumulative evidence.
    pub fn missing_groups(&self, cumulative_evidence: &str) -> Vec<String> {
        let haystack = cumulative_evidence.to_lowercase();
        self.completion_groups
            .iter()
            .filter(|group| !group.matched_by(&haystack))
            .map(MarkerGroup::label)
            .collect()
    }

    pub fn satisfied_by(&self, cumulative_evidence: &str) -> bool {
        self.missing_groups(cumulative_evidence).is_empty()
    }
}

/// The built-in registry, matched to the synthetic workload the CLI
/// generates when no target repository is supplied.
pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            id: "auth_session_validation".into(),
            objective: "Find where session token validation is implemented and used.".into(),
            grep_pattern: "validate_session_token".into(),
            tool_query: "where session token validation is implemented".into(),
            completion_groups: vec![
                MarkerGroup::new(["validate_session_token"]),
                MarkerGroup::new(["auth.rs"]),
            ],
        },
        Scenario {
            id: "router_resolution".into(),
            objective: "Find the route table definition and the route resolution path.".into(),
            grep_pattern: "resolve_route".into(),
            tool_query: "where routes are resolved against the route table".into(),
            completion_groups: vec![
                MarkerGroup::new(["resolve_route"]),
                MarkerGroup::new(["router.rs", "RouteTable"]),
            ],
        },
        Scenario {
            id: "retry_budget_backoff".into(),
            objective: "Find how retry backoff is computed from the retry budget.".into(),
            grep_pattern: "compute_backoff".into(),
            tool_query: "where retry backoff is computed".into(),
            completion_groups: vec![
                MarkerGroup::new(["compute_backoff"]),
                MarkerGroup::new(["retry.rs", "RetryBudget"]),
            ],
        },
        Scenario {
            id: "telemetry_flush".into(),
            objective: "Find where buffered telemetry spans are flushed.".into(),
            grep_pattern: "flush_spans".into(),
            tool_query: "where telemetry spans are flushed".into(),
            completion_groups: vec![
                MarkerGroup::new(["flush_spans"]),
                MarkerGroup::new(["telemetry.rs"]),
            ],
        },
    ]
}

/// Load a user-supplied registry from a JSON array of scenarios.
pub fn load_scenarios(path: &Path) -> HarnessResult<Vec<Scenario>> {
    let raw = std::fs::read_to_string(path)?;
    let scenarios: Vec<Scenario> =
        serde_json::from_str(&raw).map_err(|e| HarnessError::ScenarioFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    validate_scenarios(&scenarios)?;
    Ok(scenarios)
}

fn validate_scenarios(scenarios: &[Scenario]) -> HarnessResult<()> {
    if scenarios.is_empty() {
        return Err(HarnessError::Config("scenario registry is empty".into()));
    }
    for scenario in scenarios {
        if scenario.id.trim().is_empty() {
            return Err(HarnessError::Config("scenario with empty id".into()));
        }
        if scenario.completion_groups.is_empty() {
            return Err(HarnessError::Config(format!(
                "scenario {} has no completion groups",
                scenario.id
            )));
        }
        if scenario
            .completion_groups
            .iter()
            .any(|group| group.0.is_empty() || group.0.iter().any(|m| m.trim().is_empty()))
        {
            return Err(HarnessError::Config(format!(
                "scenario {} has an empty completion marker",
                scenario.id
            )));
        }
    }
    Ok(())
}
