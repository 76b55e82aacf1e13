//! Completion-tiered benchmark engine.
//!
//! Models an iterative, cost-aware retrieval process without calling a
//! text-generation agent: deterministic expansion tiers stand in for an
//! agent's adaptive behavior, giving a repeatable proxy for "how much
//! context must be shown before the task can be completed". Dumping
//! everything at once would always succeed; tiering measures the marginal
//! cost of reaching sufficiency instead.
//!
//! Per (scenario, strategy) the engine walks
//! `NOT_STARTED -> EXPANDING -> {COMPLETED, EXHAUSTED}`: each attempt caps
//! the next tier size to the evidence pool, expands only the newly added
//! units, appends the rendered payload to a cumulative context, and checks
//! the scenario's marker groups against that context. Exhaustion is a
//! valid, reportable outcome, not an error.

mod strategies;

pub use strategies::{GrepConfig, GrepStrategy, StructuredConfig, StructuredStrategy};

use serde::Serialize;
use tracing::debug;

use crate::aggregate::reduction_percent;
use crate::errors::{HarnessError, HarnessResult};
use crate::sampling::round2;
use crate::scenario::Scenario;
use crate::tokens::TokenCounter;

/// Appended when an attempt payload exceeds the configured character cap.
/// The retained prefix keeps the pass/fail signal; the cap bounds
/// pathological token costs from runaway outputs.
pub const TRUNCATION_MARKER: &str = "\n\n[TRUNCATED]";

/// Ordered sequence of strictly positive tier sizes. Duplicates are
/// dropped order-preservingly; values are capped to the evidence pool at
/// use time. The plan length is the attempt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPlan(Vec<usize>);

impl TierPlan {
    pub fn new<I: IntoIterator<Item = usize>>(sizes: I) -> HarnessResult<Self> {
        let mut seen = Vec::new();
        for size in sizes {
            if size == 0 {
                return Err(HarnessError::Config(
                    "tier sizes must be strictly positive".into(),
                ));
            }
            if !seen.contains(&size) {
                seen.push(size);
            }
        }
        if seen.is_empty() {
            return Err(HarnessError::Config("tier plan is empty".into()));
        }
        Ok(Self(seen))
    }

    /// Parse a comma-separated flag value such as `2,4,8`.
    pub fn parse(raw: &str) -> HarnessResult<Self> {
        let mut sizes = Vec::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let size: usize = part.parse().map_err(|_| {
                HarnessError::Config(format!("invalid tier size '{part}' in '{raw}'"))
            })?;
            sizes.push(size);
        }
        Self::new(sizes)
    }

    pub fn sizes(&self) -> &[usize] {
        &self.0
    }
}

/// The shared retrieval substrate a strategy establishes once per scenario:
/// the broad initial listing/locate output, the ordered evidence pool it
/// yields, and the latency of producing it.
#[derive(Debug, Clone)]
pub struct InitialRetrieval {
    pub summary: String,
    pub pool: Vec<String>,
    pub latency_ms: f64,
}

/// One tier's expansion: the rendered detail for the newly added units and
/// the latency of any invocation issued to produce it.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub text: String,
    pub latency_ms: f64,
}

/// The seam between the engine and a concrete retrieval strategy. Keeping
/// it a trait lets tests drive the state machine with synthetic evidence.
pub trait EvidenceStrategy {
    /// Strategy label used in results ("grep", "structured", ...).
    fn name(&self) -> &str;

    /// Establish the shared substrate for one scenario.
    fn open(&mut self, scenario: &Scenario) -> HarnessResult<InitialRetrieval>;

    /// Produce detail for the units newly added by one tier. Only called
    /// with a non-empty slice.
    fn expand(&mut self, scenario: &Scenario, new_units: &[String]) -> HarnessResult<Expansion>;
}

/// One tier's execution outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    /// Tier size after capping to the evidence pool.
    pub tier: usize,
    /// Evidence units newly added by this attempt.
    pub added_units: usize,
    /// Token cost of this attempt's payload.
    pub payload_tokens: usize,
    /// Token cost of all attempts so far.
    pub cumulative_tokens: usize,
    /// Latency charged to this attempt (shared setup on the first attempt
    /// only, plus any per-tier invocation).
    pub latency_ms: f64,
    /// Whether every marker group is satisfied after this attempt.
    pub completed: bool,
    /// Labels of the groups still missing.
    pub missing_groups: Vec<String>,
}

/// Final outcome of one strategy on one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyOutcome {
    pub strategy: String,
    pub attempts: Vec<AttemptRecord>,
    pub attempt_count: usize,
    pub tokens_to_completion: usize,
    pub latency_to_completion_ms: f64,
    pub completed: bool,
}

/// Both strategies' outcomes for one scenario plus the derived reduction.
/// Computed once after both strategies finish; immutable afterward.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub id: String,
    pub objective: String,
    pub baseline: StrategyOutcome,
    pub structured: StrategyOutcome,
    /// Percentage token reduction of the structured strategy relative to
    /// the baseline strategy (0.0 when the baseline total is 0).
    pub token_reduction_percent: f64,
}

/// The engine: payload cap plus the injected token counter.
pub struct CompletionEngine {
    max_payload_chars: usize,
    count_tokens: TokenCounter,
}

impl CompletionEngine {
    pub fn new(max_payload_chars: usize, count_tokens: TokenCounter) -> Self {
        Self {
            max_payload_chars,
            count_tokens,
        }
    }

    /// Run one strategy through its tier plan for one scenario.
    pub fn run_strategy(
        &self,
        scenario: &Scenario,
        plan: &TierPlan,
        strategy: &mut dyn EvidenceStrategy,
    ) -> HarnessResult<StrategyOutcome> {
        let initial = strategy.open(scenario)?;
        let pool = initial.pool;

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut cumulative_context = String::new();
        let mut cumulative_tokens = 0usize;
        let mut covered = 0usize;
        let mut completed = false;

        for (index, &tier) in plan.sizes().iter().enumerate() {
            let first_attempt = index == 0;
            let capped = tier.min(pool.len());
            // Newly added units are the set difference between this tier's
            // cap and everything covered so far; a tier at or below the
            // covered mark contributes nothing.
            let new_units: &[String] = if capped > covered {
                &pool[covered..capped]
            } else {
                &[]
            };

            let expansion = if new_units.is_empty() {
                Expansion::default()
            } else {
                strategy.expand(scenario, new_units)?
            };

            let mut payload = String::new();
            if first_attempt {
                payload.push_str(&format!(
                    "Task: {}\n\n=== initial retrieval ({}) ===\n{}\n",
                    scenario.objective,
                    strategy.name(),
                    initial.summary.trim_end(),
                ));
            }
            payload.push_str(&format!(
                "\n=== expanded evidence: tier {capped} ({} new) ===\n",
                new_units.len()
            ));
            if expansion.text.trim().is_empty() {
                payload.push_str("[no new evidence]");
            } else {
                payload.push_str(expansion.text.trim_end());
            }
            truncate_payload(&mut payload, self.max_payload_chars);

            let payload_tokens = (self.count_tokens)(&payload);
            cumulative_tokens += payload_tokens;

            // Shared setup cost is charged exactly once, to the first
            // attempt; per-tier invocations are charged to their own.
            let charged_ms = expansion.latency_ms
                + if first_attempt { initial.latency_ms } else { 0.0 };

            if !cumulative_context.is_empty() {
                cumulative_context.push_str("\n\n");
            }
            cumulative_context.push_str(&payload);

            let missing_groups = scenario.missing_groups(&cumulative_context);
            completed = missing_groups.is_empty();

            debug!(
                scenario = %scenario.id,
                strategy = strategy.name(),
                tier = capped,
                added = new_units.len(),
                payload_tokens,
                completed,
                "attempt finished"
            );

            attempts.push(AttemptRecord {
                tier: capped,
                added_units: new_units.len(),
                payload_tokens,
                cumulative_tokens,
                latency_ms: round2(charged_ms),
                completed,
                missing_groups,
            });

            covered = covered.max(capped);
            if completed || covered >= pool.len() {
                break;
            }
        }

        let latency_to_completion_ms =
            round2(attempts.iter().map(|a| a.latency_ms).sum::<f64>());

        Ok(StrategyOutcome {
            strategy: strategy.name().to_string(),
            attempt_count: attempts.len(),
            tokens_to_completion: cumulative_tokens,
            latency_to_completion_ms,
            completed,
            attempts,
        })
    }

    /// Run both strategies for one scenario and derive the reduction.
    pub fn run_scenario(
        &self,
        scenario: &Scenario,
        baseline_plan: &TierPlan,
        baseline: &mut dyn EvidenceStrategy,
        structured_plan: &TierPlan,
        structured: &mut dyn EvidenceStrategy,
    ) -> HarnessResult<ScenarioResult> {
        let baseline_outcome = self.run_strategy(scenario, baseline_plan, baseline)?;
        let structured_outcome = self.run_strategy(scenario, structured_plan, structured)?;

        let token_reduction_percent = round2(reduction_percent(
            baseline_outcome.tokens_to_completion as f64,
            structured_outcome.tokens_to_completion as f64,
        ));

        Ok(ScenarioResult {
            id: scenario.id.clone(),
            objective: scenario.objective.clone(),
            baseline: baseline_outcome,
            structured: structured_outcome,
            token_reduction_percent,
        })
    }
}

fn truncate_payload(payload: &mut String, max_chars: usize) {
    if payload.chars().count() <= max_chars {
        return;
    }
    let keep: String = payload.chars().take(max_chars).collect();
    payload.clear();
    payload.push_str(&keep);
    payload.push_str(TRUNCATION_MARKER);
}
