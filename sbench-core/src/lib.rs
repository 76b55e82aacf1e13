//! Measurement core for the searchbench harness.
//!
//! Two measurement disciplines live here:
//!
//! - **Regression gating**: warmup/measured sampling of timed subprocess
//!   invocations, p50/p95 reduction, and a dual-threshold comparison
//!   (relative limit + absolute floor) of a baseline binary against a
//!   candidate.
//! - **Completion-tiered benchmarking**: two retrieval strategies expand
//!   evidence in increasing tiers until a scenario's completion marker
//!   groups are satisfied or the evidence pool runs dry, accumulating
//!   token cost and latency per tier.
//!
//! Everything executes single-threaded and sequentially; the only
//! concurrency is the pair of pipe-drain threads inside a single
//! subprocess invocation.

pub mod aggregate;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod process;
pub mod regression;
pub mod sampling;
pub mod scenario;
pub mod tokens;
pub mod tool;

pub use aggregate::{EfficiencySummary, summarize_results};
pub use engine::{
    AttemptRecord, CompletionEngine, EvidenceStrategy, ScenarioResult, StrategyOutcome, TierPlan,
};
pub use errors::{HarnessError, HarnessResult};
pub use logging::{LogConfig, init_logging};
pub use process::{CommandRun, CommandSpec, ExitExpectation};
pub use regression::{GatePayload, GateThresholds, MetricComparison, evaluate_gate};
pub use sampling::{LatencySummary, collect_samples, summarize};
pub use scenario::{MarkerGroup, Scenario};
pub use tokens::{TokenCounter, TokenizerKind};
pub use tool::SearchTool;
