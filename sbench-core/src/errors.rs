//! Error taxonomy for the measurement harness.
//!
//! Failures split into two families the CLI maps to distinct exit codes:
//! configuration/execution problems ("could not measure") and gate verdicts
//! ("measured, and it got worse", which is not an error and is handled
//! by the caller).
//! Timeouts carry their own variant so a hung tool is distinguishable from
//! a tool that exited nonzero.

use std::time::Duration;

/// Errors that can occur while preparing or running a measurement.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Invalid configuration detected before any measurement began.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The external command could not be started at all.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A must-succeed invocation exited with an unexpected status.
    #[error("{program} exited with status {code}\nstdout tail:\n{stdout_tail}\nstderr tail:\n{stderr_tail}")]
    CommandFailed {
        program: String,
        code: i32,
        stdout_tail: String,
        stderr_tail: String,
    },

    /// The invocation exceeded its per-run timeout and was killed.
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// Filesystem failure while managing workloads or reports.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Workload or fixture setup failed before measurement.
    #[error("setup failed: {0}")]
    Setup(String),

    /// A scenario registry file could not be decoded.
    #[error("malformed scenario file {path}: {message}")]
    ScenarioFile { path: String, message: String },
}

impl HarnessError {
    /// Whether this error was detectable before any measurement ran.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::ScenarioFile { .. })
    }
}

/// Result alias used throughout the library crate.
pub type HarnessResult<T> = Result<T, HarnessError>;
