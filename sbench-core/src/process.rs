//! Subprocess execution with output capture and enforced timeouts.
//!
//! Every external invocation in the harness flows through [`CommandSpec::run`]:
//! stdout and stderr are drained on reader threads (a filled pipe buffer
//! would otherwise deadlock a chatty child), the child is polled with
//! `try_wait`, and a child that outlives its timeout is killed and reported
//! as a distinct [`HarnessError::Timeout`], never retried.
//!
//! Environment overrides are additive: the child inherits the parent
//! environment and the overrides are layered on top.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::errors::{HarnessError, HarnessResult};

/// How many trailing characters of captured output to surface in errors.
const OUTPUT_TAIL_CHARS: usize = 2000;

/// What exit statuses a caller is prepared to accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitExpectation {
    /// Anything other than exit code 0 is a fatal invocation failure.
    MustSucceed,
    /// Exit code 0 plus the listed codes are valid (e.g. grep's 1 for
    /// "no matches").
    Tolerate(Vec<i32>),
    /// Any exit code is recorded, never fatal. Used where partial data is
    /// acceptable and the caller inspects the code itself.
    Any,
}

impl ExitExpectation {
    fn accepts(&self, code: i32) -> bool {
        match self {
            Self::MustSucceed => code == 0,
            Self::Tolerate(codes) => code == 0 || codes.contains(&code),
            Self::Any => true,
        }
    }
}

/// One external invocation: program, arguments, working directory,
/// additive environment overrides, timeout, and exit expectation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<String>,
    cwd: PathBuf,
    envs: BTreeMap<String, String>,
    timeout: Duration,
    expectation: ExitExpectation,
}

/// Default per-invocation timeout when the caller does not set one.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            envs: BTreeMap::new(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            expectation: ExitExpectation::MustSucceed,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Layer one variable on top of the inherited environment.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    /// Layer a set of variables on top of the inherited environment.
    #[must_use]
    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        for (k, v) in vars {
            self.envs.insert(k.clone(), v.clone());
        }
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn expectation(mut self, expectation: ExitExpectation) -> Self {
        self.expectation = expectation;
        self
    }

    /// Shorthand for `Tolerate` with the given extra codes.
    #[must_use]
    pub fn tolerate(self, codes: &[i32]) -> Self {
        self.expectation(ExitExpectation::Tolerate(codes.to_vec()))
    }

    /// The command line as displayed in logs and payloads.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    fn command_vec(&self) -> Vec<String> {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().cloned());
        parts
    }

    /// Run the command to completion, measuring wall-clock duration.
    pub fn run(&self) -> HarnessResult<CommandRun> {
        let program_name = self.program.to_string_lossy().into_owned();
        debug!(command = %self.display(), cwd = %self.cwd.display(), "executing");

        let start = Instant::now();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|source| HarnessError::Spawn {
            program: program_name.clone(),
            source,
        })?;

        let stdout_handle = child
            .stdout
            .take()
            .map(|mut pipe| thread::spawn(move || read_to_string_lossy(&mut pipe)));
        let stderr_handle = child
            .stderr
            .take()
            .map(|mut pipe| thread::spawn(move || read_to_string_lossy(&mut pipe)));

        let exit_status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                // Drain the readers so the threads do not leak.
                join_output(stdout_handle);
                join_output(stderr_handle);
                return Err(HarnessError::Timeout {
                    program: program_name,
                    timeout: self.timeout,
                });
            }
            thread::sleep(Duration::from_millis(5));
        };

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let stdout = join_output(stdout_handle);
        let stderr = join_output(stderr_handle);
        let exit_code = exit_status.code().unwrap_or(-1);

        debug!(
            command = %self.display(),
            exit_code,
            duration_ms,
            "command completed"
        );

        if !self.expectation.accepts(exit_code) {
            return Err(HarnessError::CommandFailed {
                program: program_name,
                code: exit_code,
                stdout_tail: tail(&stdout, OUTPUT_TAIL_CHARS),
                stderr_tail: tail(&stderr, OUTPUT_TAIL_CHARS),
            });
        }

        Ok(CommandRun {
            command: self.command_vec(),
            exit_code,
            duration_ms,
            stdout,
            stderr,
        })
    }
}

/// Outcome of one external invocation. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRun {
    pub command: Vec<String>,
    pub exit_code: i32,
    pub duration_ms: f64,
    pub stdout: String,
    pub stderr: String,
}

impl CommandRun {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Take the trailing `max` characters of a string, on a char boundary.
pub fn tail(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    s.chars().skip(count - max).collect()
}

fn read_to_string_lossy(pipe: &mut impl Read) -> String {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
