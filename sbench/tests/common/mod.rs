//! Shared fixtures for CLI integration tests: a stub search tool that
//! speaks the expected subcommand surface and emits canned JSON.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Stub search tool. `%PRELUDE%` is replaced per test (e.g. with a sleep
/// to simulate a regressed candidate).
const STUB_SCRIPT: &str = r#"#!/bin/sh
%PRELUDE%
case "$*" in
  *--help*)
    printf 'usage: stub index search locate expand --reuse\n'
    ;;
  index*)
    exit 0
    ;;
  *" locate "*)
    printf '%s' '{"results":[{"id":"sym-auth","path":"src/auth.rs"},{"id":"sym-router","path":"src/router.rs"},{"id":"sym-retry","path":"src/retry.rs"}]}'
    ;;
  *" expand "*)
    printf '%s' '{"results":[{"path":"src/auth.rs","snippet":"pub fn validate_session_token(token: &str) -> bool"}]}'
    ;;
  *" search "*)
    printf '%s' '{"results":[{"path":"src/auth.rs","snippet":"validate_session_token"}]}'
    ;;
  *)
    exit 0
    ;;
esac
exit 0
"#;

pub fn write_stub_tool(dir: &Path, name: &str, prelude: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, STUB_SCRIPT.replace("%PRELUDE%", prelude)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

pub fn run_sbench(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sbench"))
        .args(args)
        .output()
        .expect("failed to launch sbench")
}

pub fn exit_code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

pub fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout was not valid JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
