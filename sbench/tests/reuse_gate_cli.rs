//! End-to-end test for the `reuse-gate` subcommand. Requires git; the
//! test bails out quietly on machines without it.
#![cfg(unix)]

mod common;

use common::{exit_code, run_sbench, stderr_text, stdout_json, write_stub_tool};

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[test]
fn identical_binaries_pass_the_reuse_gate() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let stub = write_stub_tool(dir.path(), "tool", "");
    let stub = stub.to_str().unwrap();

    let out = run_sbench(&[
        "reuse-gate",
        "--baseline-bin",
        stub,
        "--candidate-bin",
        stub,
        "--runs",
        "1",
        "--warmup",
        "0",
        "--files",
        "10",
        "--floor-ms",
        "25",
    ]);
    assert_eq!(exit_code(&out), 0, "stderr: {}", stderr_text(&out));

    let payload = stdout_json(&out);
    assert!(payload["baseline"]["cold_index_ms"].is_number());
    assert!(payload["candidate"]["warm_index_ms"].is_number());
    assert!(payload["regression_pct"]["warm_index_overhead_ms"].is_number());
    // The stub advertises --reuse in its help text.
    assert_eq!(payload["compat"]["supported"], true);
    assert_eq!(payload["failed"].as_array().unwrap().len(), 0);
}

#[test]
fn invalid_file_count_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let stub = write_stub_tool(dir.path(), "tool", "");
    let stub = stub.to_str().unwrap();

    let out = run_sbench(&[
        "reuse-gate",
        "--baseline-bin",
        stub,
        "--candidate-bin",
        stub,
        "--files",
        "0",
    ]);
    assert_eq!(exit_code(&out), 2);
    assert!(stderr_text(&out).contains("--files"));
}
