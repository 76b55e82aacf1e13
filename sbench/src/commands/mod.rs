//! Command implementations behind the CLI surface.

pub mod efficiency;
pub mod gate;
pub mod reuse_gate;

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

/// Outcome of a successful measurement run.
pub enum Verdict {
    Pass,
    GateFailed,
}

/// Print the payload to stdout and optionally persist it.
pub(crate) fn emit_payload<T: Serialize>(
    payload: &T,
    json_out: Option<&Path>,
) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(payload)?;
    println!("{rendered}");
    if let Some(path) = json_out {
        write_report(path, &format!("{rendered}\n"))?;
    }
    Ok(())
}

/// Write a report file, creating parent directories as needed.
pub(crate) fn write_report(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("writing report to {}", path.display()))
}

/// Resolve a binary path given on the command line, failing before any
/// measurement if it does not exist. Canonicalization matters because
/// measurements change the working directory per trial.
pub(crate) fn resolve_binary(label: &str, path: &Path) -> anyhow::Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("{label} binary not found: {}", path.display()))
}
