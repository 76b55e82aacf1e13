//! Git plumbing for the warm-start gate plus repository metadata capture.
//!
//! The reuse gate clones a seeded bare origin into a fresh directory per
//! trial so every measured index run starts from an identical, unmutated
//! checkout. Metadata capture (commit, tracked file count) is best-effort:
//! reports degrade to "unknown"/0 rather than failing a benchmark over
//! missing git state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sbench_core::errors::{HarnessError, HarnessResult};
use sbench_core::process::{CommandSpec, ExitExpectation};

const GIT_TIMEOUT: Duration = Duration::from_secs(120);
const FIXTURE_USER_EMAIL: &str = "gate@searchbench.dev";
const FIXTURE_USER_NAME: &str = "searchbench";

/// Run one git command, returning trimmed stdout. Nonzero exit is fatal:
/// fixture setup is a precondition of every measurement that follows.
pub fn git<I, S>(cwd: &Path, args: I) -> HarnessResult<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let run = CommandSpec::new("git", cwd)
        .args(args)
        .timeout(GIT_TIMEOUT)
        .run()?;
    Ok(run.stdout.trim().to_string())
}

/// Seed a repository with the given workload writer, commit it, and push
/// it to a bare origin inside `root`. Returns the origin path.
pub fn setup_origin<F>(root: &Path, write_workload: F) -> HarnessResult<PathBuf>
where
    F: FnOnce(&Path) -> HarnessResult<()>,
{
    let seed = root.join("seed");
    std::fs::create_dir_all(&seed)?;
    git(&seed, ["init"])?;
    git(&seed, ["config", "user.email", FIXTURE_USER_EMAIL])?;
    git(&seed, ["config", "user.name", FIXTURE_USER_NAME])?;
    write_workload(&seed)?;
    git(&seed, ["add", "."])?;
    git(&seed, ["commit", "-m", "seed workload"])?;
    git(&seed, ["branch", "-M", "main"])?;

    let origin = root.join("origin.git");
    let origin_str = origin.to_string_lossy().into_owned();
    git(&seed, ["init", "--bare", origin_str.as_str()])?;
    git(&seed, ["remote", "add", "origin", origin_str.as_str()])?;
    git(&seed, ["push", "-u", "origin", "main"])?;
    git(&origin, ["symbolic-ref", "HEAD", "refs/heads/main"])?;
    Ok(origin)
}

/// Clone the origin into `dst`, leaving a checkout identical to the seed.
pub fn clone_origin(origin: &Path, dst: &Path) -> HarnessResult<()> {
    let parent = dst.parent().ok_or_else(|| {
        HarnessError::Setup(format!(
            "clone destination {} has no parent directory",
            dst.display()
        ))
    })?;
    git(
        parent,
        [
            "clone".to_string(),
            origin.to_string_lossy().into_owned(),
            dst.to_string_lossy().into_owned(),
        ],
    )?;
    git(dst, ["checkout", "-B", "main", "origin/main"])?;
    git(dst, ["config", "user.email", FIXTURE_USER_EMAIL])?;
    git(dst, ["config", "user.name", FIXTURE_USER_NAME])?;
    Ok(())
}

/// Short commit hash of a checkout, or "unknown".
pub fn rev_short(path: &Path) -> String {
    let run = CommandSpec::new("git", path)
        .args(["rev-parse", "--short", "HEAD"])
        .timeout(GIT_TIMEOUT)
        .expectation(ExitExpectation::Any)
        .run();
    match run {
        Ok(run) if run.success() && !run.stdout.trim().is_empty() => {
            run.stdout.trim().to_string()
        }
        _ => "unknown".to_string(),
    }
}

/// Number of tracked files in a checkout, or 0.
pub fn tracked_file_count(path: &Path) -> usize {
    let run = CommandSpec::new("git", path)
        .args(["ls-files"])
        .timeout(GIT_TIMEOUT)
        .expectation(ExitExpectation::Any)
        .run();
    match run {
        Ok(run) if run.success() => run.stdout.lines().filter(|l| !l.is_empty()).count(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        CommandSpec::new("git", std::env::temp_dir())
            .arg("--version")
            .expectation(ExitExpectation::Any)
            .run()
            .is_ok()
    }

    #[test]
    fn metadata_capture_degrades_outside_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(rev_short(dir.path()), "unknown");
        assert_eq!(tracked_file_count(dir.path()), 0);
    }

    #[test]
    fn origin_setup_and_clone_round_trip() {
        if !git_available() {
            eprintln!("git not available; skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let origin = setup_origin(dir.path(), |seed| {
            std::fs::create_dir_all(seed.join("src"))?;
            std::fs::write(seed.join("src/lib.rs"), "pub fn probe() {}\n")?;
            Ok(())
        })
        .unwrap();
        assert!(origin.exists());

        let clone = dir.path().join("trial-1");
        clone_origin(&origin, &clone).unwrap();
        assert!(clone.join("src/lib.rs").exists());
        assert_ne!(rev_short(&clone), "unknown");
        assert_eq!(tracked_file_count(&clone), 1);
    }
}
