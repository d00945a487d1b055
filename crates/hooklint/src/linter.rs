//! Linter subprocess invocation.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, warn};

/// Outcome of one linter run.
#[derive(Debug, Clone)]
pub struct LintResult {
    /// Whether the linter launched and exited cleanly.
    pub succeeded: bool,
    /// Captured stdout followed by stderr.
    pub combined_output: String,
}

/// Run the linter once against the snapshot at `workdir`.
///
/// The linter is invoked with no arguments and the ambient process
/// environment. A spawn failure or nonzero exit is not a pipeline
/// error: it is the lint failure signal, reported through
/// [`LintResult::succeeded`]. No retries.
pub async fn run(command: &str, workdir: &Path) -> LintResult {
    debug!(command = %command, workdir = %workdir.display(), "Running linter");

    match Command::new(command).current_dir(workdir).output().await {
        Ok(output) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            LintResult {
                succeeded: output.status.success(),
                combined_output: combined,
            }
        }
        Err(e) => {
            warn!(command = %command, error = %e, "Failed to launch linter");
            LintResult {
                succeeded: false,
                combined_output: format!("failed to launch {command}: {e}\n"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("fake-linter");
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_clean_exit_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let linter = script(dir.path(), "echo all good\n");

        let result = run(linter.to_str().unwrap(), dir.path()).await;
        assert!(result.succeeded);
        assert_eq!(result.combined_output, "all good\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_with_output_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let linter = script(dir.path(), "echo problems found\necho details >&2\nexit 1\n");

        let result = run(linter.to_str().unwrap(), dir.path()).await;
        assert!(!result.succeeded);
        // stdout first, then stderr
        assert_eq!(result.combined_output, "problems found\ndetails\n");
    }

    #[tokio::test]
    async fn test_runs_in_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let linter = script(dir.path(), "cat marker.txt\n");

        let result = run(linter.to_str().unwrap(), dir.path()).await;
        assert!(result.succeeded);
        assert_eq!(result.combined_output, "here");
    }

    #[tokio::test]
    async fn test_missing_executable_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();

        let result = run("/nonexistent/linter", dir.path()).await;
        assert!(!result.succeeded);
        assert!(result.combined_output.contains("failed to launch"));
    }
}
