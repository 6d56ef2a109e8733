//! Shared spawn-and-log plumbing for `DeployScript` (S5) and the
//! lifecycle-script bridge (S8): both invoke a release-local script
//! with `bash`, merge its output into a per-run log file, and stream
//! that log to `tracing` once the process exits.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use easydep_process::SupervisedProcess;

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

/// A filename-safe, monotonically increasing suffix so concurrent log
/// files for the same script basename never collide.
pub fn next_log_suffix() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Spawns `<cwd>/.easydep/<script_basename>` via `bash`, with stdout
/// and stderr merged into `log_path`.
pub fn spawn_bash_script(script: &Path, cwd: &Path, log_path: &Path) -> Result<SupervisedProcess> {
    let script_str = script.to_string_lossy().to_string();
    SupervisedProcess::spawn_logged("bash", &[script_str.as_str()], cwd, log_path)
        .with_context(|| format!("failed to spawn script {}", script.display()))
}

/// Reads `log_path` and re-emits each line at INFO under `scope`, a
/// stable tag (derived from the release id) so operators can grep a
/// single deploy's script output out of the aggregate log stream.
pub fn stream_log_to_tracing(log_path: &Path, scope: &str) {
    match std::fs::read_to_string(log_path) {
        Ok(contents) => {
            for line in contents.lines() {
                tracing::info!(scope = scope, "{}", line);
            }
        }
        Err(err) => {
            tracing::warn!(scope = scope, %err, path = %log_path.display(), "failed to read script log");
        }
    }
}
