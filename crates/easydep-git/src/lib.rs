//! Shell-driven git operations.
//!
//! Every function here invokes the `git` binary via [`git_program`],
//! which honors `EASYDEP_GIT_BIN` so tests can point it at a fake
//! script. None of these calls are routed through the pipeline's async
//! cancellation: `Checkout` (fetch + reset) is synchronous work inside
//! a single stage and relies on the preceding stage's compensation
//! (deleting the release directory) to undo it on cancel.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};

/// Resolves the `git` binary to invoke, honoring `EASYDEP_GIT_BIN` for
/// tests that want to substitute a fake script.
pub fn git_program() -> String {
    std::env::var("EASYDEP_GIT_BIN").unwrap_or_else(|_| "git".to_string())
}

fn run(args: &[&str], cwd: &Path) -> Result<String> {
    let output = Command::new(git_program())
        .args(args)
        .current_dir(cwd)
        .output()
        .with_context(|| format!("failed to run git {args:?} in {}", cwd.display()))?;

    if !output.status.success() {
        bail!(
            "git {:?} failed in {}: {}",
            args,
            cwd.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Whether `path` already contains a clone of the release's repository
/// (used by `RepoInit` to decide clone vs. update-and-reuse).
pub fn is_repo_present(path: &Path) -> bool {
    path.join(".git").exists()
}

/// Clones `url` into `dest`, creating `dest`'s parent if needed. Used
/// once to populate the shared clone cache; subsequent releases reuse
/// it via [`update_remote_url`] and [`fetch_prune_tags`].
pub fn clone_bare_cache(url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let dest_str = dest.to_string_lossy().to_string();
    let args = ["clone", "--no-checkout", url, dest_str.as_str()];
    let cwd = dest.parent().unwrap_or_else(|| Path::new("."));
    run(&args, cwd).map(|_| ())
}

/// Rewrites the cached clone's `origin` remote, since minted access
/// tokens embedded in the URL rotate on every deploy.
pub fn update_remote_url(repo: &Path, url: &str) -> Result<()> {
    run(&["remote", "set-url", "origin", url], repo).map(|_| ())
}

/// Fetches tags and prunes refs deleted upstream.
pub fn fetch_prune_tags(repo: &Path) -> Result<()> {
    run(&["fetch", "--prune", "--tags", "origin"], repo).map(|_| ())
}

/// Hard-resets the working tree at `repo` to `tag`, discarding any
/// local changes (the release directory is disposable and recreated
/// from the cache on every deploy, so this is always safe).
pub fn hard_reset_to_tag(repo: &Path, tag: &str) -> Result<()> {
    run(&["checkout", "--force", tag], repo)?;
    run(&["reset", "--hard", tag], repo).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            unsafe {
                match &self.previous {
                    Some(v) => std::env::set_var(self.key, v),
                    None => std::env::remove_var(self.key),
                }
            }
        }
    }

    fn write_fake_git(dir: &Path, exit_code: i32) -> std::path::PathBuf {
        let path = dir.join(if cfg!(windows) { "git.bat" } else { "git" });
        let body = if cfg!(windows) {
            format!("@echo off\r\nexit /b {exit_code}\r\n")
        } else {
            format!("#!/bin/sh\nexit {exit_code}\n")
        };
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    #[serial_test::serial]
    fn git_program_honors_env_override() {
        let _guard = EnvGuard::set("EASYDEP_GIT_BIN", "/custom/git");
        assert_eq!(git_program(), "/custom/git");
    }

    #[test]
    #[serial_test::serial]
    fn git_program_defaults_to_git() {
        let previous = std::env::var("EASYDEP_GIT_BIN").ok();
        unsafe {
            std::env::remove_var("EASYDEP_GIT_BIN");
        }
        assert_eq!(git_program(), "git");
        if let Some(v) = previous {
            unsafe {
                std::env::set_var("EASYDEP_GIT_BIN", v);
            }
        }
    }

    #[test]
    fn is_repo_present_checks_dot_git() {
        let td = tempdir().unwrap();
        assert!(!is_repo_present(td.path()));
        fs::create_dir(td.path().join(".git")).unwrap();
        assert!(is_repo_present(td.path()));
    }

    #[test]
    #[serial_test::serial]
    fn run_surfaces_stderr_on_failure() {
        let td = tempdir().unwrap();
        let fake = write_fake_git(td.path(), 1);
        let _guard = EnvGuard::set("EASYDEP_GIT_BIN", fake.to_str().unwrap());

        let result = fetch_prune_tags(td.path());
        assert!(result.is_err());
    }
}
