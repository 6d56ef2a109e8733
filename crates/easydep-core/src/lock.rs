//! Advisory lock file preventing two agent processes from driving the
//! same deployment root at once.
//!
//! This is a single-host safety net, not a coordination primitive for
//! a fleet: it only protects against a second `easydep` process being
//! started against the same root on the same machine (e.g. after a
//! botched restart leaves an old process running).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata recorded in the lock file about who holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub hostname: String,
    pub acquired_at: DateTime<Utc>,
}

/// Handle to an acquired lock file. Releases on `Drop`.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Acquires the lock at `path`, failing if it is already held by a
    /// still-running process. A lock file whose recorded pid is no
    /// longer alive (e.g. left behind by a crashed agent) is treated as
    /// abandoned and silently replaced.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create lock directory {}", parent.display()))?;
        }

        if path.exists() {
            match Self::read_info(path) {
                Ok(existing) if process_is_alive(existing.pid) => {
                    bail!(
                        "deployment root already locked by pid {} on {} since {}",
                        existing.pid,
                        existing.hostname,
                        existing.acquired_at,
                    );
                }
                Ok(existing) => {
                    tracing::warn!(
                        pid = existing.pid,
                        hostname = %existing.hostname,
                        acquired_at = %existing.acquired_at,
                        "removing stale lock file left by a process that is no longer running"
                    );
                    fs::remove_file(path).with_context(|| {
                        format!("failed to remove stale lock file {}", path.display())
                    })?;
                }
                Err(_) => {
                    tracing::warn!(path = %path.display(), "removing corrupt lock file");
                    fs::remove_file(path).with_context(|| {
                        format!("failed to remove corrupt lock file {}", path.display())
                    })?;
                }
            }
        }

        let info = LockInfo {
            pid: std::process::id(),
            hostname: gethostname::gethostname().to_string_lossy().to_string(),
            acquired_at: Utc::now(),
        };
        Self::write_info(path, &info)?;

        Ok(Self { path: path.to_path_buf() })
    }

    /// Like `acquire`, but additionally treats an existing lock as
    /// abandoned once it's older than `max_age`, regardless of whether
    /// its pid still happens to be alive (e.g. reused by an unrelated
    /// process after a reboot). Mainly useful for an operator override;
    /// `acquire`'s own pid-liveness check already handles the common
    /// crash-recovery case.
    pub fn acquire_breaking_stale(path: &Path, max_age: chrono::Duration) -> Result<Self> {
        if path.exists() {
            match Self::read_info(path) {
                Ok(info) if Utc::now() - info.acquired_at > max_age => {
                    fs::remove_file(path).with_context(|| {
                        format!("failed to remove stale lock file {}", path.display())
                    })?;
                }
                Err(_) => {
                    fs::remove_file(path).with_context(|| {
                        format!("failed to remove corrupt lock file {}", path.display())
                    })?;
                }
                Ok(_) => {}
            }
        }
        Self::acquire(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(&mut self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove lock file {}", self.path.display()))?;
        }
        Ok(())
    }

    pub fn read_info(path: &Path) -> Result<LockInfo> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read lock file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse lock JSON from {}", path.display()))
    }

    fn write_info(path: &Path, info: &LockInfo) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(info).context("failed to serialize lock info")?;
        {
            let mut file = File::create(&tmp_path)
                .with_context(|| format!("failed to create lock tmp file {}", tmp_path.display()))?;
            file.write_all(json.as_bytes())
                .with_context(|| format!("failed to write lock tmp file {}", tmp_path.display()))?;
            file.sync_all().context("failed to sync lock file")?;
        }
        fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename lock file into place at {}", path.display()))
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// Whether `pid` still identifies a running process. Used to tell a
/// genuinely held lock apart from one left behind by a process that
/// crashed or was killed before it could `Drop` its `LockFile`.
#[cfg(target_os = "linux")]
fn process_is_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

/// No portable liveness check off Linux; conservatively assume the
/// recorded holder is still alive rather than silently breaking
/// someone's lock.
#[cfg(not(target_os = "linux"))]
fn process_is_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_and_release_removes() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(".easydep.lock");
        let mut lock = LockFile::acquire(&path).unwrap();
        assert!(path.exists());
        lock.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(".easydep.lock");
        let _first = LockFile::acquire(&path).unwrap();
        let second = LockFile::acquire(&path);
        assert!(second.is_err());
        assert!(second.unwrap_err().to_string().contains("already locked"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn acquire_replaces_lock_held_by_a_dead_pid() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(".easydep.lock");
        let dead = LockInfo {
            // PID 1 is always alive; a pid this high is vanishingly
            // unlikely to be in use, which is the point.
            pid: 999_999,
            hostname: "dead-host".to_string(),
            acquired_at: Utc::now(),
        };
        fs::write(&path, serde_json::to_string(&dead).unwrap()).unwrap();

        let lock = LockFile::acquire(&path).unwrap();
        let info = LockFile::read_info(lock.path()).unwrap();
        assert_eq!(info.pid, std::process::id());
    }

    #[test]
    fn drop_releases_lock() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(".easydep.lock");
        {
            let _lock = LockFile::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn acquire_breaking_stale_removes_old_lock() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(".easydep.lock");
        let stale = LockInfo {
            pid: 999_999,
            hostname: "dead-host".to_string(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        let json = serde_json::to_string(&stale).unwrap();
        fs::write(&path, json).unwrap();

        let lock = LockFile::acquire_breaking_stale(&path, chrono::Duration::hours(1)).unwrap();
        let info = LockFile::read_info(lock.path()).unwrap();
        assert_eq!(info.pid, std::process::id());
    }

    #[test]
    fn acquire_breaking_stale_respects_fresh_lock() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(".easydep.lock");
        let _first = LockFile::acquire(&path).unwrap();
        let result = LockFile::acquire_breaking_stale(&path, chrono::Duration::hours(1));
        assert!(result.is_err());
    }
}
