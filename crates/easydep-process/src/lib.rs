//! Supervised child-process execution with merged log capture.
//!
//! A [`SupervisedProcess`] owns a spawned child and the path its
//! stdout+stderr were merged into. Exit is observed asynchronously via
//! [`SupervisedProcess::wait_for_exit`], which hands back an
//! [`ExitWaiter`] pollable from another thread; [`SupervisedProcess::kill_now`]
//! is safe to call concurrently (e.g. from a compensation hook) and is
//! idempotent.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};

/// Outcome of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: i32,
    pub killed: bool,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        !self.killed && self.code == 0
    }
}

/// Handle returned by [`SupervisedProcess::wait_for_exit`]; blocks on
/// `recv()` until the background waiter thread observes the child exit
/// (or discovers it was killed).
pub struct ExitWaiter {
    rx: Receiver<ExitStatus>,
}

impl ExitWaiter {
    /// Blocks the calling thread until the process has exited.
    ///
    /// The pipeline runner calls this off its own worker thread so that
    /// cancellation (which runs `kill_now` from a different thread) is
    /// never blocked behind it.
    pub fn recv(self) -> ExitStatus {
        self.rx.recv().unwrap_or(ExitStatus {
            code: -1,
            killed: true,
        })
    }
}

pub struct SupervisedProcess {
    child: Arc<Mutex<Child>>,
    log_path: PathBuf,
    killed: Arc<Mutex<bool>>,
}

impl SupervisedProcess {
    /// Spawns `program` with `args` rooted at `cwd`, merging stdout and
    /// stderr into a single file at `log_path` (created/truncated).
    pub fn spawn_logged(
        program: &str,
        args: &[&str],
        cwd: &Path,
        log_path: &Path,
    ) -> Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log dir {}", parent.display()))?;
        }

        let out_file = File::create(log_path)
            .with_context(|| format!("failed to create log file {}", log_path.display()))?;
        let err_file = out_file
            .try_clone()
            .context("failed to clone log file handle for stderr")?;

        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out_file))
            .stderr(Stdio::from(err_file))
            .spawn()
            .with_context(|| format!("failed to spawn '{program}'"))?;

        Ok(Self {
            child: Arc::new(Mutex::new(child)),
            log_path: log_path.to_path_buf(),
            killed: Arc::new(Mutex::new(false)),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Immediate, non-graceful termination. Safe to call from any
    /// thread, including after the process has already exited.
    pub fn kill_now(&self) {
        *self.killed.lock().expect("process lock poisoned") = true;
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Spawns a background waiter thread and returns a handle that
    /// yields the exit status once observed. Never blocks the caller.
    pub fn wait_for_exit(&self) -> ExitWaiter {
        let (tx, rx) = mpsc::channel();
        let child = Arc::clone(&self.child);
        let killed_flag = Arc::clone(&self.killed);

        thread::spawn(move || {
            let status = {
                let mut child = child.lock().expect("process lock poisoned");
                child.wait()
            };
            let killed = *killed_flag.lock().expect("process lock poisoned");
            let result = match status {
                Ok(status) => ExitStatus {
                    code: status.code().unwrap_or(-1),
                    killed,
                },
                Err(_) => ExitStatus {
                    code: -1,
                    killed: true,
                },
            };
            let _ = tx.send(result);
        });

        ExitWaiter { rx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn script_for(body: &str) -> (&'static str, Vec<String>) {
        if cfg!(windows) {
            ("cmd", vec!["/C".to_string(), body.to_string()])
        } else {
            ("sh", vec!["-c".to_string(), body.to_string()])
        }
    }

    #[test]
    fn captures_merged_output_and_success_exit() {
        let td = tempdir().unwrap();
        let log_path = td.path().join("run.log");
        let (program, args) = script_for("echo hello; echo world 1>&2");
        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();

        let proc = SupervisedProcess::spawn_logged(program, &args_ref, td.path(), &log_path)
            .expect("spawn");
        let status = proc.wait_for_exit().recv();

        assert!(status.success());
        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("hello"));
        assert!(contents.contains("world"));
    }

    #[test]
    fn nonzero_exit_is_not_success() {
        let td = tempdir().unwrap();
        let log_path = td.path().join("run.log");
        let (program, args) = script_for("exit 3");
        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();

        let proc = SupervisedProcess::spawn_logged(program, &args_ref, td.path(), &log_path)
            .expect("spawn");
        let status = proc.wait_for_exit().recv();

        assert!(!status.success());
        assert_eq!(status.code, 3);
        assert!(!status.killed);
    }

    #[test]
    fn kill_now_marks_killed() {
        let td = tempdir().unwrap();
        let log_path = td.path().join("run.log");
        let (program, args) = script_for("sleep 30");
        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();

        let proc = SupervisedProcess::spawn_logged(program, &args_ref, td.path(), &log_path)
            .expect("spawn");
        let waiter = proc.wait_for_exit();
        proc.kill_now();
        let status = waiter.recv();

        assert!(status.killed);
        assert!(!status.success());
    }
}
