//! S5: runs `<release_dir>/.easydep/execute.sh` if present, merging
//! its output into a per-run log file and awaiting its exit through
//! the runner's async-suspension protocol.

use std::sync::Arc;
use std::thread;

use easydep_types::{EasydepError, StageName};

use crate::context::{ExecutionContext, RunnerSignal};
use crate::stage::{Stage, StageOutcome};
use crate::stages::script_runner;
use crate::value::DeployValue;

const SCRIPT_NAME: &str = "execute.sh";

pub struct DeployScript;

impl Stage for DeployScript {
    fn name(&self) -> StageName {
        StageName::DeployScript
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        input: DeployValue,
    ) -> Result<StageOutcome, EasydepError> {
        let path = input
            .path()
            .ok_or_else(|| EasydepError::EmptyStageOutput("deploy_script".to_string()))?
            .to_path_buf();
        let release = input.release().clone();

        let script = path.join(".easydep").join(SCRIPT_NAME);
        if !script.exists() {
            tracing::info!(release_id = release.id, "no deploy script present, skipping");
            return Ok(StageOutcome::Value(DeployValue::ReleaseAtPath(release, path)));
        }

        let log_path = path
            .join(".scriptlog")
            .join(format!("execute-{}.log", script_runner::next_log_suffix()));

        let proc = Arc::new(
            script_runner::spawn_bash_script(&script, &path, &log_path)
                .map_err(|e| EasydepError::stage("deploy_script", e))?,
        );

        ctx.set_info("easydep_execute_log", log_path.to_string_lossy().into_owned());

        let compensation_proc = Arc::clone(&proc);
        ctx.register_compensation(move || compensation_proc.kill_now());

        let abort_proc = Arc::clone(&proc);
        ctx.set_pending_abort(move || abort_proc.kill_now());

        let failure_proc = Arc::clone(&proc);
        ctx.events().subscribe(
            Some("chain_failed"),
            crate::event_bus::DEFAULT_PRIORITY,
            Box::new(move |_event| failure_proc.kill_now()),
        );

        let waiter = proc.wait_for_exit();
        let tx = ctx.async_sender();
        let scope = format!("easydep-release-{}", release.id);

        thread::spawn(move || {
            let status = waiter.recv();
            script_runner::stream_log_to_tracing(&log_path, &scope);

            let result = if status.success() {
                Ok(DeployValue::ReleaseAtPath(release, path))
            } else if status.killed {
                Err(EasydepError::Cancelled)
            } else {
                Err(EasydepError::ScriptExit(status.code))
            };
            let _ = tx.send(RunnerSignal::AsyncResult(result));
        });

        Ok(StageOutcome::Awaiting)
    }
}
