//! S8: subscribes to every lifecycle event and runs the matching
//! `<release_dir>/.easydep/<event>[.{stage}].sh` script if present.
//! Fire-and-forget: it never influences pipeline state, only side
//! effects the operator wired up themselves (notifications, etc).

use std::thread;

use easydep_types::LifecycleEvent;

use crate::context::ExecutionContext;
use crate::path_layout::PathLayout;
use crate::stages::script_runner;

/// Installs the bridge on `ctx`'s event bus. `layout` is enough to
/// locate a release's directory from just the id carried on each
/// event, so this does not need to be threaded through the chain as
/// a `Stage` itself.
pub fn install(ctx: &ExecutionContext, layout: PathLayout) {
    ctx.events().subscribe(
        None,
        0,
        Box::new(move |event| handle(&layout, event)),
    );
}

fn handle(layout: &PathLayout, event: &LifecycleEvent) {
    let script_name = match event {
        LifecycleEvent::ChainStarted { .. } => return,
        LifecycleEvent::StageSucceeded { stage, .. } => format!("on_stage_succeeded.{stage}"),
        LifecycleEvent::StageFailed { stage, .. } => format!("on_stage_failed.{stage}"),
        LifecycleEvent::ChainFinished { .. } => "on_chain_finished".to_string(),
        LifecycleEvent::ChainFailed { .. } => "on_chain_failed".to_string(),
    };

    let release_dir = layout.release_dir(event.release_id());
    let script = release_dir.join(".easydep").join(format!("{script_name}.sh"));
    if !script.exists() {
        return;
    }

    let log_path = release_dir
        .join(".scriptlog")
        .join(format!("{script_name}-{}.log", script_runner::next_log_suffix()));

    match script_runner::spawn_bash_script(&script, &release_dir, &log_path) {
        Ok(proc) => {
            let scope = format!("easydep-lifecycle-{script_name}-{}", event.release_id());
            thread::spawn(move || {
                proc.wait_for_exit().recv();
                script_runner::stream_log_to_tracing(&log_path, &scope);
            });
        }
        Err(err) => {
            tracing::warn!(script = %script.display(), %err, "failed to spawn lifecycle script");
        }
    }
}
