//! The single-writer component deciding whether an incoming release
//! starts a forward deploy, a rollback, or is ignored.

use std::sync::{Arc, Mutex};

use easydep_types::Release;

use crate::context::ExecutionContext;
use crate::path_layout::PathLayout;
use crate::runner::PipelineRunner;
use crate::stage::Stage;
use crate::stages::lifecycle_script_bridge;
use crate::value::DeployValue;

struct SupervisorState {
    last_executed_id: i64,
    last_scheduled: Option<Arc<ExecutionContext>>,
}

/// Serializes deployment decisions so that at most one chain mutates
/// the filesystem under `root` at any instant.
pub struct ReleaseSupervisor {
    layout: PathLayout,
    forward_chain: Vec<Arc<dyn Stage>>,
    rollback_chain: Vec<Arc<dyn Stage>>,
    state: Mutex<SupervisorState>,
}

impl ReleaseSupervisor {
    /// `forward_chain` is the full S1-S7 deploy chain; `rollback_chain`
    /// is just `SymlinkFlip`. `last_executed_id` is recovered from the
    /// current link's target, or `-1` if absent or unparseable.
    pub fn new(
        layout: PathLayout,
        forward_chain: Vec<Arc<dyn Stage>>,
        rollback_chain: Vec<Arc<dyn Stage>>,
    ) -> Self {
        let last_executed_id = layout.read_current_release_id().unwrap_or(-1);
        Self {
            layout,
            forward_chain,
            rollback_chain,
            state: Mutex::new(SupervisorState {
                last_executed_id,
                last_scheduled: None,
            }),
        }
    }

    /// The most recently accepted release id, or `-1` if none has been
    /// seen yet. Used by the optional status endpoint; never drives
    /// control flow outside the supervisor itself.
    pub fn current_release_id(&self) -> i64 {
        self.state.lock().expect("supervisor lock poisoned").last_executed_id
    }

    pub fn enqueue(&self, release: Release) {
        let mut state = self.state.lock().expect("supervisor lock poisoned");

        if release.id > state.last_executed_id {
            state.last_executed_id = release.id;
            Self::cancel_current(&mut state);
            self.start_forward(&mut state, release);
        } else if release.id < state.last_executed_id {
            state.last_executed_id = release.id;
            Self::cancel_current(&mut state);
            let release_dir = self.layout.release_dir(release.id);
            if release_dir.exists() {
                self.start_rollback(&mut state, release, release_dir);
            } else {
                self.start_forward(&mut state, release);
            }
        }
        // Equal id: already the active release, no-op.
    }

    /// Cancels the in-flight chain, if any, and blocks until its worker
    /// thread has actually exited — which only happens after its
    /// compensation stack has finished running. This is what makes the
    /// "unwind before the new chain touches the filesystem" guarantee
    /// (§4.6) real rather than a race: without the join, a cancelled
    /// stage's synchronous `execute` (or its compensations) could still
    /// be running concurrently with the chain we're about to start.
    fn cancel_current(state: &mut SupervisorState) {
        if let Some(ctx) = state.last_scheduled.take() {
            ctx.cancel();
            ctx.join_worker();
        }
    }

    fn start_forward(&self, state: &mut SupervisorState, release: Release) {
        let ctx = Arc::new(ExecutionContext::new(release.id));
        lifecycle_script_bridge::install(&ctx, self.layout.clone());
        state.last_scheduled = Some(Arc::clone(&ctx));
        PipelineRunner::schedule(ctx, self.forward_chain.clone(), DeployValue::Release(release));
    }

    fn start_rollback(
        &self,
        state: &mut SupervisorState,
        release: Release,
        release_dir: std::path::PathBuf,
    ) {
        let ctx = Arc::new(ExecutionContext::new(release.id));
        lifecycle_script_bridge::install(&ctx, self.layout.clone());
        state.last_scheduled = Some(Arc::clone(&ctx));
        let input = DeployValue::ReleaseAtPath(release, release_dir);
        PipelineRunner::schedule(ctx, self.rollback_chain.clone(), input);
    }
}
