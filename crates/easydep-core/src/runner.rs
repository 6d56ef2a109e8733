//! The single-worker executor that advances a linear stage chain.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use easydep_types::{EasydepError, ExecutionResult, LifecycleEvent, StageName};

use crate::context::{ContextState, ExecutionContext, RunnerSignal};
use crate::stage::{Stage, StageOutcome};
use crate::value::DeployValue;

/// A handle to a chain's eventual outcome. `recv()` blocks until the
/// chain finishes, fails, or is cancelled.
pub struct Completion {
    rx: Receiver<Result<DeployValue, EasydepError>>,
}

impl Completion {
    pub fn recv(self) -> Result<DeployValue, EasydepError> {
        self.rx
            .recv()
            .unwrap_or(Err(EasydepError::IllegalState(
                "pipeline worker thread terminated without completing".to_string(),
            )))
    }
}

pub struct PipelineRunner;

impl PipelineRunner {
    /// Spawns a dedicated worker thread that drives `chain` against
    /// `ctx` starting from `input`, and returns immediately with a
    /// handle to the eventual result. `ctx` must be `Ready`.
    pub fn schedule(
        ctx: Arc<ExecutionContext>,
        chain: Vec<Arc<dyn Stage>>,
        input: DeployValue,
    ) -> Completion {
        let (tx, rx) = mpsc::channel();
        ctx.set_state(ContextState::Running);

        let worker_ctx = Arc::clone(&ctx);
        let handle = thread::spawn(move || {
            let result = Self::drive(&worker_ctx, &chain, input);
            let _ = tx.send(result);
        });
        ctx.set_worker(handle);

        Completion { rx }
    }

    fn drive(
        ctx: &Arc<ExecutionContext>,
        chain: &[Arc<dyn Stage>],
        mut current: DeployValue,
    ) -> Result<DeployValue, EasydepError> {
        ctx.events().publish(LifecycleEvent::ChainStarted {
            release_id: ctx.release_id(),
        });

        let mut idx = 0;
        loop {
            if ctx.is_cancelled() {
                return Self::finish_cancelled(ctx);
            }

            if idx >= chain.len() {
                ctx.set_state(ContextState::Done);
                ctx.events().publish(LifecycleEvent::ChainFinished {
                    release_id: ctx.release_id(),
                });
                return Ok(current);
            }

            let stage = &chain[idx];
            ctx.clear_info();

            match stage.execute(ctx, current.clone()) {
                Ok(StageOutcome::Value(value)) => {
                    // A stage that decided to cancel mid-execute (e.g. a
                    // policy rejection) still returns a pass-through value;
                    // the chain must not credit it with a `StageSucceeded`
                    // that implies forward progress actually happened.
                    if ctx.is_cancelled() {
                        return Self::finish_cancelled(ctx);
                    }
                    ctx.events()
                        .publish(LifecycleEvent::stage_succeeded(stage.name(), value.release()));
                    current = value;
                    idx += 1;
                }
                Ok(StageOutcome::Awaiting) => {
                    ctx.set_state(ContextState::AwaitingAsync);
                    match ctx.recv_async_signal() {
                        RunnerSignal::Cancelled => return Self::finish_cancelled(ctx),
                        RunnerSignal::AsyncResult(Ok(value)) => {
                            ctx.clear_pending_abort();
                            ctx.set_state(ContextState::Running);
                            if ctx.is_cancelled() {
                                return Self::finish_cancelled(ctx);
                            }
                            ctx.events().publish(LifecycleEvent::stage_succeeded(
                                stage.name(),
                                value.release(),
                            ));
                            current = value;
                            idx += 1;
                        }
                        RunnerSignal::AsyncResult(Err(err)) => {
                            ctx.clear_pending_abort();
                            return Self::finish_failed(ctx, stage.name(), err);
                        }
                    }
                }
                Err(err) => {
                    return Self::finish_failed(ctx, stage.name(), err);
                }
            }
        }
    }

    fn finish_cancelled(ctx: &ExecutionContext) -> Result<DeployValue, EasydepError> {
        ctx.set_state(ContextState::Cancelled);
        ctx.run_compensations();
        ctx.events().publish(LifecycleEvent::ChainFailed {
            release_id: ctx.release_id(),
            result: ExecutionResult::Cancelled,
        });
        Err(EasydepError::Cancelled)
    }

    fn finish_failed(
        ctx: &ExecutionContext,
        stage_name: StageName,
        err: EasydepError,
    ) -> Result<DeployValue, EasydepError> {
        ctx.events().publish(LifecycleEvent::stage_failed(
            stage_name,
            ctx.release_id(),
            err.to_string(),
        ));
        ctx.run_compensations();
        ctx.events().publish(LifecycleEvent::ChainFailed {
            release_id: ctx.release_id(),
            result: ExecutionResult::Failed,
        });
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easydep_types::Release;
    use std::sync::Mutex;

    struct RecordingStage {
        name: StageName,
        action:
            Box<dyn Fn(&ExecutionContext, DeployValue) -> Result<StageOutcome, EasydepError> + Send + Sync>,
    }

    impl Stage for RecordingStage {
        fn name(&self) -> StageName {
            self.name
        }

        fn execute(
            &self,
            ctx: &ExecutionContext,
            input: DeployValue,
        ) -> Result<StageOutcome, EasydepError> {
            (self.action)(ctx, input)
        }
    }

    fn release() -> DeployValue {
        DeployValue::Release(Release::new(1, "v1", "acme", "widgets"))
    }

    #[test]
    fn happy_path_runs_every_stage_in_order() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let o1 = Arc::clone(&order);
        let o2 = Arc::clone(&order);

        let chain: Vec<Arc<dyn Stage>> = vec![
            Arc::new(RecordingStage {
                name: StageName::TagAcceptance,
                action: Box::new(move |_ctx, input| {
                    o1.lock().unwrap().push("tag_acceptance");
                    Ok(StageOutcome::Value(input))
                }),
            }),
            Arc::new(RecordingStage {
                name: StageName::SymlinkFlip,
                action: Box::new(move |_ctx, input| {
                    o2.lock().unwrap().push("symlink_flip");
                    Ok(StageOutcome::Value(input))
                }),
            }),
        ];

        let ctx = Arc::new(ExecutionContext::new(1));
        let completion = PipelineRunner::schedule(ctx, chain, release());
        let result = completion.recv();

        assert!(result.is_ok());
        assert_eq!(*order.lock().unwrap(), vec!["tag_acceptance", "symlink_flip"]);
    }

    #[test]
    fn stage_cancelling_mid_execute_skips_remaining_stages() {
        let ran_second = Arc::new(Mutex::new(false));
        let ran_second_clone = Arc::clone(&ran_second);

        let chain: Vec<Arc<dyn Stage>> = vec![
            Arc::new(RecordingStage {
                name: StageName::TagAcceptance,
                action: Box::new(|ctx, input| {
                    ctx.cancel();
                    Ok(StageOutcome::Value(input))
                }),
            }),
            Arc::new(RecordingStage {
                name: StageName::RepoInit,
                action: Box::new(move |_ctx, input| {
                    *ran_second_clone.lock().unwrap() = true;
                    Ok(StageOutcome::Value(input))
                }),
            }),
        ];

        let ctx = Arc::new(ExecutionContext::new(1));
        let completion = PipelineRunner::schedule(ctx, chain, release());
        let result = completion.recv();

        assert!(matches!(result, Err(EasydepError::Cancelled)));
        assert!(!*ran_second.lock().unwrap());
    }

    #[test]
    fn stage_error_runs_compensations_and_fails_completion() {
        let compensated = Arc::new(Mutex::new(false));
        let compensated_clone = Arc::clone(&compensated);

        let chain: Vec<Arc<dyn Stage>> = vec![Arc::new(RecordingStage {
            name: StageName::Checkout,
            action: Box::new(move |ctx, _input| {
                let c = Arc::clone(&compensated_clone);
                ctx.register_compensation(move || *c.lock().unwrap() = true);
                Err(EasydepError::ScriptExit(7))
            }),
        })];

        let ctx = Arc::new(ExecutionContext::new(1));
        let completion = PipelineRunner::schedule(ctx, chain, release());
        let result = completion.recv();

        assert!(matches!(result, Err(EasydepError::ScriptExit(7))));
        assert!(*compensated.lock().unwrap());
    }

    #[test]
    fn empty_chain_completes_done_with_initial_input() {
        let ctx = Arc::new(ExecutionContext::new(1));
        let completion = PipelineRunner::schedule(ctx, Vec::new(), release());
        let result = completion.recv();
        assert!(result.is_ok());
    }
}
