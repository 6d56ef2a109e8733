//! The per-deployment execution context: state machine, compensation
//! stack, and the channel that bridges asynchronous stage work back
//! into the pipeline runner's worker thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, Once};
use std::thread::JoinHandle;

use easydep_types::EasydepError;

use crate::event_bus::EventBus;
use crate::value::DeployValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Ready,
    Running,
    AwaitingAsync,
    Cancelled,
    Done,
}

/// Message sent back to the runner's worker thread when a suspended
/// stage's async work resolves, or when the context is cancelled while
/// a stage is suspended.
pub enum RunnerSignal {
    AsyncResult(Result<DeployValue, EasydepError>),
    Cancelled,
}

type AbortHook = Box<dyn Fn() + Send + Sync>;
type Compensation = Box<dyn FnOnce() + Send>;

/// Owned by exactly one [`crate::runner::PipelineRunner`] invocation.
pub struct ExecutionContext {
    state: Mutex<ContextState>,
    cancelled: AtomicBool,
    compensations: Mutex<Vec<Compensation>>,
    info: Mutex<HashMap<String, String>>,
    events: EventBus,
    signal_tx: Sender<RunnerSignal>,
    signal_rx: Mutex<Option<Receiver<RunnerSignal>>>,
    pending_abort: Mutex<Option<AbortHook>>,
    cancel_once: Once,
    release_id: i64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionContext {
    pub fn new(release_id: i64) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel();
        Self {
            state: Mutex::new(ContextState::Ready),
            cancelled: AtomicBool::new(false),
            compensations: Mutex::new(Vec::new()),
            info: Mutex::new(HashMap::new()),
            events: EventBus::new(),
            signal_tx,
            signal_rx: Mutex::new(Some(signal_rx)),
            pending_abort: Mutex::new(None),
            cancel_once: Once::new(),
            release_id,
            worker: Mutex::new(None),
        }
    }

    pub fn release_id(&self) -> i64 {
        self.release_id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn state(&self) -> ContextState {
        *self.state.lock().expect("context lock poisoned")
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn set_state(&self, state: ContextState) {
        *self.state.lock().expect("context lock poisoned") = state;
    }

    pub fn register_compensation(&self, hook: impl FnOnce() + Send + 'static) {
        self.compensations
            .lock()
            .expect("context lock poisoned")
            .push(Box::new(hook));
    }

    /// Registers a hook `cancel()` will call immediately if it fires
    /// while this context is `AwaitingAsync` (e.g. killing the
    /// supervised process rather than waiting for its natural exit).
    /// Cleared automatically once the async result arrives.
    pub(crate) fn set_pending_abort(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.pending_abort.lock().expect("context lock poisoned") = Some(Box::new(hook));
    }

    pub(crate) fn clear_pending_abort(&self) {
        *self.pending_abort.lock().expect("context lock poisoned") = None;
    }

    pub fn set_info(&self, key: impl Into<String>, value: impl Into<String>) {
        self.info
            .lock()
            .expect("context lock poisoned")
            .insert(key.into(), value.into());
    }

    pub fn info(&self) -> HashMap<String, String> {
        self.info.lock().expect("context lock poisoned").clone()
    }

    pub(crate) fn clear_info(&self) {
        self.info.lock().expect("context lock poisoned").clear();
    }

    /// A clone-able handle a stage hands to its background worker
    /// (e.g. a process-exit waiter thread) so it can report back.
    pub fn async_sender(&self) -> Sender<RunnerSignal> {
        self.signal_tx.clone()
    }

    /// Called by the runner once it has put a stage into
    /// `AwaitingAsync`; blocks until either the stage's async work
    /// resolves or `cancel()` fires.
    pub(crate) fn recv_async_signal(&self) -> RunnerSignal {
        let rx_guard = self.signal_rx.lock().expect("context lock poisoned");
        let rx = rx_guard.as_ref().expect("async receiver taken twice");
        rx.recv().unwrap_or(RunnerSignal::Cancelled)
    }

    /// Requests cancellation. Safe from any thread, idempotent: only
    /// the first call runs the abort hook and sends the signal.
    pub fn cancel(&self) {
        self.cancel_once.call_once(|| {
            self.cancelled.store(true, Ordering::SeqCst);
            if let Some(hook) = self.pending_abort.lock().expect("context lock poisoned").take() {
                hook();
            }
            let _ = self.signal_tx.send(RunnerSignal::Cancelled);
        });
    }

    /// Records the worker thread [`crate::runner::PipelineRunner::schedule`]
    /// spawned to drive this context, so a later [`Self::join_worker`]
    /// can wait for it.
    pub(crate) fn set_worker(&self, handle: JoinHandle<()>) {
        *self.worker.lock().expect("context lock poisoned") = Some(handle);
    }

    /// Blocks until this context's worker thread has exited. Called
    /// after `cancel()` so a caller that is about to start a new chain
    /// (e.g. the supervisor handling a preempting release) can be sure
    /// every compensation this chain could still run has already run —
    /// and so every filesystem side effect it can reverse has already
    /// been reversed — before the new chain touches anything. A no-op
    /// if the worker already exited or was never set.
    pub(crate) fn join_worker(&self) {
        let handle = self.worker.lock().expect("context lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Runs every registered compensation in LIFO order, swallowing
    /// and logging individual failures so one bad hook cannot prevent
    /// the rest from running.
    pub(crate) fn run_compensations(&self) {
        let hooks: Vec<Compensation> = {
            let mut guard = self.compensations.lock().expect("context lock poisoned");
            std::mem::take(&mut *guard)
        };
        for hook in hooks.into_iter().rev() {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(hook));
            if outcome.is_err() {
                tracing::warn!(release_id = self.release_id, "compensation hook panicked");
            }
        }
    }
}
