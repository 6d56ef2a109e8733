//! The `Stage` trait every pipeline step implements.

use easydep_types::{EasydepError, StageName};

use crate::context::ExecutionContext;
use crate::value::DeployValue;

/// What a stage's `execute` call produced.
pub enum StageOutcome {
    /// The stage completed synchronously; the runner advances to the
    /// next stage immediately with this value as its input.
    Value(DeployValue),
    /// The stage is waiting on an asynchronous operation (typically a
    /// child process). The stage has already arranged, before
    /// returning this, for the context's async channel to eventually
    /// receive the outcome — see [`ExecutionContext::async_sender`]
    /// and [`ExecutionContext::recv_async_signal`].
    Awaiting,
}

pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    fn execute(
        &self,
        ctx: &ExecutionContext,
        input: DeployValue,
    ) -> Result<StageOutcome, EasydepError>;
}
