//! The stable, matchable error taxonomy surfaced at crate boundaries.
//!
//! Internal plumbing still threads `anyhow::Result` for context-chaining
//! (see `easydep-git`, `easydep-process`); this enum is what a stage
//! failure or a startup failure ultimately gets classified into before
//! it reaches an event or an exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EasydepError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("release source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("stage '{stage}' failed: {source}")]
    StageError {
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("deploy script exited with status {0}")]
    ScriptExit(i32),

    #[error("deployment cancelled")]
    Cancelled,

    #[error("stage '{0}' produced no output")]
    EmptyStageOutput(String),

    #[error("illegal pipeline state: {0}")]
    IllegalState(String),
}

impl EasydepError {
    pub fn stage(stage: impl Into<String>, source: anyhow::Error) -> Self {
        EasydepError::StageError {
            stage: stage.into(),
            source,
        }
    }

    /// Whether this error represents a user-requested preemption rather
    /// than a genuine failure — used to pick the log level and to avoid
    /// publishing `ChainFailed` when the chain was actually superseded.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EasydepError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_exit_formats_code() {
        let err = EasydepError::ScriptExit(7);
        assert_eq!(err.to_string(), "deploy script exited with status 7");
    }

    #[test]
    fn is_cancelled_only_for_cancelled_variant() {
        assert!(EasydepError::Cancelled.is_cancelled());
        assert!(!EasydepError::ScriptExit(1).is_cancelled());
    }
}
