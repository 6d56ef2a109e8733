//! The closed set of lifecycle events published by the pipeline engine.
//!
//! Mirrors the shape of a tagged JSON event log (`serde(tag = "type")`),
//! the same convention the publish-event log in the reliability layer this
//! workspace grew out of uses for its append-only event stream.

use serde::{Deserialize, Serialize};

use crate::release::Release;
use crate::stage::StageName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionResult {
    Success,
    Cancelled,
    Failed,
}

/// One lifecycle event emitted by a running deployment chain.
///
/// Kept as a single flat enum (not a trait-object hierarchy) so the
/// event bus can key subscriptions on a plain discriminant and so the
/// whole stream is trivially `serde`-able for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    ChainStarted { release_id: i64 },
    StageSucceeded { stage: String, release_id: i64 },
    StageFailed {
        stage: String,
        release_id: i64,
        message: String,
    },
    ChainFinished { release_id: i64 },
    ChainFailed {
        release_id: i64,
        result: ExecutionResult,
    },
}

impl LifecycleEvent {
    pub fn stage_succeeded(stage: StageName, release: &Release) -> Self {
        LifecycleEvent::StageSucceeded {
            stage: stage.to_string(),
            release_id: release.id,
        }
    }

    pub fn stage_failed(stage: StageName, release_id: i64, message: impl Into<String>) -> Self {
        LifecycleEvent::StageFailed {
            stage: stage.to_string(),
            release_id,
            message: message.into(),
        }
    }

    /// The discriminant name used for event-bus subscription keys and
    /// lifecycle-script basenames (before any per-stage suffix).
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::ChainStarted { .. } => "chain_started",
            LifecycleEvent::StageSucceeded { .. } => "stage_succeeded",
            LifecycleEvent::StageFailed { .. } => "stage_failed",
            LifecycleEvent::ChainFinished { .. } => "chain_finished",
            LifecycleEvent::ChainFailed { .. } => "chain_failed",
        }
    }

    pub fn release_id(&self) -> i64 {
        match self {
            LifecycleEvent::ChainStarted { release_id }
            | LifecycleEvent::StageSucceeded { release_id, .. }
            | LifecycleEvent::StageFailed { release_id, .. }
            | LifecycleEvent::ChainFinished { release_id }
            | LifecycleEvent::ChainFailed { release_id, .. } => *release_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_across_variants() {
        assert_eq!(
            LifecycleEvent::ChainStarted { release_id: 1 }.kind(),
            "chain_started"
        );
        assert_eq!(
            LifecycleEvent::ChainFailed {
                release_id: 1,
                result: ExecutionResult::Cancelled
            }
            .kind(),
            "chain_failed"
        );
    }

    #[test]
    fn serializes_with_tag() {
        let ev = LifecycleEvent::ChainStarted { release_id: 7 };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains(r#""type":"ChainStarted""#));
    }
}
