//! S1: accepts or cancels an incoming release based on its body's
//! declared labels against the agent's own configured labels.

use std::sync::Arc;

use easydep_config::labels::{self, LabelDecision};
use easydep_config::AgentConfig;
use easydep_types::{EasydepError, StageName};

use crate::context::ExecutionContext;
use crate::stage::{Stage, StageOutcome};
use crate::value::DeployValue;

pub struct TagAcceptance {
    config: Arc<AgentConfig>,
}

impl TagAcceptance {
    pub fn new(config: Arc<AgentConfig>) -> Self {
        Self { config }
    }
}

impl Stage for TagAcceptance {
    fn name(&self) -> StageName {
        StageName::TagAcceptance
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        input: DeployValue,
    ) -> Result<StageOutcome, EasydepError> {
        let release = input.release();

        // Unlike `labels::extract_markup`, a non-blank body whose
        // pattern fails to match is a policy failure, not "no labels
        // declared" -- those two cases share a `None` in the shared
        // helper, so distinguish them here before delegating.
        let body = release.body.as_deref().map(str::trim).filter(|b| !b.is_empty());

        let markup = match body {
            None => None,
            Some(body) => match self.config.release_body_parse_pattern.captures(body) {
                Some(captures) => Some(captures.get(1).map(|m| m.as_str().to_string()).unwrap_or_default()),
                None => {
                    tracing::info!(
                        release_id = release.id,
                        "release body does not match the configured parse pattern, cancelling"
                    );
                    ctx.cancel();
                    return Ok(StageOutcome::Value(input));
                }
            },
        };

        let release_labels = match markup {
            None => Default::default(),
            Some(markup) => match labels::parse_release_labels(&markup) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::info!(
                        release_id = release.id,
                        %err,
                        "release body markup failed to parse, cancelling"
                    );
                    ctx.cancel();
                    return Ok(StageOutcome::Value(input));
                }
            },
        };

        match labels::evaluate(&self.config.deploy_labels, &release_labels) {
            LabelDecision::Accept => Ok(StageOutcome::Value(input)),
            LabelDecision::Reject { reason } => {
                tracing::info!(release_id = release.id, reason, "release rejected by label policy");
                ctx.cancel();
                Ok(StageOutcome::Value(input))
            }
        }
    }
}
