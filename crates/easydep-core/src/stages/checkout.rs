//! S3: fetches tags into the release's working copy and hard-resets
//! it to the release's tag. Synchronous and uninterruptible; `RepoInit`'s
//! compensation is what reverses this stage's effects on cancel.

use easydep_types::{EasydepError, StageName};

use crate::context::ExecutionContext;
use crate::stage::{Stage, StageOutcome};
use crate::value::DeployValue;

pub struct Checkout;

impl Stage for Checkout {
    fn name(&self) -> StageName {
        StageName::Checkout
    }

    fn execute(
        &self,
        _ctx: &ExecutionContext,
        input: DeployValue,
    ) -> Result<StageOutcome, EasydepError> {
        let path = input
            .path()
            .ok_or_else(|| EasydepError::EmptyStageOutput("checkout".to_string()))?
            .to_path_buf();
        let release = input.release().clone();

        easydep_git::fetch_prune_tags(&path).map_err(|e| EasydepError::stage("checkout", e))?;
        easydep_git::hard_reset_to_tag(&path, &release.tag_name)
            .map_err(|e| EasydepError::stage("checkout", e))?;

        Ok(StageOutcome::Value(DeployValue::ReleaseAtPath(release, path)))
    }
}
