//! S4: strips VCS metadata from the release directory so the deploy
//! script cannot accidentally invoke git against it.

use easydep_types::{EasydepError, StageName};

use crate::context::ExecutionContext;
use crate::fs_util;
use crate::stage::{Stage, StageOutcome};
use crate::value::DeployValue;

pub struct WorkingCopyCleanup;

impl Stage for WorkingCopyCleanup {
    fn name(&self) -> StageName {
        StageName::WorkingCopyCleanup
    }

    fn execute(
        &self,
        _ctx: &ExecutionContext,
        input: DeployValue,
    ) -> Result<StageOutcome, EasydepError> {
        let path = input
            .path()
            .ok_or_else(|| EasydepError::EmptyStageOutput("working_copy_cleanup".to_string()))?;

        fs_util::remove_dir_all_writable(&path.join(".git"))
            .map_err(|e| EasydepError::stage("working_copy_cleanup", e))?;

        Ok(StageOutcome::Value(input))
    }
}
