//! S7: deletes old release directories beyond the configured
//! retention count. Best-effort: a successful deploy is never failed
//! by a retention-cleanup error.

use easydep_types::{EasydepError, StageName};

use crate::context::ExecutionContext;
use crate::fs_util;
use crate::path_layout::PathLayout;
use crate::stage::{Stage, StageOutcome};
use crate::value::DeployValue;

pub struct RetentionCleanup {
    layout: PathLayout,
    max_stored_releases: Option<usize>,
}

impl RetentionCleanup {
    pub fn new(layout: PathLayout, max_stored_releases: Option<usize>) -> Self {
        Self {
            layout,
            max_stored_releases,
        }
    }
}

impl Stage for RetentionCleanup {
    fn name(&self) -> StageName {
        StageName::RetentionCleanup
    }

    fn execute(
        &self,
        _ctx: &ExecutionContext,
        input: DeployValue,
    ) -> Result<StageOutcome, EasydepError> {
        let Some(max) = self.max_stored_releases else {
            return Ok(StageOutcome::Value(input));
        };

        match self.layout.list_release_ids() {
            Ok(mut ids) => {
                ids.sort_unstable_by(|a, b| b.cmp(a));
                for stale_id in ids.into_iter().skip(max) {
                    let dir = self.layout.release_dir(stale_id);
                    if let Err(err) = fs_util::remove_dir_all_writable(&dir) {
                        tracing::warn!(release_id = stale_id, %err, "retention cleanup failed to remove release directory");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%err, "retention cleanup failed to list release directories");
            }
        }

        Ok(StageOutcome::Value(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easydep_types::Release;
    use std::fs;

    #[test]
    fn keeps_only_the_newest_n_release_directories() {
        let td = tempfile::tempdir().unwrap();
        let layout = PathLayout::new(td.path(), "current").unwrap();
        for id in 1..=5 {
            fs::create_dir_all(layout.release_dir(id)).unwrap();
        }

        let stage = RetentionCleanup::new(layout.clone(), Some(3));
        let ctx = ExecutionContext::new(6);
        let release = Release::new(6, "v1", "acme", "widgets");
        stage.execute(&ctx, DeployValue::Release(release)).unwrap();

        let mut remaining = layout.list_release_ids().unwrap();
        remaining.sort_unstable();
        assert_eq!(remaining, vec![3, 4, 5]);
    }

    #[test]
    fn disabled_retention_leaves_everything() {
        let td = tempfile::tempdir().unwrap();
        let layout = PathLayout::new(td.path(), "current").unwrap();
        for id in 1..=5 {
            fs::create_dir_all(layout.release_dir(id)).unwrap();
        }

        let stage = RetentionCleanup::new(layout.clone(), None);
        let ctx = ExecutionContext::new(6);
        let release = Release::new(6, "v1", "acme", "widgets");
        stage.execute(&ctx, DeployValue::Release(release)).unwrap();

        assert_eq!(layout.list_release_ids().unwrap().len(), 5);
    }
}
