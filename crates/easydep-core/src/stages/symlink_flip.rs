//! S6: atomically repoints `current_link` at the release directory,
//! then recreates every configured auxiliary symlink.

use std::path::PathBuf;

use easydep_types::{EasydepError, StageName};

use crate::context::ExecutionContext;
use crate::fs_util;
use crate::path_layout::PathLayout;
use crate::stage::{Stage, StageOutcome};
use crate::value::DeployValue;

pub struct SymlinkFlip {
    layout: PathLayout,
    additional_symlinks: Vec<(String, String)>,
}

impl SymlinkFlip {
    pub fn new(layout: PathLayout, additional_symlinks: Vec<(String, String)>) -> Self {
        Self {
            layout,
            additional_symlinks,
        }
    }
}

impl Stage for SymlinkFlip {
    fn name(&self) -> StageName {
        StageName::SymlinkFlip
    }

    fn execute(
        &self,
        _ctx: &ExecutionContext,
        input: DeployValue,
    ) -> Result<StageOutcome, EasydepError> {
        let path = input
            .path()
            .ok_or_else(|| EasydepError::EmptyStageOutput("symlink_flip".to_string()))?
            .to_path_buf();
        let release = input.release().clone();

        fs_util::replace_symlink(&path, &self.layout.current_link())
            .map_err(|e| EasydepError::stage("symlink_flip", e))?;

        for (relative_name, target) in &self.additional_symlinks {
            let link = path.join(relative_name);
            fs_util::replace_symlink(&PathBuf::from(target), &link)
                .map_err(|e| EasydepError::stage("symlink_flip", e))?;
        }

        Ok(StageOutcome::Value(DeployValue::Release(release)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easydep_types::Release;
    use std::fs;

    #[test]
    fn points_current_link_at_release_directory() {
        let td = tempfile::tempdir().unwrap();
        let layout = PathLayout::new(td.path(), "current").unwrap();
        let release_dir = layout.release_dir(7);
        fs::create_dir_all(&release_dir).unwrap();

        let stage = SymlinkFlip::new(layout.clone(), Vec::new());
        let ctx = ExecutionContext::new(7);
        let release = Release::new(7, "v1", "acme", "widgets");
        let outcome = stage
            .execute(&ctx, DeployValue::ReleaseAtPath(release, release_dir.clone()))
            .unwrap();

        assert!(matches!(outcome, StageOutcome::Value(DeployValue::Release(_))));
        assert_eq!(fs::read_link(layout.current_link()).unwrap(), release_dir);
    }

    #[test]
    fn replacing_an_existing_link_does_not_error() {
        let td = tempfile::tempdir().unwrap();
        let layout = PathLayout::new(td.path(), "current").unwrap();
        let old_dir = layout.release_dir(6);
        let new_dir = layout.release_dir(7);
        fs::create_dir_all(&old_dir).unwrap();
        fs::create_dir_all(&new_dir).unwrap();
        fs_util::replace_symlink(&old_dir, &layout.current_link()).unwrap();

        let stage = SymlinkFlip::new(layout.clone(), Vec::new());
        let ctx = ExecutionContext::new(7);
        let release = Release::new(7, "v1", "acme", "widgets");
        stage
            .execute(&ctx, DeployValue::ReleaseAtPath(release, new_dir.clone()))
            .unwrap();

        assert_eq!(fs::read_link(layout.current_link()).unwrap(), new_dir);
    }
}
