//! S2: mints a fresh access token, clones or updates the shared
//! clone cache, and materializes a per-release working copy from it.

use std::sync::Arc;

use easydep_types::{EasydepError, StageName};

use crate::context::ExecutionContext;
use crate::fs_util;
use crate::path_layout::PathLayout;
use crate::stage::{Stage, StageOutcome};
use crate::traits::RepoFetcher;
use crate::value::DeployValue;

pub struct RepoInit {
    fetcher: Arc<dyn RepoFetcher>,
    layout: PathLayout,
}

impl RepoInit {
    pub fn new(fetcher: Arc<dyn RepoFetcher>, layout: PathLayout) -> Self {
        Self { fetcher, layout }
    }
}

impl Stage for RepoInit {
    fn name(&self) -> StageName {
        StageName::RepoInit
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        input: DeployValue,
    ) -> Result<StageOutcome, EasydepError> {
        let release = input.into_release();

        let url = self
            .fetcher
            .clone_url(&release.owner, &release.repo_name)
            .map_err(|e| EasydepError::stage("repo_init", e))?;

        let cache = self.layout.clone_cache();
        if easydep_git::is_repo_present(&cache) {
            easydep_git::update_remote_url(&cache, &url).map_err(|e| EasydepError::stage("repo_init", e))?;
        } else {
            easydep_git::clone_bare_cache(&url, &cache).map_err(|e| EasydepError::stage("repo_init", e))?;
        }

        let release_dir = self.layout.release_dir(release.id);
        fs_util::copy_dir_recursive(&cache, &release_dir)
            .map_err(|e| EasydepError::stage("repo_init", e))?;

        let compensation_dir = release_dir.clone();
        ctx.register_compensation(move || {
            if let Err(err) = fs_util::remove_dir_all_writable(&compensation_dir) {
                tracing::warn!(path = %compensation_dir.display(), %err, "failed to roll back release directory");
            }
        });

        Ok(StageOutcome::Value(DeployValue::ReleaseAtPath(release, release_dir)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easydep_types::Release;

    struct FixedFetcher;
    impl RepoFetcher for FixedFetcher {
        fn clone_url(&self, owner: &str, repo: &str) -> anyhow::Result<String> {
            Ok(format!("https://example.invalid/{owner}/{repo}.git"))
        }
    }

    #[test]
    fn failing_fetcher_surfaces_as_stage_error() {
        struct FailingFetcher;
        impl RepoFetcher for FailingFetcher {
            fn clone_url(&self, _owner: &str, _repo: &str) -> anyhow::Result<String> {
                anyhow::bail!("installation lookup failed")
            }
        }

        let td = tempfile::tempdir().unwrap();
        let layout = PathLayout::new(td.path(), "current").unwrap();
        let stage = RepoInit::new(Arc::new(FailingFetcher), layout);
        let ctx = ExecutionContext::new(1);
        let release = Release::new(1, "v1", "acme", "widgets");

        let result = stage.execute(&ctx, DeployValue::Release(release));
        assert!(matches!(result, Err(EasydepError::StageError { .. })));
    }

    #[test]
    fn constructs_without_panicking_given_a_fetcher() {
        let td = tempfile::tempdir().unwrap();
        let layout = PathLayout::new(td.path(), "current").unwrap();
        let _stage = RepoInit::new(Arc::new(FixedFetcher), layout);
    }
}
