//! The value threaded between stages.
//!
//! A closed variant rather than a reflectively-typed pipe: the runner
//! matches on this at each stage boundary instead of downcasting.

use std::path::PathBuf;

use easydep_types::Release;

#[derive(Debug, Clone)]
pub enum DeployValue {
    Release(Release),
    ReleaseAtPath(Release, PathBuf),
}

impl DeployValue {
    pub fn release(&self) -> &Release {
        match self {
            DeployValue::Release(r) => r,
            DeployValue::ReleaseAtPath(r, _) => r,
        }
    }

    pub fn into_release(self) -> Release {
        match self {
            DeployValue::Release(r) => r,
            DeployValue::ReleaseAtPath(r, _) => r,
        }
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            DeployValue::Release(_) => None,
            DeployValue::ReleaseAtPath(_, p) => Some(p.as_path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_accessor_works_for_both_variants() {
        let r = Release::new(1, "v1", "acme", "widgets");
        let bare = DeployValue::Release(r.clone());
        let with_path = DeployValue::ReleaseAtPath(r.clone(), PathBuf::from("/tmp/1"));
        assert_eq!(bare.release().id, 1);
        assert_eq!(with_path.release().id, 1);
        assert_eq!(with_path.path(), Some(std::path::Path::new("/tmp/1")));
        assert_eq!(bare.path(), None);
    }
}
