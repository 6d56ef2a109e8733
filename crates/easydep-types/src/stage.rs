//! Stable names for pipeline stages, used in events, logs, and
//! lifecycle-script filename derivation.

use std::fmt;

/// A closed set: every stage the pipeline can run, forward or rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageName {
    TagAcceptance,
    RepoInit,
    Checkout,
    WorkingCopyCleanup,
    DeployScript,
    SymlinkFlip,
    RetentionCleanup,
}

impl StageName {
    /// Lowercase, underscore-separated form used for lifecycle script
    /// filenames (`.easydep/<event>.<stage>.sh`).
    pub fn script_suffix(self) -> &'static str {
        match self {
            StageName::TagAcceptance => "tag_acceptance",
            StageName::RepoInit => "repo_init",
            StageName::Checkout => "checkout",
            StageName::WorkingCopyCleanup => "working_copy_cleanup",
            StageName::DeployScript => "deploy_script",
            StageName::SymlinkFlip => "symlink_flip",
            StageName::RetentionCleanup => "retention_cleanup",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script_suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_script_suffix() {
        assert_eq!(StageName::DeployScript.to_string(), "deploy_script");
        assert_eq!(StageName::SymlinkFlip.script_suffix(), "symlink_flip");
    }
}
