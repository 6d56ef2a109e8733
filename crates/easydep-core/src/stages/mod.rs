//! The S1-S8 stage implementations and the shared script-running
//! plumbing two of them (`DeployScript`, `LifecycleScriptBridge`) use.

pub mod checkout;
pub mod deploy_script;
pub mod lifecycle_script_bridge;
pub mod repo_init;
pub mod retention_cleanup;
mod script_runner;
pub mod symlink_flip;
pub mod tag_acceptance;
pub mod working_copy_cleanup;

pub use checkout::Checkout;
pub use deploy_script::DeployScript;
pub use repo_init::RepoInit;
pub use retention_cleanup::RetentionCleanup;
pub use symlink_flip::SymlinkFlip;
pub use tag_acceptance::TagAcceptance;
pub use working_copy_cleanup::WorkingCopyCleanup;
