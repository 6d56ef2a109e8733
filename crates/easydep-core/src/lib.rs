//! The deployment pipeline engine: `EventBus`, `ExecutionContext`,
//! `PipelineRunner`, the S1-S8 stages, `ReleaseSupervisor`, and
//! `ReleaseFeed`.
//!
//! ## Modules
//!
//! - [`path_layout`] — the absolute paths a deployment agent works against.
//! - [`event_bus`] — in-process, per-context publish/subscribe of lifecycle events.
//! - [`context`] — the per-deployment execution context and compensation stack.
//! - [`stage`] / [`value`] — the `Stage` trait and the value threaded between stages.
//! - [`stages`] — the S1-S8 stage implementations.
//! - [`runner`] — the single-worker executor driving a stage chain.
//! - [`supervisor`] — decides forward deploy vs. rollback vs. no-op.
//! - [`feed`] — the periodic release-poll loop.
//! - [`traits`] — the `ReleaseSource` / `RepoFetcher` seams.
//! - [`github_source`] — the default `ReleaseSource`, backed by the GitHub REST API.
//! - [`lock`] — the single-host advisory lock file.
//! - [`fs_util`] — recursive copy/remove helpers shared by several stages.

pub mod context;
pub mod event_bus;
pub mod feed;
pub mod fs_util;
pub mod github_source;
pub mod lock;
pub mod path_layout;
pub mod runner;
pub mod stage;
pub mod stages;
pub mod supervisor;
pub mod traits;
pub mod value;

use std::sync::Arc;

use easydep_config::AgentConfig;

pub use context::ExecutionContext;
pub use event_bus::EventBus;
pub use feed::ReleaseFeed;
pub use github_source::GithubReleaseSource;
pub use lock::LockFile;
pub use path_layout::PathLayout;
pub use runner::{Completion, PipelineRunner};
pub use supervisor::ReleaseSupervisor;
pub use traits::{RepoFetcher, ReleaseSource};
pub use value::DeployValue;

/// Builds the forward deploy chain (S1-S7, in order) from a loaded
/// config and the fetcher stages need to mint clone credentials.
pub fn forward_chain(
    config: &Arc<AgentConfig>,
    layout: &PathLayout,
    fetcher: Arc<dyn RepoFetcher>,
) -> Vec<Arc<dyn stage::Stage>> {
    vec![
        Arc::new(stages::TagAcceptance::new(Arc::clone(config))),
        Arc::new(stages::RepoInit::new(fetcher, layout.clone())),
        Arc::new(stages::Checkout),
        Arc::new(stages::WorkingCopyCleanup),
        Arc::new(stages::DeployScript),
        Arc::new(stages::SymlinkFlip::new(layout.clone(), config.additional_symlinks.clone())),
        Arc::new(stages::RetentionCleanup::new(layout.clone(), config.max_stored_releases)),
    ]
}

/// Builds the rollback chain: just `SymlinkFlip`, pointing `current_link`
/// back at an already-materialized release directory.
pub fn rollback_chain(config: &Arc<AgentConfig>, layout: &PathLayout) -> Vec<Arc<dyn stage::Stage>> {
    vec![Arc::new(stages::SymlinkFlip::new(
        layout.clone(),
        config.additional_symlinks.clone(),
    ))]
}
