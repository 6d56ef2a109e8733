//! Seams the core consumes but does not own a default implementation
//! of, save for the ones `easydep-auth` provides for `RepoFetcher`.

use easydep_types::Release;

/// Supplies the next release to deploy. Implementations own whatever
/// transport they need (webhook relay, polling API, static fixture in
/// tests) and must never block indefinitely: `ReleaseFeed` calls this
/// once per tick.
pub trait ReleaseSource: Send + Sync {
    /// Returns the latest release to deploy, or `None` if nothing new
    /// has appeared since the last call. Errors are transient by
    /// contract: the feed logs and retries next tick.
    fn latest_release(&self) -> anyhow::Result<Option<Release>>;
}

/// Mints a short-lived credential usable to fetch a specific repo.
pub trait RepoFetcher: Send + Sync {
    /// Returns a clone URL for `owner/repo` with a freshly minted,
    /// embedded access token. Tokens are assumed to rotate; callers
    /// must not cache the returned URL past a single clone/fetch.
    fn clone_url(&self, owner: &str, repo: &str) -> anyhow::Result<String>;
}

impl RepoFetcher for easydep_auth::GithubAppCredentials {
    fn clone_url(&self, owner: &str, repo: &str) -> anyhow::Result<String> {
        let token = self.mint_installation_token(owner, repo)?;
        Ok(token.clone_url(owner, repo))
    }
}
