//! Default `ReleaseSource`: polls the GitHub REST API for the newest
//! release of a configured `owner/repo`.

use anyhow::{bail, Context, Result};
use easydep_auth::GithubAppCredentials;
use easydep_types::Release;
use serde::Deserialize;
use std::sync::Arc;

use crate::traits::ReleaseSource;

const GITHUB_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: i64,
    tag_name: String,
    body: Option<String>,
}

pub struct GithubReleaseSource {
    credentials: Arc<GithubAppCredentials>,
    owner: String,
    repo: String,
    api_base: String,
}

impl GithubReleaseSource {
    pub fn new(credentials: Arc<GithubAppCredentials>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            credentials,
            owner: owner.into(),
            repo: repo.into(),
            api_base: GITHUB_API_BASE.to_string(),
        }
    }

    /// Testable entry point that accepts an overridden API base.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn fetch_newest(&self) -> Result<Option<ReleaseResponse>> {
        let token = self
            .credentials
            .mint_installation_token_at(&self.api_base, &self.owner, &self.repo)
            .context("failed to mint a token to poll releases")?;

        let url = format!(
            "{}/repos/{}/{}/releases?per_page=1",
            self.api_base, self.owner, self.repo
        );

        let client = reqwest::blocking::Client::new();
        let response = client
            .get(&url)
            .bearer_auth(&token.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "easydep")
            .send()
            .context("failed to list releases")?;

        if !response.status().is_success() {
            bail!("GitHub release listing failed with status {}", response.status());
        }

        let releases: Vec<ReleaseResponse> =
            response.json().context("failed to parse release listing response")?;
        Ok(releases.into_iter().next())
    }
}

impl ReleaseSource for GithubReleaseSource {
    fn latest_release(&self) -> Result<Option<Release>> {
        let newest = self.fetch_newest()?;
        Ok(newest.map(|r| {
            let mut release = Release::new(r.id, r.tag_name, self.owner.clone(), self.repo.clone());
            if let Some(body) = r.body {
                release = release.with_body(body);
            }
            release
        }))
    }
}
