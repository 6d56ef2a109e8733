//! Environment-driven configuration for the easydep agent.
//!
//! ## Modules
//!
//! - [`token_list`] — the `k1:v1;;k2:v2` grammar shared by labels and
//!   the additional-symlinks setting.
//! - [`labels`] — parses a release body's captured section as a
//!   key-table markup and matches it against the agent's own labels.

pub mod labels;
pub mod token_list;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use easydep_types::EasydepError;
use regex::Regex;

const DEFAULT_LINK_NAME: &str = "current";
const DEFAULT_PULL_DELAY_MILLIS: u64 = 10_000;
const MIN_PULL_DELAY_MILLIS: u64 = 100;
const DEFAULT_DISCARDER_MAX: i64 = 10;
const MIN_DISCARDER_MAX: i64 = 2;
const DEFAULT_BODY_PATTERN: &str = "(?s)(.*)";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Fully parsed, validated, immutable view of the `EASYDEP_*`
/// environment. Constructed once at startup via [`AgentConfig::from_env`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub github_app_id: String,
    pub github_app_private_key: String,
    pub github_repo_org: String,
    pub github_repo_name: String,
    pub deploy_base_directory: PathBuf,
    pub deploy_link_directory: String,
    pub deploy_labels: HashMap<String, Vec<String>>,
    pub additional_symlinks: Vec<(String, String)>,
    pub release_pull_delay: Duration,
    /// `None` disables retention cleanup entirely.
    pub max_stored_releases: Option<usize>,
    pub release_body_parse_pattern: Regex,
    pub log_level: String,
    pub status_bind: Option<String>,
}

/// Raw string form of the environment, used so tests can build a
/// config without touching process-global environment variables.
#[derive(Debug, Clone, Default)]
pub struct RawEnv {
    pub github_app_id: Option<String>,
    pub github_app_private_key: Option<String>,
    pub github_repo_org: Option<String>,
    pub github_repo_name: Option<String>,
    pub deploy_base_directory: Option<String>,
    pub deploy_link_directory: Option<String>,
    pub deploy_labels: Option<String>,
    pub additional_symlinks: Option<String>,
    pub release_pull_delay_millis: Option<String>,
    pub deploy_discarder_max: Option<String>,
    pub release_body_parse_pattern: Option<String>,
    pub log_level: Option<String>,
    pub status_bind: Option<String>,
}

impl RawEnv {
    pub fn from_process_env() -> Self {
        let get = |key: &str| std::env::var(key).ok();
        Self {
            github_app_id: get("EASYDEP_GITHUB_APP_ID"),
            github_app_private_key: get("EASYDEP_GITHUB_APP_PRIVATE_KEY"),
            github_repo_org: get("EASYDEP_GITHUB_REPO_ORG"),
            github_repo_name: get("EASYDEP_GITHUB_REPO_NAME"),
            deploy_base_directory: get("EASYDEP_DEPLOY_BASE_DIRECTORY"),
            deploy_link_directory: get("EASYDEP_DEPLOY_LINK_DIRECTORY"),
            deploy_labels: get("EASYDEP_DEPLOY_LABELS"),
            additional_symlinks: get("EASYDEP_DEPLOY_ADDITIONAL_SYMLINKS"),
            release_pull_delay_millis: get("EASYDEP_RELEASE_PULL_DELAY_MILLIS"),
            deploy_discarder_max: get("EASYDEP_DEPLOY_DISCARDER_MAX"),
            release_body_parse_pattern: get("EASYDEP_RELEASE_BODY_PARSE_PATTERN"),
            log_level: get("EASYDEP_LOG_LEVEL"),
            status_bind: get("EASYDEP_STATUS_BIND"),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, EasydepError> {
        Self::from_raw(RawEnv::from_process_env())
    }

    /// Validates `raw`, accumulating every problem found rather than
    /// bailing on the first one, mirroring the all-at-once validation
    /// style this workspace's file-based config loader uses.
    pub fn from_raw(raw: RawEnv) -> Result<Self, EasydepError> {
        let mut problems = Vec::new();

        let github_app_id = require(&mut problems, "EASYDEP_GITHUB_APP_ID", raw.github_app_id);
        let github_app_private_key = require(
            &mut problems,
            "EASYDEP_GITHUB_APP_PRIVATE_KEY",
            raw.github_app_private_key,
        );
        let github_repo_org = require(&mut problems, "EASYDEP_GITHUB_REPO_ORG", raw.github_repo_org);
        let github_repo_name =
            require(&mut problems, "EASYDEP_GITHUB_REPO_NAME", raw.github_repo_name);

        let deploy_base_directory = match raw.deploy_base_directory {
            Some(v) if !v.trim().is_empty() => {
                let path = PathBuf::from(&v);
                if path.is_absolute() {
                    Some(path)
                } else {
                    problems.push(format!(
                        "EASYDEP_DEPLOY_BASE_DIRECTORY must be an absolute path, got '{v}'"
                    ));
                    None
                }
            }
            _ => {
                problems.push("EASYDEP_DEPLOY_BASE_DIRECTORY is required".to_string());
                None
            }
        };

        let deploy_link_directory = raw
            .deploy_link_directory
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LINK_NAME.to_string());

        let deploy_labels = raw
            .deploy_labels
            .map(|v| token_list::parse_value_lists(&v))
            .unwrap_or_default();

        let additional_symlinks = raw
            .additional_symlinks
            .map(|v| token_list::parse(&v))
            .unwrap_or_default();

        let release_pull_delay = match raw
            .release_pull_delay_millis
            .map(|v| v.parse::<u64>())
        {
            None => Duration::from_millis(DEFAULT_PULL_DELAY_MILLIS),
            Some(Ok(millis)) => {
                Duration::from_millis(millis.max(MIN_PULL_DELAY_MILLIS))
            }
            Some(Err(_)) => {
                problems.push(
                    "EASYDEP_RELEASE_PULL_DELAY_MILLIS must be a non-negative integer".to_string(),
                );
                Duration::from_millis(DEFAULT_PULL_DELAY_MILLIS)
            }
        };

        let max_stored_releases = match raw.deploy_discarder_max.map(|v| v.parse::<i64>()) {
            None => Some(DEFAULT_DISCARDER_MAX as usize),
            Some(Ok(n)) if n <= 0 => None,
            Some(Ok(n)) => Some(n.max(MIN_DISCARDER_MAX) as usize),
            Some(Err(_)) => {
                problems.push("EASYDEP_DEPLOY_DISCARDER_MAX must be an integer".to_string());
                Some(DEFAULT_DISCARDER_MAX as usize)
            }
        };

        let pattern_source = raw
            .release_body_parse_pattern
            .unwrap_or_else(|| DEFAULT_BODY_PATTERN.to_string());
        let release_body_parse_pattern = match Regex::new(&pattern_source) {
            Ok(re) => Some(re),
            Err(e) => {
                problems.push(format!(
                    "EASYDEP_RELEASE_BODY_PARSE_PATTERN is not a valid regex: {e}"
                ));
                None
            }
        };

        let log_level = raw
            .log_level
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        if !problems.is_empty() {
            return Err(EasydepError::ConfigError(problems.join("; ")));
        }

        Ok(AgentConfig {
            github_app_id: github_app_id.unwrap(),
            github_app_private_key: github_app_private_key.unwrap(),
            github_repo_org: github_repo_org.unwrap(),
            github_repo_name: github_repo_name.unwrap(),
            deploy_base_directory: deploy_base_directory.unwrap(),
            deploy_link_directory,
            deploy_labels,
            additional_symlinks,
            release_pull_delay,
            max_stored_releases,
            release_body_parse_pattern: release_body_parse_pattern.unwrap(),
            log_level,
            status_bind: raw.status_bind,
        })
    }
}

fn require(problems: &mut Vec<String>, name: &str, value: Option<String>) -> Option<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            problems.push(format!("{name} is required"));
            None
        }
    }
}
