//! Owns the absolute paths a deployment agent works against.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const CLONE_CACHE_DIR: &str = ".cache_clone";
const LOCK_FILE_NAME: &str = ".easydep.lock";

/// Immutable once constructed. `root` is normalized to an absolute
/// path at construction time; nothing else here does I/O.
#[derive(Debug, Clone)]
pub struct PathLayout {
    root: PathBuf,
    link_name: String,
}

impl PathLayout {
    pub fn new(root: impl Into<PathBuf>, link_name: impl Into<String>) -> Result<Self> {
        let root = root.into();
        if !root.is_absolute() {
            anyhow::bail!("deployment root must be an absolute path, got {}", root.display());
        }
        Ok(Self {
            root,
            link_name: link_name.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn clone_cache(&self) -> PathBuf {
        self.root.join(CLONE_CACHE_DIR)
    }

    pub fn release_dir(&self, release_id: i64) -> PathBuf {
        self.root.join(release_id.to_string())
    }

    pub fn current_link(&self) -> PathBuf {
        self.root.join(&self.link_name)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE_NAME)
    }

    /// Creates `root` if it does not already exist. Does not create
    /// the clone cache directory: its absence is meaningful (it tells
    /// `RepoInit` "never cloned yet" vs. "clone cache exists").
    pub fn create_if_missing(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create deployment root {}", self.root.display()))
    }

    /// Parses the release id a release directory's basename encodes,
    /// used by retention cleanup to enumerate candidates and by the
    /// supervisor to recover `last_executed_id` from the current link.
    pub fn parse_release_id(name: &str) -> Option<i64> {
        name.parse::<i64>().ok()
    }

    /// Reads `current_link`'s target and recovers the release id it
    /// encodes, or `None` if the link is absent or unparseable.
    pub fn read_current_release_id(&self) -> Option<i64> {
        let target = std::fs::read_link(self.current_link()).ok()?;
        let basename = target.file_name()?.to_str()?;
        Self::parse_release_id(basename)
    }

    /// Lists every immediate child of `root` whose name parses as a
    /// release id, used by `RetentionCleanup`.
    pub fn list_release_ids(&self) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to read deployment root {}", self.root.display()))?;
        for entry in entries {
            let entry = entry.context("failed to read deployment root entry")?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = Self::parse_release_id(name) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}
