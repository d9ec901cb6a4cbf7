//! Configuration, options and result types shared across the crate
//!
//! - **Configuration**: [`HistoryConfig`], persisted as JSON in the repository
//! - **Operations**: [`ListOptions`], [`ListOrder`] - listing parameters
//! - **Results**: [`DiffPair`], [`RepositoryStats`], [`PruneStats`]
//!
//! ## Examples
//!
//! ```rust
//! use localhistory::types::{ListOptions, ListOrder};
//!
//! // Only the three newest labeled revisions
//! let options = ListOptions {
//!     labeled_only: true,
//!     limit: Some(3),
//!     ..Default::default()
//! };
//! assert_eq!(options.order, None);
//! let _ = ListOrder::NewestFirst;
//! ```

use crate::error::{HistoryError, Result};
use crate::path_mapper::DEFAULT_REPOSITORY_DIR;
use crate::revision::RevisionEntry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the configuration file inside the repository root
pub const CONFIG_FILE: &str = "config.json";

/// Order in which listings return revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Sorted by timestamp, newest first
    #[default]
    NewestFirst,
    /// Reverse of directory scan order
    ScanReversed,
}

/// Repository configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Repository directory name under the project root
    pub repository_dir: String,
    /// Default listing order
    pub list_order: ListOrder,
    /// Only snapshot documents with unsaved changes
    pub create_only_if_dirty: bool,
    /// Keep the repository directory out of version control
    pub update_gitignore: bool,
    /// Version of the crate that wrote this config
    pub version: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            repository_dir: DEFAULT_REPOSITORY_DIR.to_string(),
            list_order: ListOrder::default(),
            create_only_if_dirty: true,
            update_gitignore: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl HistoryConfig {
    /// Check the values make sense
    pub fn validate(&self) -> Result<()> {
        let dir = self.repository_dir.trim();
        if dir.is_empty() || dir == "." || dir == ".." {
            return Err(HistoryError::InvalidConfiguration(format!(
                "repository_dir {:?} does not name a directory",
                self.repository_dir
            )));
        }
        if dir.contains(['/', '\\']) {
            return Err(HistoryError::InvalidConfiguration(format!(
                "repository_dir {:?} must be a single directory name",
                self.repository_dir
            )));
        }
        Ok(())
    }

    /// Load from `<repository_root>/config.json`, or `None` if absent
    pub fn load(repository_root: &Path) -> Result<Option<Self>> {
        let path = repository_root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let config: HistoryConfig = serde_json::from_str(&content)?;
        config.validate()?;
        debug!("Loaded configuration from {:?}", path);
        Ok(Some(config))
    }

    /// Write to `<repository_root>/config.json`
    pub fn save(&self, repository_root: &Path) -> Result<()> {
        let path = repository_root.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        debug!("Saved configuration to {:?}", path);
        Ok(())
    }
}

/// Listing filters
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Only return labeled revisions
    pub labeled_only: bool,
    /// Return at most this many revisions, after ordering
    pub limit: Option<usize>,
    /// Override the configured order
    pub order: Option<ListOrder>,
}

/// Two files to hand to a diff tool, older content on the left
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPair {
    /// Older side
    pub left: PathBuf,
    /// Newer side
    pub right: PathBuf,
    /// Title for the left side
    pub left_title: String,
    /// Title for the right side
    pub right_title: String,
}

impl DiffPair {
    /// Compare a revision with the live file
    pub fn against_live(entry: &RevisionEntry) -> Self {
        Self {
            left: entry.shadow_full_path(),
            right: entry.original_path().to_path_buf(),
            left_title: format!(
                "{} ({})",
                entry.original_file_name(),
                entry.timestamp_and_label()
            ),
            right_title: format!("{} (current)", entry.original_file_name()),
        }
    }

    /// Compare two revisions; argument order does not matter
    pub fn between(a: &RevisionEntry, b: &RevisionEntry) -> Self {
        let (older, newer) = if a.timestamp() <= b.timestamp() {
            (a, b)
        } else {
            (b, a)
        };
        Self {
            left: older.shadow_full_path(),
            right: newer.shadow_full_path(),
            left_title: format!(
                "{} ({})",
                older.original_file_name(),
                older.timestamp_and_label()
            ),
            right_title: format!(
                "{} ({})",
                newer.original_file_name(),
                newer.timestamp_and_label()
            ),
        }
    }
}

/// Summary of the whole shadow tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryStats {
    /// Revision files that decode
    pub revisions: usize,
    /// Of those, how many carry a label
    pub labeled: usize,
    /// Files whose names do not decode
    pub malformed: usize,
    /// Directories holding at least one file
    pub shadow_dirs: usize,
    /// Bytes used by revision files
    pub total_bytes: u64,
}

/// Statistics from pruning orphaned shadow files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PruneStats {
    /// Shadow files examined
    pub files_examined: usize,
    /// Files deleted (zero on a dry run)
    pub files_deleted: usize,
    /// Bytes reclaimed, or reclaimable on a dry run
    pub bytes_reclaimed: u64,
    /// Empty shadow directories removed
    pub dirs_removed: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Orphaned files found
    pub orphans: Vec<PathBuf>,
}
