//! Stored revisions
//!
//! A [`RevisionEntry`] describes one timestamped copy of a tracked file. It is
//! rebuilt from the shadow tree on every listing and carries everything the
//! host needs: where the copy lives, which live file it belongs to, when it was
//! taken and its optional label.
//!
//! ## Identity
//!
//! Two entries are the same revision when they have the same original path
//! and original file name (both ignoring case) and the same timestamp. The
//! label and the repository location are not part of the identity, so a
//! revision keeps its identity across relabeling and is reported once even
//! when it is reachable through both the current and the legacy shadow
//! directory.
//!
//! ## Labeling
//!
//! Labels live in the filename. Adding, changing or removing a label is a
//! single rename of the backing file; the in-memory label is only updated once
//! the rename succeeded.

use crate::codec;
use crate::error::{HistoryError, Result};
use crate::path_mapper::{eq_ignore_case, fold_case, AddressFormat};
use chrono::{Local, TimeZone};
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Display format for revision timestamps, e.g. `11/14/2023 10:13:20 PM`
const DISPLAY_FORMAT: &str = "%m/%d/%Y %-I:%M:%S %p";

/// One stored revision of a tracked file
#[derive(Debug, Clone)]
pub struct RevisionEntry {
    repository_path: PathBuf,
    original_path: PathBuf,
    original_file_name: String,
    timestamp: i64,
    label: Option<String>,
    format: AddressFormat,
}

impl RevisionEntry {
    /// Create an entry
    ///
    /// `repository_path` is the shadow directory holding the copy and
    /// `original_path` the full path of the live file.
    pub fn new(
        repository_path: impl Into<PathBuf>,
        original_path: impl Into<PathBuf>,
        original_file_name: impl Into<String>,
        timestamp: i64,
        label: Option<String>,
    ) -> Self {
        Self {
            repository_path: repository_path.into(),
            original_path: original_path.into(),
            original_file_name: original_file_name.into(),
            timestamp,
            label: label.filter(|l| !l.is_empty()),
            format: AddressFormat::Current,
        }
    }

    /// Record which address format located this entry
    pub fn with_format(mut self, format: AddressFormat) -> Self {
        self.format = format;
        self
    }

    /// Shadow directory holding the backing file
    pub fn repository_path(&self) -> &Path {
        &self.repository_path
    }

    /// Full path of the live file this revision was copied from
    pub fn original_path(&self) -> &Path {
        &self.original_path
    }

    /// Base name of the live file
    pub fn original_file_name(&self) -> &str {
        &self.original_file_name
    }

    /// Seconds since the Unix epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Current label, if any
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether the revision carries a label
    pub fn is_labeled(&self) -> bool {
        self.label.is_some()
    }

    /// Address format the entry was found through
    pub fn format(&self) -> AddressFormat {
        self.format
    }

    /// Filename of the backing file
    pub fn shadow_file_name(&self) -> String {
        codec::encode(
            self.timestamp,
            &self.original_file_name,
            self.label.as_deref(),
        )
    }

    /// Full path of the backing file
    pub fn shadow_full_path(&self) -> PathBuf {
        self.repository_path.join(self.shadow_file_name())
    }

    /// Timestamp rendered in local time
    pub fn display_timestamp(&self) -> String {
        match Local.timestamp_opt(self.timestamp, 0).single() {
            Some(time) => time.format(DISPLAY_FORMAT).to_string(),
            None => self.timestamp.to_string(),
        }
    }

    /// Display timestamp followed by the label, when there is one
    pub fn timestamp_and_label(&self) -> String {
        match &self.label {
            Some(label) => format!("{} {}", self.display_timestamp(), label),
            None => self.display_timestamp(),
        }
    }

    /// Label the revision, replacing any existing label
    ///
    /// The backing file is renamed first. Nothing changes when the label is
    /// invalid, equal to the current one, already taken by another file, or
    /// when the rename fails.
    pub fn add_label(&mut self, label: &str) -> Result<()> {
        let label = label.trim();
        codec::validate_label(label)?;

        if self.label.as_deref() == Some(label) {
            return Err(HistoryError::LabelUnchanged(label.to_string()));
        }

        let source = self.shadow_full_path();
        let target = self.repository_path.join(codec::encode(
            self.timestamp,
            &self.original_file_name,
            Some(label),
        ));
        self.rename_backing_file(&source, &target)?;

        info!("Labeled revision {:?} as {:?}", source, label);
        self.label = Some(label.to_string());
        Ok(())
    }

    /// Remove the label
    ///
    /// Unlabeled revisions are left alone. Otherwise exactly the trailing
    /// `${label}` is stripped from the filename.
    pub fn remove_label(&mut self) -> Result<()> {
        let Some(label) = self.label.clone() else {
            debug!("Revision {:?} has no label to remove", self.shadow_file_name());
            return Ok(());
        };

        let current = self.shadow_file_name();
        let suffix = format!("{}{}", codec::DELIMITER, label);
        let stripped = current.strip_suffix(suffix.as_str()).ok_or_else(|| {
            HistoryError::internal(format!("{current:?} does not end with {suffix:?}"))
        })?;

        let source = self.repository_path.join(&current);
        let target = self.repository_path.join(stripped);
        self.rename_backing_file(&source, &target)?;

        info!("Removed label {:?} from revision {:?}", label, target);
        self.label = None;
        Ok(())
    }

    fn rename_backing_file(&self, source: &Path, target: &Path) -> Result<()> {
        if target.exists() {
            return Err(HistoryError::RevisionExists(target.to_path_buf()));
        }
        fs::rename(source, target)?;
        Ok(())
    }
}

impl PartialEq for RevisionEntry {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && eq_ignore_case(
                &self.original_path.to_string_lossy(),
                &other.original_path.to_string_lossy(),
            )
            && eq_ignore_case(&self.original_file_name, &other.original_file_name)
    }
}

impl Eq for RevisionEntry {}

impl Hash for RevisionEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        fold_case(&self.original_path.to_string_lossy()).hash(state);
        fold_case(&self.original_file_name).hash(state);
        self.timestamp.hash(state);
    }
}
