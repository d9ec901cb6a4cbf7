//! Error types for the localhistory library
//!
//! Every fallible operation in the crate returns [`Result`]. The engine never
//! panics on bad input or filesystem trouble: the store's host-facing
//! operations (`create_revision`, `list_revisions`) log and swallow these
//! errors, while the `try_*` and label operations hand them back to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the localhistory library
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Main error type for all localhistory operations
#[derive(Debug, Error)]
pub enum HistoryError {
    /// I/O errors during copy, rename, scan or delete
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors while reading or writing the repository configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Empty or otherwise unusable input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Path lies outside the project root (or inside the repository itself)
    #[error("{path:?} is not a tracked path under {root:?}")]
    NotASubPath {
        /// Offending path
        path: PathBuf,
        /// Project root it was checked against
        root: PathBuf,
    },

    /// A shadow filename that does not decode
    #[error("Malformed revision name {name:?}: {reason}")]
    MalformedName {
        /// The filename as found on disk
        name: String,
        /// Why decoding failed
        reason: String,
    },

    /// The original file of a shadow entry cannot be found in either format
    #[error("Original file for {0:?} cannot be resolved")]
    UnresolvableOriginal(PathBuf),

    /// Label rejected by validation
    #[error("Invalid label {label:?}: {reason}")]
    InvalidLabel {
        /// Rejected label
        label: String,
        /// Why it was rejected
        reason: String,
    },

    /// Relabeling to the label the revision already carries
    #[error("Revision is already labeled {0:?}")]
    LabelUnchanged(String),

    /// Rename target already present in the shadow directory
    #[error("Revision file already exists: {0:?}")]
    RevisionExists(PathBuf),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// File system watcher failure
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HistoryError {
    /// Create an invalid input error with a custom message
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        HistoryError::InvalidInput(msg.into())
    }

    /// Create a malformed name error
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        HistoryError::MalformedName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid label error
    pub fn invalid_label(label: impl Into<String>, reason: impl Into<String>) -> Self {
        HistoryError::InvalidLabel {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        HistoryError::Internal(msg.into())
    }

    /// Check if this error was caused by the caller's input rather than the filesystem
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            HistoryError::InvalidInput(_)
                | HistoryError::NotASubPath { .. }
                | HistoryError::InvalidLabel { .. }
                | HistoryError::LabelUnchanged(_)
        )
    }

    /// Check if a scan should skip the offending entry instead of failing
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            HistoryError::MalformedName { .. } | HistoryError::UnresolvableOriginal(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            HistoryError::NotASubPath { path, root } => {
                format!(
                    "{:?} is outside the project at {:?}. Only files under the project root have history.",
                    path, root
                )
            }
            HistoryError::InvalidLabel { label, reason } => {
                format!(
                    "Label {:?} cannot be used ({}). Labels must be non-empty and valid in a file name.",
                    label, reason
                )
            }
            HistoryError::RevisionExists(path) => {
                format!(
                    "{:?} already exists. Remove the label from that revision first or pick another label.",
                    path
                )
            }
            _ => self.to_string(),
        }
    }
}
