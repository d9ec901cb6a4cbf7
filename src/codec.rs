//! Revision filename codec
//!
//! A revision lives on disk as a single file whose name carries its whole
//! identity:
//!
//! ```text
//! {timestamp}${original file name}
//! {timestamp}${original file name}${label}
//! ```
//!
//! `timestamp` is decimal seconds since the Unix epoch. The `$` delimiter is
//! reserved: it may not appear in labels, and an original file name that
//! contains it will not decode back to itself.
//!
//! Decoding is strict so that every accepted name re-encodes byte for byte.
//! Anything else is reported as [`HistoryError::MalformedName`] and callers
//! scanning a directory skip the file.
//!
//! ## Examples
//!
//! ```rust
//! use localhistory::codec::{self, VersionName};
//!
//! let name = codec::encode(1_700_000_000, "main.rs", Some("before-refactor"));
//! assert_eq!(name, "1700000000$main.rs$before-refactor");
//!
//! let decoded = codec::decode(&name).unwrap();
//! assert_eq!(decoded, VersionName {
//!     timestamp: 1_700_000_000,
//!     original_file_name: "main.rs".to_string(),
//!     label: Some("before-refactor".to_string()),
//! });
//! ```

use crate::error::{HistoryError, Result};
use std::fmt;
use std::str::FromStr;

/// Separator between the timestamp, file name and label segments
pub const DELIMITER: char = '$';

/// Characters that cannot appear in a file name on any supported platform
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Decoded form of a revision filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionName {
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    /// Base name of the file this revision was copied from
    pub original_file_name: String,
    /// Optional user label
    pub label: Option<String>,
}

impl VersionName {
    /// Build an unlabeled name
    pub fn new(timestamp: i64, original_file_name: impl Into<String>) -> Self {
        Self {
            timestamp,
            original_file_name: original_file_name.into(),
            label: None,
        }
    }

    /// Attach a label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = if label.is_empty() { None } else { Some(label) };
        self
    }

    /// Encode back into a filename
    pub fn encode(&self) -> String {
        encode(self.timestamp, &self.original_file_name, self.label.as_deref())
    }
}

impl fmt::Display for VersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for VersionName {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}

/// Encode a revision filename
///
/// The label suffix is only written when the label is present and non-empty.
pub fn encode(timestamp: i64, original_file_name: &str, label: Option<&str>) -> String {
    match label {
        Some(label) if !label.is_empty() => {
            format!("{timestamp}{DELIMITER}{original_file_name}{DELIMITER}{label}")
        }
        _ => format!("{timestamp}{DELIMITER}{original_file_name}"),
    }
}

/// Decode a revision filename
///
/// Exactly two segments give an unlabeled revision and exactly three a
/// labeled one. One segment, or four and more, is malformed; so is an empty
/// name or label segment and a timestamp that is not a canonical decimal
/// integer.
pub fn decode(file_name: &str) -> Result<VersionName> {
    let parts: Vec<&str> = file_name.split(DELIMITER).collect();

    let (raw_timestamp, name, label) = match parts.as_slice() {
        [timestamp, name] => (*timestamp, *name, None),
        [timestamp, name, label] => (*timestamp, *name, Some(*label)),
        [_] => return Err(HistoryError::malformed(file_name, "missing delimiter")),
        _ => {
            return Err(HistoryError::malformed(
                file_name,
                format!("expected 2 or 3 segments, found {}", parts.len()),
            ))
        }
    };

    let timestamp: i64 = raw_timestamp
        .parse()
        .map_err(|e| HistoryError::malformed(file_name, format!("bad timestamp: {e}")))?;
    if timestamp.to_string() != raw_timestamp {
        return Err(HistoryError::malformed(
            file_name,
            "timestamp is not in canonical form",
        ));
    }

    if name.is_empty() {
        return Err(HistoryError::malformed(file_name, "empty file name segment"));
    }

    let label = match label {
        Some("") => return Err(HistoryError::malformed(file_name, "empty label segment")),
        Some(label) => Some(label.to_string()),
        None => None,
    };

    Ok(VersionName {
        timestamp,
        original_file_name: name.to_string(),
        label,
    })
}

/// Check that a label can be embedded in a revision filename
pub fn validate_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(HistoryError::invalid_label(label, "label is empty"));
    }
    if label.contains(DELIMITER) {
        return Err(HistoryError::invalid_label(
            label,
            format!("label contains the reserved '{DELIMITER}' delimiter"),
        ));
    }
    if let Some(c) = label
        .chars()
        .find(|c| c.is_control() || INVALID_FILE_NAME_CHARS.contains(c))
    {
        return Err(HistoryError::invalid_label(
            label,
            format!("character {c:?} is not allowed in a file name"),
        ));
    }
    Ok(())
}
