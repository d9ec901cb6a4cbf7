//! Utility functions for localhistory
//!
//! Small filesystem helpers shared by the store and the CLI:
//!
//! - `.gitignore` maintenance for the repository directory
//! - Removal of shadow directories left empty by deletes and prunes
//! - Human-readable byte sizes

use crate::error::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::trace;

/// Make sure `.gitignore` lists `entry`
///
/// Creates the file when missing. An existing line equal to `entry`, `/entry`,
/// `entry/` or `/entry/` counts as present. Returns `true` if the file was
/// changed.
pub fn ensure_gitignore_has_entry(gitignore_path: &Path, entry: &str) -> Result<bool> {
    let existing = match fs::read_to_string(gitignore_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let present = existing.lines().any(|line| {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let line = line.strip_suffix('/').unwrap_or(line);
        line == entry
    });
    if present {
        return Ok(false);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(gitignore_path)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{entry}/")?;
    trace!("Added {:?} to {:?}", entry, gitignore_path);
    Ok(true)
}

/// Remove a directory if it is empty
pub fn remove_dir_if_empty(path: &Path) -> Result<bool> {
    if path.is_dir() && fs::read_dir(path)?.next().is_none() {
        fs::remove_dir(path)?;
        trace!("Removed empty directory: {:?}", path);
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Remove `start` and its ancestors while they are empty, stopping before
/// `stop`. `stop` itself is never removed. Returns the number of directories
/// removed.
pub fn prune_empty_parents(start: &Path, stop: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut current = Some(start);

    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        if !remove_dir_if_empty(dir)? {
            break;
        }
        removed += 1;
        current = dir.parent();
    }

    Ok(removed)
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
