//! Revision repository
//!
//! [`RevisionStore`] ties the [`PathMapper`] and the filename codec together
//! into the operations a host needs: snapshot a file on save, list its past
//! revisions, label and unlabel them, and clean up.
//!
//! ## Overview
//!
//! The repository is a plain directory (by default `.localhistory`) under the
//! project root. Nothing is indexed: every revision is a file whose name
//! encodes its timestamp, original file name and label, and every listing
//! rescans the relevant shadow directories. This keeps the repository robust
//! against partial writes, manual edits and repositories written by older
//! versions.
//!
//! The host-facing operations [`create_revision`](RevisionStore::create_revision)
//! and [`list_revisions`](RevisionStore::list_revisions) never fail: problems
//! are logged and reported as `None` or an empty list, so a save is never
//! blocked by history bookkeeping.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use localhistory::RevisionStore;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RevisionStore::open("/home/user/project")?;
//!
//! // Snapshot a file right before it is saved
//! store.create_revision(Path::new("/home/user/project/src/main.rs"));
//!
//! // Newest first
//! let mut revisions = store.list_revisions(Path::new("/home/user/project/src/main.rs"));
//! if let Some(latest) = revisions.first_mut() {
//!     store.add_label(latest, "before-refactor")?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::codec;
use crate::error::{HistoryError, Result};
use crate::path_mapper::{
    eq_ignore_case, normalize_path, FsProbe, PathMapper, PathProbe, DEFAULT_REPOSITORY_DIR,
};
use crate::revision::RevisionEntry;
use crate::types::{
    HistoryConfig, ListOptions, ListOrder, PruneStats, RepositoryStats, CONFIG_FILE,
};
use crate::utils;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, trace, warn};
use walkdir::WalkDir;

/// Shadow revision repository for one project
///
/// `RevisionStore` is `Send + Sync`; hosts may share one behind an `Arc`.
/// Operations on different files touch disjoint paths. For the same file the
/// last writer wins.
#[derive(Debug)]
pub struct RevisionStore {
    mapper: PathMapper,
    config: RwLock<HistoryConfig>,
}

/// A file found while walking the shadow tree
struct ShadowFile {
    dir: PathBuf,
    path: PathBuf,
    size: u64,
}

impl ShadowFile {
    fn decode(&self) -> Result<codec::VersionName> {
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| HistoryError::malformed(self.path.to_string_lossy(), "not UTF-8"))?;
        codec::decode(name)
    }
}

impl RevisionStore {
    /// Open the repository of `project_root`, creating it with default
    /// settings if it does not exist yet
    ///
    /// # Errors
    ///
    /// - [`HistoryError::InvalidInput`] if the project root is not a directory
    /// - [`HistoryError::Io`] if the repository cannot be created
    /// - [`HistoryError::Json`] if an existing `config.json` is unreadable
    pub fn open(project_root: impl AsRef<Path>) -> Result<Self> {
        RevisionStoreBuilder::new().build(project_root)
    }

    /// Normalized project root
    pub fn project_root(&self) -> PathBuf {
        self.mapper.project_root()
    }

    /// Normalized repository root
    pub fn repository_root(&self) -> PathBuf {
        self.mapper.repository_root()
    }

    /// Path mapper used by this store
    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> HistoryConfig {
        self.config.read().clone()
    }

    /// Change the configuration and persist it
    ///
    /// The repository directory cannot be changed on an open store.
    pub fn update_config<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut HistoryConfig),
    {
        let mut config = self.config.write();
        let mut updated = config.clone();
        update(&mut updated);

        if updated.repository_dir != config.repository_dir {
            return Err(HistoryError::InvalidConfiguration(
                "repository_dir cannot be changed on an open repository".to_string(),
            ));
        }
        updated.validate()?;
        updated.save(&self.repository_root())?;

        debug!("Configuration updated: {:?}", updated);
        *config = updated;
        Ok(())
    }

    /// Whether `path` is a file the store keeps history for
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.mapper.is_tracked(path)
    }

    /// Copy the current content of `path` into the repository
    ///
    /// Returns `None` (and logs why) when the path is empty, outside the
    /// project, or the copy fails.
    #[instrument(skip(self))]
    pub fn create_revision(&self, path: &Path) -> Option<RevisionEntry> {
        match self.try_create_revision(path) {
            Ok(entry) => Some(entry),
            Err(e) if e.is_input_error() => {
                debug!("Ignoring save of {:?}: {}", path, e);
                None
            }
            Err(e) => {
                warn!("Failed to create revision for {:?}: {}", path, e);
                None
            }
        }
    }

    /// Like [`create_revision`](Self::create_revision), timestamped now, but
    /// reports the failure
    pub fn try_create_revision(&self, path: &Path) -> Result<RevisionEntry> {
        self.try_create_revision_at(path, chrono::Local::now().timestamp())
    }

    /// Copy `path` into the repository under an explicit timestamp
    ///
    /// An existing revision with the same filename is overwritten.
    #[instrument(skip(self))]
    pub fn try_create_revision_at(&self, path: &Path, timestamp: i64) -> Result<RevisionEntry> {
        let original = self.tracked_path(path)?;
        let file_name = original
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                HistoryError::invalid_input(format!("{:?} has no UTF-8 file name", original))
            })?
            .to_string();

        let shadow_dir = self.mapper.shadow_dir_for(&original)?;
        fs::create_dir_all(&shadow_dir)?;

        let entry = RevisionEntry::new(shadow_dir, original.clone(), file_name, timestamp, None);
        let bytes = fs::copy(&original, entry.shadow_full_path())?;

        info!(
            "Created revision {:?} ({})",
            entry.shadow_full_path(),
            utils::format_bytes(bytes)
        );
        Ok(entry)
    }

    /// All revisions of `path`, in the configured order
    ///
    /// Empty when the path is empty or has no history.
    pub fn list_revisions(&self, path: &Path) -> Vec<RevisionEntry> {
        self.list_revisions_with(path, &ListOptions::default())
    }

    /// Revisions of `path`, filtered and ordered by `options`
    #[instrument(skip(self))]
    pub fn list_revisions_with(&self, path: &Path, options: &ListOptions) -> Vec<RevisionEntry> {
        if path.as_os_str().is_empty() {
            debug!("Empty path, no revisions to list");
            return Vec::new();
        }

        let original = normalize_path(path);
        let Some(file_name) = original.file_name().and_then(|n| n.to_str()) else {
            debug!("{:?} has no UTF-8 file name", original);
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for (format, dir) in self.mapper.shadow_dirs_for(&original) {
            if !dir.is_dir() {
                trace!("No {} shadow directory at {:?}", format, dir);
                continue;
            }
            let read_dir = match fs::read_dir(&dir) {
                Ok(read_dir) => read_dir,
                Err(e) => {
                    warn!("Failed to scan {:?}: {}", dir, e);
                    continue;
                }
            };

            for item in read_dir {
                let item = match item {
                    Ok(item) => item,
                    Err(e) => {
                        warn!("Failed to read entry in {:?}: {}", dir, e);
                        continue;
                    }
                };
                if !item.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    continue;
                }
                let item_name = item.file_name();
                let Some(item_name) = item_name.to_str() else {
                    debug!("Skipping non UTF-8 name in {:?}", dir);
                    continue;
                };

                let version = match codec::decode(item_name) {
                    Ok(version) => version,
                    Err(e) if e.is_skippable() => {
                        debug!("Skipping {}", e);
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to decode {:?}: {}", item_name, e);
                        continue;
                    }
                };
                if !eq_ignore_case(&version.original_file_name, file_name) {
                    trace!("Skipping {:?}, belongs to another file", item_name);
                    continue;
                }

                match self.resolve_entry(&dir, version, &original) {
                    Ok(entry) => {
                        if seen.insert(entry.clone()) {
                            entries.push(entry);
                        }
                    }
                    Err(e) if e.is_skippable() => debug!("Dropping {:?}: {}", item_name, e),
                    Err(e) => warn!("Failed to resolve {:?}: {}", item_name, e),
                }
            }
        }

        match options.order.unwrap_or(self.config.read().list_order) {
            ListOrder::NewestFirst => {
                entries.sort_by_key(|entry| std::cmp::Reverse(entry.timestamp()))
            }
            ListOrder::ScanReversed => entries.reverse(),
        }
        if options.labeled_only {
            entries.retain(RevisionEntry::is_labeled);
        }
        if let Some(limit) = options.limit {
            entries.truncate(limit);
        }

        debug!("Found {} revisions of {:?}", entries.len(), original);
        entries
    }

    /// Label a revision, renaming its backing file
    ///
    /// On failure the entry and the file are left as they were.
    #[instrument(skip(self, entry), fields(revision = %entry.shadow_file_name()))]
    pub fn add_label(&self, entry: &mut RevisionEntry, label: &str) -> Result<()> {
        self.ensure_in_repository(entry)?;
        entry.add_label(label)
    }

    /// Remove the label of a revision; unlabeled revisions are left alone
    #[instrument(skip(self, entry), fields(revision = %entry.shadow_file_name()))]
    pub fn remove_label(&self, entry: &mut RevisionEntry) -> Result<()> {
        self.ensure_in_repository(entry)?;
        entry.remove_label()
    }

    /// Delete a revision and any shadow directories it leaves empty
    #[instrument(skip(self, entry), fields(revision = %entry.shadow_file_name()))]
    pub fn delete_revision(&self, entry: RevisionEntry) -> Result<()> {
        self.ensure_in_repository(&entry)?;

        fs::remove_file(entry.shadow_full_path())?;
        let removed =
            utils::prune_empty_parents(entry.repository_path(), &self.repository_root())?;

        info!(
            "Deleted revision {:?} ({} empty directories removed)",
            entry.shadow_full_path(),
            removed
        );
        Ok(())
    }

    /// Summarize the whole shadow tree
    #[instrument(skip(self))]
    pub fn stats(&self) -> Result<RepositoryStats> {
        let mut stats = RepositoryStats::default();
        let mut dirs = HashSet::new();

        for file in self.shadow_files()? {
            dirs.insert(file.dir.clone());
            match file.decode() {
                Ok(version) => {
                    stats.revisions += 1;
                    stats.total_bytes += file.size;
                    if version.label.is_some() {
                        stats.labeled += 1;
                    }
                }
                Err(_) => stats.malformed += 1,
            }
        }
        stats.shadow_dirs = dirs.len();

        Ok(stats)
    }

    /// Delete orphaned shadow files
    ///
    /// A file is orphaned when its name does not decode or its original cannot
    /// be resolved in any address format. With `dry_run` nothing is deleted
    /// and the returned stats describe what would be.
    #[instrument(skip(self))]
    pub fn prune(&self, dry_run: bool) -> Result<PruneStats> {
        info!(
            "Pruning orphaned revisions{}",
            if dry_run { " (dry run)" } else { "" }
        );
        let start = Instant::now();
        let mut stats = PruneStats::default();
        let mut touched_dirs = BTreeSet::new();

        for file in self.shadow_files()? {
            stats.files_examined += 1;

            let orphan = match file.decode() {
                Ok(version) => self
                    .mapper
                    .original_path_for(&file.dir, &version.original_file_name)
                    .is_none(),
                Err(e) => {
                    trace!("{}", e);
                    true
                }
            };
            if !orphan {
                continue;
            }

            debug!("Orphaned revision file {:?}", file.path);
            stats.bytes_reclaimed += file.size;
            stats.orphans.push(file.path.clone());

            if dry_run {
                continue;
            }
            match fs::remove_file(&file.path) {
                Ok(()) => {
                    stats.files_deleted += 1;
                    touched_dirs.insert(file.dir);
                }
                Err(e) => warn!("Failed to delete {:?}: {}", file.path, e),
            }
        }

        // Deepest directories first so parents see their children gone
        let repository_root = self.repository_root();
        for dir in touched_dirs.iter().rev() {
            match utils::prune_empty_parents(dir, &repository_root) {
                Ok(removed) => stats.dirs_removed += removed,
                Err(e) => warn!("Failed to remove empty directory {:?}: {}", dir, e),
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Prune complete in {}ms: {} orphans, {} deleted, {} reclaimed",
            stats.duration_ms,
            stats.orphans.len(),
            stats.files_deleted,
            utils::format_bytes(stats.bytes_reclaimed)
        );
        Ok(stats)
    }

    fn tracked_path(&self, path: &Path) -> Result<PathBuf> {
        if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
            return Err(HistoryError::invalid_input("path is empty"));
        }
        let normalized = normalize_path(path);
        if !self.mapper.is_tracked(&normalized) {
            return Err(HistoryError::NotASubPath {
                path: normalized,
                root: self.project_root(),
            });
        }
        Ok(normalized)
    }

    fn ensure_in_repository(&self, entry: &RevisionEntry) -> Result<()> {
        if self.mapper.is_in_repository(entry.repository_path()) {
            Ok(())
        } else {
            Err(HistoryError::invalid_input(format!(
                "{:?} is not inside the repository {:?}",
                entry.repository_path(),
                self.repository_root()
            )))
        }
    }

    /// Resolve a listed shadow file and check that it belongs to `expected`
    ///
    /// A directory can be the current shadow dir of one file and the legacy
    /// shadow dir of another. The resolver chain prefers the current layout,
    /// so a file that resolves to some other live file is rejected.
    fn resolve_entry(
        &self,
        dir: &Path,
        version: codec::VersionName,
        expected: &Path,
    ) -> Result<RevisionEntry> {
        let unresolvable = || HistoryError::UnresolvableOriginal(dir.join(version.encode()));
        let (original, format) = self
            .mapper
            .original_path_for(dir, &version.original_file_name)
            .ok_or_else(unresolvable)?;
        if !eq_ignore_case(&original.to_string_lossy(), &expected.to_string_lossy()) {
            trace!("{:?} resolves to {:?}, not {:?}", dir, original, expected);
            return Err(unresolvable());
        }

        Ok(RevisionEntry::new(
            dir,
            original,
            version.original_file_name,
            version.timestamp,
            version.label,
        )
        .with_format(format))
    }

    fn shadow_files(&self) -> Result<Vec<ShadowFile>> {
        let repository_root = self.repository_root();
        if !repository_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&repository_root).min_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.depth() == 1 && entry.file_name() == CONFIG_FILE {
                continue;
            }
            let dir = match entry.path().parent() {
                Some(dir) => dir.to_path_buf(),
                None => continue,
            };
            files.push(ShadowFile {
                dir,
                path: entry.path().to_path_buf(),
                size: entry.metadata()?.len(),
            });
        }
        Ok(files)
    }
}

/// Builder for opening a [`RevisionStore`] with custom settings
///
/// Settings given to the builder are written to `config.json` when the
/// repository is created. For an existing repository they override the stored
/// values for this session only.
///
/// # Examples
///
/// ```rust,no_run
/// use localhistory::{ListOrder, RevisionStoreBuilder};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RevisionStoreBuilder::new()
///     .repository_dir(".history")
///     .list_order(ListOrder::ScanReversed)
///     .update_gitignore(false)
///     .build("/home/user/project")?;
/// # Ok(())
/// # }
/// ```
///
/// # Default Configuration
///
/// - `repository_dir`: `.localhistory`
/// - `list_order`: newest first
/// - `update_gitignore`: true
/// - `create_only_if_dirty`: true
/// - `probe`: the real filesystem
#[derive(Debug, Default)]
pub struct RevisionStoreBuilder {
    repository_dir: Option<String>,
    list_order: Option<ListOrder>,
    update_gitignore: Option<bool>,
    create_only_if_dirty: Option<bool>,
    probe: Option<Arc<dyn PathProbe>>,
}

impl RevisionStoreBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the repository directory name under the project root
    pub fn repository_dir(mut self, name: impl Into<String>) -> Self {
        self.repository_dir = Some(name.into());
        self
    }

    /// Set the listing order
    pub fn list_order(mut self, order: ListOrder) -> Self {
        self.list_order = Some(order);
        self
    }

    /// Whether to add the repository directory to the project's `.gitignore`
    pub fn update_gitignore(mut self, enabled: bool) -> Self {
        self.update_gitignore = Some(enabled);
        self
    }

    /// Whether save hooks should skip documents without unsaved changes
    pub fn create_only_if_dirty(mut self, enabled: bool) -> Self {
        self.create_only_if_dirty = Some(enabled);
        self
    }

    /// Replace the filesystem probe used for reverse path resolution
    pub fn probe(mut self, probe: Arc<dyn PathProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Open the repository of `project_root`, initializing it if needed
    #[instrument(skip_all)]
    pub fn build(self, project_root: impl AsRef<Path>) -> Result<RevisionStore> {
        let project_root = project_root.as_ref();
        if project_root.as_os_str().is_empty() {
            return Err(HistoryError::invalid_input("project root is empty"));
        }
        if !project_root.is_dir() {
            return Err(HistoryError::invalid_input(format!(
                "project root {:?} is not a directory",
                project_root
            )));
        }
        let project_root = normalize_path(project_root);

        let repository_dir = self
            .repository_dir
            .unwrap_or_else(|| DEFAULT_REPOSITORY_DIR.to_string());
        let repository_root = project_root.join(repository_dir.trim());

        let (mut config, fresh) = match HistoryConfig::load(&repository_root)? {
            Some(loaded) => (loaded, false),
            None => (HistoryConfig::default(), true),
        };
        config.repository_dir = repository_dir.trim().to_string();
        if let Some(order) = self.list_order {
            config.list_order = order;
        }
        if let Some(enabled) = self.update_gitignore {
            config.update_gitignore = enabled;
        }
        if let Some(enabled) = self.create_only_if_dirty {
            config.create_only_if_dirty = enabled;
        }
        config.validate()?;

        if fresh {
            fs::create_dir_all(&repository_root)?;
            config.save(&repository_root)?;
            info!("Initialized repository at {:?}", repository_root);

            if config.update_gitignore {
                let gitignore = project_root.join(".gitignore");
                match utils::ensure_gitignore_has_entry(&gitignore, &config.repository_dir) {
                    Ok(true) => debug!("Added {} to .gitignore", config.repository_dir),
                    Ok(false) => {}
                    Err(e) => warn!("Failed to update .gitignore: {}", e),
                }
            }
        } else {
            debug!("Opened repository at {:?}", repository_root);
        }

        let probe = self.probe.unwrap_or_else(|| Arc::new(FsProbe));
        let mapper = PathMapper::new(&project_root, &repository_root).with_probe(probe);

        Ok(RevisionStore {
            mapper,
            config: RwLock::new(config),
        })
    }
}
