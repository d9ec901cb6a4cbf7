//! Integration tests for localhistory
//!
//! Exercises the store the way an editor does: edits, saves, browsing,
//! labeling, diffing and cleanup across several files and both shadow layouts.

use ::localhistory::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::info;

/// Test harness around a temporary project
pub struct HistoryTestHarness {
    pub temp_dir: TempDir,
    pub store: Arc<RevisionStore>,
}

impl HistoryTestHarness {
    /// Create a project with an initialized repository
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store = RevisionStoreBuilder::new()
            .update_gitignore(false)
            .build(temp_dir.path())
            .unwrap();

        Self {
            temp_dir,
            store: Arc::new(store),
        }
    }

    /// Absolute path of a project-relative file
    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    /// Write a project file, creating parent directories
    pub fn write(&self, relative: &str, content: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Write a file and snapshot it at `timestamp`
    pub fn save_at(&self, relative: &str, content: &str, timestamp: i64) -> anyhow::Result<RevisionEntry> {
        let path = self.write(relative, content)?;
        Ok(self.store.try_create_revision_at(&path, timestamp)?)
    }

    /// Place a revision file in the legacy layout, as older versions did
    pub fn plant_legacy(&self, relative: &str, shadow_name: &str, content: &str) -> anyhow::Result<PathBuf> {
        let dir = self
            .store
            .mapper()
            .legacy_shadow_dir_for(&self.path(relative))
            .ok_or_else(|| anyhow::anyhow!("{relative} is outside the project"))?;
        fs::create_dir_all(&dir)?;
        let path = dir.join(shadow_name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Timestamps of the listed revisions, in listing order
    pub fn timestamps(&self, relative: &str) -> Vec<i64> {
        self.store
            .list_revisions(&self.path(relative))
            .iter()
            .map(RevisionEntry::timestamp)
            .collect()
    }

    /// Find one revision by timestamp
    pub fn revision(&self, relative: &str, timestamp: i64) -> RevisionEntry {
        self.store
            .list_revisions(&self.path(relative))
            .into_iter()
            .find(|r| r.timestamp() == timestamp)
            .unwrap_or_else(|| panic!("no revision {timestamp} of {relative}"))
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_editing_session() {
        let harness = HistoryTestHarness::new();

        for (i, content) in ["v1", "v2", "v3", "v4"].iter().enumerate() {
            harness
                .save_at("src/lib.rs", content, 1_700_000_000 + i as i64 * 60)
                .unwrap();
        }
        info!("Saved four revisions");

        assert_eq!(
            harness.timestamps("src/lib.rs"),
            vec![1_700_000_180, 1_700_000_120, 1_700_000_060, 1_700_000_000]
        );

        // Every revision holds the content it was saved with
        let revisions = harness.store.list_revisions(&harness.path("src/lib.rs"));
        let contents: Vec<_> = revisions
            .iter()
            .map(|r| read(&r.shadow_full_path()))
            .collect();
        assert_eq!(contents, vec!["v4", "v3", "v2", "v1"]);

        // Label the first one, compare it with the live file
        let mut first = harness.revision("src/lib.rs", 1_700_000_000);
        harness.store.add_label(&mut first, "initial").unwrap();
        let pair = DiffPair::against_live(&first);
        assert_eq!(read(&pair.left), "v1");
        assert_eq!(read(&pair.right), "v4");

        // Compare two revisions, argument order does not matter
        let third = harness.revision("src/lib.rs", 1_700_000_120);
        let pair = DiffPair::between(&third, &first);
        assert_eq!(read(&pair.left), "v1");
        assert_eq!(read(&pair.right), "v3");

        // Label survives a fresh listing
        let labeled = harness.store.list_revisions_with(
            &harness.path("src/lib.rs"),
            &ListOptions {
                labeled_only: true,
                ..Default::default()
            },
        );
        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].label(), Some("initial"));

        // Delete the middle revisions
        for ts in [1_700_000_060, 1_700_000_120] {
            let entry = harness.revision("src/lib.rs", ts);
            harness.store.delete_revision(entry).unwrap();
        }
        assert_eq!(
            harness.timestamps("src/lib.rs"),
            vec![1_700_000_180, 1_700_000_000]
        );
        assert!(logs_contain("Saved four revisions"));
    }

    #[test]
    fn test_files_in_one_directory_stay_apart() {
        let harness = HistoryTestHarness::new();
        harness.save_at("src/a.rs", "a", 100).unwrap();
        harness.save_at("src/b.rs", "b", 100).unwrap();
        harness.save_at("src/b.rs", "b2", 200).unwrap();
        harness.save_at("src/ab.rs", "ab", 300).unwrap();

        assert_eq!(harness.timestamps("src/a.rs"), vec![100]);
        assert_eq!(harness.timestamps("src/b.rs"), vec![200, 100]);
        assert_eq!(harness.timestamps("src/ab.rs"), vec![300]);
    }

    #[test]
    fn test_same_name_in_different_directories() {
        let harness = HistoryTestHarness::new();
        harness.save_at("a/mod.rs", "a", 100).unwrap();
        harness.save_at("b/mod.rs", "b", 200).unwrap();

        let a = harness.store.list_revisions(&harness.path("a/mod.rs"));
        assert_eq!(a.len(), 1);
        assert_eq!(read(&a[0].shadow_full_path()), "a");
        assert_ne!(a[0].repository_path(), harness.revision("b/mod.rs", 200).repository_path());
    }

    #[test]
    fn test_upgraded_repository_mixes_layouts() {
        let harness = HistoryTestHarness::new();
        harness.write("src/main.rs", "live").unwrap();
        harness.plant_legacy("src/main.rs", "100$main.rs", "old").unwrap();
        harness
            .plant_legacy("src/main.rs", "150$main.rs$release", "older release")
            .unwrap();
        harness.save_at("src/main.rs", "new", 200).unwrap();

        let revisions = harness.store.list_revisions(&harness.path("src/main.rs"));
        let summary: Vec<_> = revisions
            .iter()
            .map(|r| (r.timestamp(), r.format(), r.label().map(str::to_string)))
            .collect();
        assert_eq!(
            summary,
            vec![
                (200, AddressFormat::Current, None),
                (150, AddressFormat::Legacy, Some("release".to_string())),
                (100, AddressFormat::Legacy, None),
            ]
        );

        // Legacy revisions can be relabeled in place
        let mut legacy = harness.revision("src/main.rs", 150);
        harness.store.remove_label(&mut legacy).unwrap();
        assert!(legacy.shadow_full_path().ends_with("150$main.rs"));
        assert_eq!(harness.revision("src/main.rs", 150).label(), None);
    }

    #[test]
    fn test_scan_reversed_order_option() {
        let harness = HistoryTestHarness::new();
        for ts in [300, 100, 200] {
            harness.save_at("x.txt", "x", ts).unwrap();
        }

        let mut listed: Vec<_> = harness
            .store
            .list_revisions_with(
                &harness.path("x.txt"),
                &ListOptions {
                    order: Some(ListOrder::ScanReversed),
                    ..Default::default()
                },
            )
            .iter()
            .map(RevisionEntry::timestamp)
            .collect();
        // Scan order is up to the filesystem; the set is what matters
        listed.sort_unstable();
        assert_eq!(listed, vec![100, 200, 300]);
    }

    #[test]
    fn test_save_hook_from_several_threads() {
        let harness = HistoryTestHarness::new();
        let hook = Arc::new(SaveHook::<usize>::new(harness.store.clone()));
        let paths: Vec<_> = (0..8)
            .map(|i| harness.write(&format!("src/file_{i}.rs"), "x").unwrap())
            .collect();

        let handles: Vec<_> = paths
            .iter()
            .cloned()
            .enumerate()
            .map(|(doc, path)| {
                let hook = hook.clone();
                std::thread::spawn(move || {
                    hook.on_dirty_changed(doc, true);
                    hook.on_before_save(&doc, &path).is_some()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        for path in &paths {
            assert_eq!(harness.store.list_revisions(path).len(), 1);
        }
        assert!(hook.tracker().is_empty());
    }

    #[test]
    fn test_prune_after_files_are_removed() {
        let harness = HistoryTestHarness::new();
        harness.save_at("keep/a.txt", "a", 100).unwrap();
        harness.save_at("drop/b.txt", "b", 100).unwrap();
        harness.save_at("drop/b.txt", "b", 200).unwrap();
        fs::remove_dir_all(harness.path("drop")).unwrap();

        let stats = harness.store.prune(false).unwrap();
        assert_eq!(stats.files_deleted, 2);
        assert!(stats.dirs_removed >= 1);

        let repository = harness.store.stats().unwrap();
        assert_eq!(repository.revisions, 1);
        assert_eq!(repository.shadow_dirs, 1);
        assert_eq!(harness.timestamps("keep/a.txt"), vec![100]);
    }

    #[test]
    fn test_reopen_sees_existing_history() {
        let harness = HistoryTestHarness::new();
        harness.save_at("notes.md", "hello", 100).unwrap();

        let reopened = RevisionStore::open(harness.temp_dir.path()).unwrap();
        let revisions = reopened.list_revisions(&harness.path("notes.md"));
        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].original_file_name(), "notes.md");
    }
}
