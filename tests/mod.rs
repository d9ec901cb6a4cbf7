//! Main test module for localhistory
//!
//! This module includes all test suites:
//! - Integration tests for editing sessions and mixed repository layouts
//! - Property-based tests for codec, identity and mapping invariants
//! - Edge cases around unusual file names and repository contents

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::localhistory::*;
    use std::fs;
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> RevisionStore {
        RevisionStoreBuilder::new()
            .update_gitignore(false)
            .build(temp.path())
            .unwrap()
    }

    #[test]
    fn test_special_filenames() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let special_names = vec![
            "file with spaces.txt",
            "file-with-dashes.txt",
            "file.with.dots.txt",
            "file(with)parens.txt",
            "file[with]brackets.txt",
            "no_extension",
            ".hidden",
        ];

        for name in &special_names {
            let path = temp.path().join(name);
            if fs::write(&path, name).is_err() {
                // Skip if OS doesn't support this filename
                continue;
            }
            let entry = store.try_create_revision_at(&path, 42).unwrap();
            assert_eq!(entry.original_file_name(), *name);

            let listed = store.list_revisions(&path);
            assert_eq!(listed.len(), 1, "{name}");
            assert_eq!(fs::read_to_string(listed[0].shadow_full_path()).unwrap(), *name);
        }
    }

    #[test]
    fn test_unicode_filenames() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let path = temp.path().join("日本語").join("ファイル.txt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "内容").unwrap();

        let mut entry = store.try_create_revision_at(&path, 7).unwrap();
        store.add_label(&mut entry, "版").unwrap();

        let listed = store.list_revisions(&path);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].label(), Some("版"));
    }

    #[test]
    fn test_delimiter_in_file_name_is_not_listed() {
        // "a$b.txt" encodes to "1$a$b.txt", which reads back as file "a"
        // with label "b.txt" and therefore never matches the live file.
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let path = temp.path().join("a$b.txt");
        fs::write(&path, "x").unwrap();

        let entry = store.try_create_revision_at(&path, 1).unwrap();
        assert!(entry.shadow_full_path().exists());
        assert!(store.list_revisions(&path).is_empty());
    }

    #[test]
    fn test_file_at_project_root() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let path = temp.path().join("README.md");
        fs::write(&path, "readme").unwrap();

        store.try_create_revision_at(&path, 10).unwrap();
        // The legacy shadow dir of a root file is the repository root itself,
        // which also holds config.json
        assert_eq!(
            store.mapper().legacy_shadow_dir_for(&path),
            Some(store.repository_root())
        );
        assert_eq!(store.list_revisions(&path).len(), 1);
    }

    #[test]
    fn test_deeply_nested_file() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let mut path = temp.path().to_path_buf();
        for i in 0..20 {
            path.push(format!("level{i}"));
        }
        fs::create_dir_all(&path).unwrap();
        path.push("deep.txt");
        fs::write(&path, "deep").unwrap();

        store.try_create_revision_at(&path, 5).unwrap();
        assert_eq!(store.list_revisions(&path).len(), 1);
    }

    #[test]
    fn test_dotted_paths() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src").join("a.txt"), "a").unwrap();

        let dotted = temp.path().join("src").join(".").join("..").join("src").join("a.txt");
        store.try_create_revision_at(&dotted, 1).unwrap();
        assert_eq!(
            store.list_revisions(&temp.path().join("src").join("a.txt")).len(),
            1
        );
    }

    #[test]
    fn test_directories_and_foreign_files_in_repository() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let path = temp.path().join("a.txt");
        fs::write(&path, "a").unwrap();
        let entry = store.try_create_revision_at(&path, 1).unwrap();

        let shadow = entry.repository_path();
        fs::create_dir_all(shadow.join("5$a.txt")).unwrap();
        fs::write(shadow.join("Thumbs.db"), "").unwrap();
        fs::write(shadow.join("0100$a.txt"), "").unwrap();
        fs::write(shadow.join("2$a.txt$"), "").unwrap();

        let listed = store.list_revisions(&path);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].timestamp(), 1);
    }

    #[test]
    fn test_corrupt_config_is_reported() {
        let temp = TempDir::new().unwrap();
        let repository = temp.path().join(".localhistory");
        fs::create_dir_all(&repository).unwrap();
        fs::write(repository.join("config.json"), "{ not json").unwrap();

        assert!(matches!(
            RevisionStore::open(temp.path()),
            Err(HistoryError::Json(_))
        ));
    }

    #[test]
    fn test_relabel_collision_keeps_both_files() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let path = temp.path().join("a.txt");
        fs::write(&path, "a").unwrap();

        let mut entry = store.try_create_revision_at(&path, 1).unwrap();
        store.add_label(&mut entry, "v1").unwrap();
        // Same second again: a second, unlabeled copy
        let mut again = store.try_create_revision_at(&path, 1).unwrap();

        let err = store.add_label(&mut again, "v1").unwrap_err();
        assert!(matches!(err, HistoryError::RevisionExists(_)));
        assert!(again.shadow_full_path().exists());
        assert!(entry.shadow_full_path().exists());
    }
}
