//! Property-based testing for localhistory
//!
//! Uses proptest to check the codec, revision identity and path mapping
//! invariants across generated names, labels and paths.

use ::localhistory::codec::{self, VersionName};
use ::localhistory::*;
use proptest::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Original file names without the delimiter
fn file_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}\\.(txt|rs|md)",
        "[A-Za-z0-9_. -]{1,20}",
        "[a-z]{1,5}\\.[a-z]{1,3}\\.[a-z]{1,3}",
    ]
}

/// Labels that pass validation, lower case so case-insensitive filesystems
/// see distinct labels as distinct files
fn label_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9_. -]{0,15}[a-z0-9]"
}

/// Directory segments usable on every platform
fn segments_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z][a-z0-9_]{1,8}", 0..5)
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Decoding an encoded name gives back its parts
    #[test]
    fn codec_round_trip(
        timestamp in any::<i64>(),
        name in file_name_strategy(),
        label in prop::option::of(label_strategy()),
    ) {
        let encoded = codec::encode(timestamp, &name, label.as_deref());
        let decoded = codec::decode(&encoded).unwrap();
        prop_assert_eq!(&decoded, &VersionName { timestamp, original_file_name: name, label });
        prop_assert_eq!(decoded.encode(), encoded);
    }

    /// Anything with four or more segments is rejected
    #[test]
    fn too_many_segments_is_malformed(
        parts in prop::collection::vec("[a-z0-9]{0,6}", 4..8)
    ) {
        let name = parts.join("$");
        prop_assert!(codec::decode(&name).is_err());
    }

    /// Every accepted name re-encodes byte for byte
    #[test]
    fn decode_is_canonical(raw in "[0-9+-]{1,4}\\$[a-z]{0,3}(\\$[a-z]{0,3})?") {
        if let Ok(decoded) = codec::decode(&raw) {
            prop_assert_eq!(decoded.encode(), raw);
        }
    }

    /// Label and repository location do not change identity
    #[test]
    fn identity_ignores_label_and_repository(
        timestamp in any::<i64>(),
        name in file_name_strategy(),
        label in label_strategy(),
    ) {
        let original = PathBuf::from("/proj/src").join(&name);
        let a = RevisionEntry::new("/repo/proj/src", &original, name.clone(), timestamp, None);
        let b = RevisionEntry::new("/repo/src", &original, name.to_uppercase(), timestamp, Some(label))
            .with_format(AddressFormat::Legacy);

        prop_assert_eq!(&a, &b);
        prop_assert_eq!(hash_of(&a), hash_of(&b));
    }

    /// POSIX paths map into the repository and resolve back
    #[test]
    fn posix_mapping_round_trip(
        segments in segments_strategy(),
        name in "[a-z]{1,8}\\.txt",
    ) {
        let mut original = PathBuf::from("/proj");
        for segment in &segments {
            original.push(segment);
        }
        original.push(&name);

        let probe = MemoryProbe::new().with_volume(Volume::Root).with_file(&original);
        let mapper = PathMapper::new("/proj", "/proj/.localhistory").with_probe(Arc::new(probe));

        let shadow = mapper.shadow_dir_for(&original).unwrap();
        prop_assert!(shadow.starts_with("/proj/.localhistory"));

        let (resolved, format) = mapper.original_path_for(&shadow, &name).unwrap();
        prop_assert_eq!(resolved, original);
        prop_assert_eq!(format, AddressFormat::Current);
    }

    /// Drive-letter paths keep their drive and never collide across drives
    #[test]
    fn drive_mapping_round_trip(
        drive in proptest::char::range('A', 'Z'),
        other in proptest::char::range('A', 'Z'),
        segments in segments_strategy(),
        name in "[a-z]{1,8}\\.txt",
    ) {
        let tail: String = segments.iter().map(|s| format!("{s}/")).collect();
        let original = format!("{drive}:/{tail}{name}");

        let probe = MemoryProbe::new()
            .with_volume(Volume::Drive(drive))
            .with_file(&original);
        let mapper = PathMapper::new("C:/proj", "C:/proj/.localhistory").with_probe(Arc::new(probe));

        let shadow = mapper.shadow_dir_for(Path::new(&original)).unwrap();
        let (resolved, _) = mapper.original_path_for(&shadow, &name).unwrap();
        prop_assert_eq!(resolved, PathBuf::from(&original));

        if other != drive {
            let moved = format!("{other}:/{tail}{name}");
            prop_assert_ne!(mapper.shadow_dir_for(Path::new(&moved)).unwrap(), shadow);
        }
    }

    /// Normalization is idempotent
    #[test]
    fn normalize_is_idempotent(
        segments in prop::collection::vec(prop_oneof!["[a-z]{1,5}", Just(".".to_string()), Just("..".to_string())], 0..8),
        backslash in any::<bool>(),
    ) {
        let separator = if backslash { "\\" } else { "/" };
        let raw = format!("C:{separator}{}", segments.join(separator));
        let once = path_mapper::normalize_path(Path::new(&raw));
        let twice = path_mapper::normalize_path(&once);
        prop_assert_eq!(&once, &twice);
        prop_assert!(!once.to_string_lossy().contains('\\'));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(25))]

    /// Labeling and unlabeling restores the exact filename
    #[test]
    fn label_round_trip_restores_filename(
        timestamp in 0..2_000_000_000i64,
        labels in prop::collection::vec(label_strategy(), 1..4),
    ) {
        let temp = TempDir::new().unwrap();
        let project = temp.path();
        let file = project.join("doc.txt");
        fs::write(&file, "content").unwrap();

        let store = RevisionStoreBuilder::new()
            .update_gitignore(false)
            .build(project)
            .unwrap();
        let mut entry = store.try_create_revision_at(&file, timestamp).unwrap();
        let original_name = entry.shadow_file_name();

        for label in &labels {
            match store.add_label(&mut entry, label) {
                Ok(()) => prop_assert_eq!(entry.label(), Some(label.trim())),
                Err(HistoryError::LabelUnchanged(_)) => {}
                Err(e) => return Err(TestCaseError::fail(e.to_string())),
            }
            prop_assert!(entry.shadow_full_path().exists());
        }

        store.remove_label(&mut entry).unwrap();
        prop_assert_eq!(entry.shadow_file_name(), original_name);
        prop_assert!(entry.shadow_full_path().exists());
        prop_assert_eq!(store.list_revisions(&file).len(), 1);
    }
}
