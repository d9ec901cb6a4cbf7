//! Mapping between the project tree and the shadow tree
//!
//! Every tracked file has a shadow directory under the repository root where
//! its revisions are stored. Two address formats exist:
//!
//! - **Current**: the volume designator of the file's parent directory is
//!   turned into a plain path segment and the full remainder is nested under
//!   the repository root. `C:\proj\src\a.txt` lands in
//!   `<repository>/C/proj/src`, so `C:` and `D:` never collide. POSIX paths
//!   have no drive and contribute only their segments.
//! - **Legacy**: the project-root prefix of the parent directory is replaced by
//!   the repository root, so `C:\proj\src\a.txt` lands in `<repository>/src`.
//!
//! Repositories written by older versions contain legacy directories, newer
//! ones current directories, and many contain both. Reverse resolution runs an
//! ordered chain of resolvers (current first, then legacy) and accepts the
//! first candidate whose original file exists right now.
//!
//! Paths are normalized lexically before any comparison: separators are
//! unified to `/`, `.` and `..` are resolved, relative paths are anchored at
//! the working directory, and drive letters are upper-cased. All comparisons
//! ignore case.
//!
//! ## Examples
//!
//! ```rust
//! use localhistory::path_mapper::{MemoryProbe, PathMapper, Volume};
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! let probe = MemoryProbe::new()
//!     .with_volume(Volume::Drive('C'))
//!     .with_file(r"C:\proj\src\a.txt");
//! let mapper = PathMapper::new(r"C:\proj", r"C:\proj\.localhistory")
//!     .with_probe(Arc::new(probe));
//!
//! let shadow = mapper.shadow_dir_for(Path::new(r"C:\proj\src\a.txt")).unwrap();
//! assert_eq!(shadow, PathBuf::from("C:/proj/.localhistory/C/proj/src"));
//!
//! let (original, _format) = mapper.original_path_for(&shadow, "a.txt").unwrap();
//! assert_eq!(original, PathBuf::from("C:/proj/src/a.txt"));
//! ```

use crate::error::{HistoryError, Result};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Name of the repository directory created under the project root
pub const DEFAULT_REPOSITORY_DIR: &str = ".localhistory";

/// Volume designator at the head of an absolute path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Volume {
    /// Drive letter, stored upper-case
    Drive(char),
    /// POSIX-style root `/`
    Root,
}

impl Volume {
    /// Path segment this volume contributes to a current-format shadow path
    fn segment(self) -> Option<String> {
        match self {
            Volume::Drive(letter) => Some(letter.to_string()),
            Volume::Root => None,
        }
    }

    /// Read a drive back from a shadow path segment
    fn from_segment(segment: &str) -> Option<Volume> {
        let mut chars = segment.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) if letter.is_ascii_alphabetic() => {
                Some(Volume::Drive(letter.to_ascii_uppercase()))
            }
            _ => None,
        }
    }
}

/// Shadow address format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFormat {
    /// Drive-letter-preserving layout
    Current,
    /// Project-root substitution layout written by earlier versions
    Legacy,
}

impl fmt::Display for AddressFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFormat::Current => f.write_str("current"),
            AddressFormat::Legacy => f.write_str("legacy"),
        }
    }
}

/// Filesystem questions the mapper needs answered
///
/// Resolution is only allowed to report an original path that exists, so the
/// mapper asks a probe instead of touching the filesystem directly. This lets
/// hosts (and tests) exercise foreign path conventions, such as drive letters
/// on a POSIX machine.
pub trait PathProbe: Send + Sync + fmt::Debug {
    /// Whether the volume is present on this host
    fn volume_exists(&self, volume: Volume) -> bool;

    /// Whether `path` names an existing regular file
    fn file_exists(&self, path: &Path) -> bool;
}

/// Probe backed by the real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn volume_exists(&self, volume: Volume) -> bool {
        match volume {
            Volume::Drive(letter) => cfg!(windows) && Path::new(&format!("{letter}:/")).is_dir(),
            Volume::Root => cfg!(not(windows)),
        }
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-memory probe with a fixed set of volumes and files
#[derive(Debug, Default, Clone)]
pub struct MemoryProbe {
    volumes: HashSet<Volume>,
    files: HashSet<String>,
}

impl MemoryProbe {
    /// Empty probe: no volumes, no files
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a volume as present
    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.volumes.insert(volume);
        self
    }

    /// Declare a file as present
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.files.insert(NormalizedPath::parse(path.as_ref()).key());
        self
    }
}

impl PathProbe for MemoryProbe {
    fn volume_exists(&self, volume: Volume) -> bool {
        self.volumes.contains(&volume)
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files.contains(&NormalizedPath::parse(path).key())
    }
}

/// Compare two strings ignoring case, without allocating
/// Per-character lower-casing shared by every case-insensitive comparison
pub(crate) fn fold_case(value: &str) -> String {
    value.chars().flat_map(char::to_lowercase).collect()
}

pub(crate) fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Lexically normalized absolute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NormalizedPath {
    volume: Volume,
    segments: Vec<String>,
}

impl NormalizedPath {
    fn empty(volume: Volume) -> Self {
        Self {
            volume,
            segments: Vec::new(),
        }
    }

    pub(crate) fn parse(path: &Path) -> Self {
        let raw = path.to_string_lossy().replace('\\', "/");
        match split_volume(&raw) {
            (Some(volume), rest) => Self::empty(volume).push_components(rest),
            (None, rest) => Self::working_dir().push_components(rest),
        }
    }

    fn working_dir() -> Self {
        std::env::current_dir()
            .ok()
            .and_then(|cwd| {
                let raw = cwd.to_string_lossy().replace('\\', "/");
                match split_volume(&raw) {
                    (Some(volume), rest) => Some(Self::empty(volume).push_components(rest)),
                    (None, _) => None,
                }
            })
            .unwrap_or_else(|| Self::empty(Volume::Root))
    }

    fn push_components(mut self, rest: &str) -> Self {
        for component in rest.split('/') {
            match component {
                "" | "." => {}
                ".." => {
                    self.segments.pop();
                }
                other => self.segments.push(other.to_string()),
            }
        }
        self
    }

    pub(crate) fn to_path_buf(&self) -> PathBuf {
        let tail = self.segments.join("/");
        match self.volume {
            Volume::Drive(letter) => PathBuf::from(format!("{letter}:/{tail}")),
            Volume::Root => PathBuf::from(format!("/{tail}")),
        }
    }

    pub(crate) fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    fn parent(&self) -> Option<Self> {
        let (_, init) = self.segments.split_last()?;
        Some(Self {
            volume: self.volume,
            segments: init.to_vec(),
        })
    }

    fn join(&self, segment: &str) -> Self {
        let mut joined = self.clone();
        joined.segments.push(segment.to_string());
        joined
    }

    fn join_all(&self, segments: &[String]) -> Self {
        let mut joined = self.clone();
        joined.segments.extend_from_slice(segments);
        joined
    }

    fn strip_prefix(&self, base: &NormalizedPath) -> Option<&[String]> {
        if self.volume != base.volume || self.segments.len() < base.segments.len() {
            return None;
        }
        let matches = self
            .segments
            .iter()
            .zip(&base.segments)
            .all(|(a, b)| eq_ignore_case(a, b));
        matches.then(|| &self.segments[base.segments.len()..])
    }

    fn starts_with(&self, base: &NormalizedPath) -> bool {
        self.strip_prefix(base).is_some()
    }

    fn same_as(&self, other: &NormalizedPath) -> bool {
        self.segments.len() == other.segments.len() && self.starts_with(other)
    }

    /// Case-folded string form, used as a lookup key
    fn key(&self) -> String {
        fold_case(&self.to_path_buf().to_string_lossy())
    }
}

fn split_volume(raw: &str) -> (Option<Volume>, &str) {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let letter = (bytes[0] as char).to_ascii_uppercase();
        (Some(Volume::Drive(letter)), &raw[2..])
    } else if raw.starts_with('/') {
        (Some(Volume::Root), raw)
    } else {
        (None, raw)
    }
}

/// Normalize a path: unify separators, resolve `.`/`..`, anchor relative paths
/// at the working directory and upper-case drive letters
pub fn normalize_path(path: &Path) -> PathBuf {
    NormalizedPath::parse(path).to_path_buf()
}

/// Case-insensitive check that `path` lies under `base` (or is `base`),
/// matching whole segments only
pub fn is_sub_path_of(path: &Path, base: &Path) -> bool {
    NormalizedPath::parse(path).starts_with(&NormalizedPath::parse(base))
}

type Resolver = fn(&PathMapper, &NormalizedPath, &str) -> Option<NormalizedPath>;

/// Resolution chain, tried in order
const RESOLVERS: [(AddressFormat, Resolver); 2] = [
    (AddressFormat::Current, PathMapper::resolve_current),
    (AddressFormat::Legacy, PathMapper::resolve_legacy),
];

/// Translates between original paths and shadow directories
#[derive(Debug, Clone)]
pub struct PathMapper {
    project_root: NormalizedPath,
    repository_root: NormalizedPath,
    probe: Arc<dyn PathProbe>,
}

impl PathMapper {
    /// Create a mapper that checks existence against the real filesystem
    pub fn new(project_root: impl AsRef<Path>, repository_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: NormalizedPath::parse(project_root.as_ref()),
            repository_root: NormalizedPath::parse(repository_root.as_ref()),
            probe: Arc::new(FsProbe),
        }
    }

    /// Replace the existence probe
    pub fn with_probe(mut self, probe: Arc<dyn PathProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Normalized project root
    pub fn project_root(&self) -> PathBuf {
        self.project_root.to_path_buf()
    }

    /// Normalized repository root
    pub fn repository_root(&self) -> PathBuf {
        self.repository_root.to_path_buf()
    }

    /// Whether `path` is a file location that gets history: strictly under the
    /// project root and outside the repository
    pub fn is_tracked(&self, path: &Path) -> bool {
        let path = NormalizedPath::parse(path);
        path.segments.len() > self.project_root.segments.len()
            && path.starts_with(&self.project_root)
            && !path.starts_with(&self.repository_root)
    }

    /// Whether `path` lies inside the repository root
    pub fn is_in_repository(&self, path: &Path) -> bool {
        NormalizedPath::parse(path).starts_with(&self.repository_root)
    }

    /// Current-format shadow directory for an original file
    ///
    /// Works for any absolute path, including paths on other drives than the
    /// project root.
    pub fn shadow_dir_for(&self, original_file: &Path) -> Result<PathBuf> {
        let original = NormalizedPath::parse(original_file);
        let parent = original.parent().ok_or_else(|| {
            HistoryError::invalid_input(format!("{:?} has no parent directory", original_file))
        })?;

        let mut segments = self.repository_root.segments.clone();
        segments.extend(parent.volume.segment());
        segments.extend(parent.segments);

        Ok(NormalizedPath {
            volume: self.repository_root.volume,
            segments,
        }
        .to_path_buf())
    }

    /// Legacy-format shadow directory, if the file lies under the project root
    pub fn legacy_shadow_dir_for(&self, original_file: &Path) -> Option<PathBuf> {
        let parent = NormalizedPath::parse(original_file).parent()?;
        let rest = parent.strip_prefix(&self.project_root)?;
        Some(self.repository_root.join_all(rest).to_path_buf())
    }

    /// Every distinct shadow directory that may hold revisions of a file,
    /// current format first
    pub fn shadow_dirs_for(&self, original_file: &Path) -> Vec<(AddressFormat, PathBuf)> {
        let mut dirs: Vec<(AddressFormat, NormalizedPath)> = Vec::with_capacity(2);

        if let Ok(current) = self.shadow_dir_for(original_file) {
            dirs.push((AddressFormat::Current, NormalizedPath::parse(&current)));
        }
        if let Some(legacy) = self.legacy_shadow_dir_for(original_file) {
            let legacy = NormalizedPath::parse(&legacy);
            if !dirs.iter().any(|(_, dir)| dir.same_as(&legacy)) {
                dirs.push((AddressFormat::Legacy, legacy));
            }
        }

        dirs.into_iter()
            .map(|(format, dir)| (format, dir.to_path_buf()))
            .collect()
    }

    /// Resolve the live original of `file_name` stored in `shadow_dir`
    ///
    /// Tries each address format in order and returns the first candidate
    /// that exists, together with the format that produced it.
    pub fn original_path_for(
        &self,
        shadow_dir: &Path,
        file_name: &str,
    ) -> Option<(PathBuf, AddressFormat)> {
        let shadow = NormalizedPath::parse(shadow_dir);
        RESOLVERS.iter().find_map(|(format, resolve)| {
            let resolved = resolve(self, &shadow, file_name);
            trace!(
                "{} resolution of {:?} in {:?}: {:?}",
                format,
                file_name,
                shadow_dir,
                resolved
            );
            resolved.map(|path| (path.to_path_buf(), *format))
        })
    }

    /// Resolve with a single address format
    pub fn resolve_with(
        &self,
        format: AddressFormat,
        shadow_dir: &Path,
        file_name: &str,
    ) -> Option<PathBuf> {
        let shadow = NormalizedPath::parse(shadow_dir);
        let resolved = match format {
            AddressFormat::Current => self.resolve_current(&shadow, file_name),
            AddressFormat::Legacy => self.resolve_legacy(&shadow, file_name),
        };
        resolved.map(|path| path.to_path_buf())
    }

    fn resolve_current(&self, shadow: &NormalizedPath, file_name: &str) -> Option<NormalizedPath> {
        let rest = shadow.strip_prefix(&self.repository_root)?;

        let mut candidates = Vec::with_capacity(2);
        if let Some((first, tail)) = rest.split_first() {
            if let Some(drive) = Volume::from_segment(first) {
                if self.probe.volume_exists(drive) {
                    candidates.push(NormalizedPath::empty(drive).join_all(tail));
                }
            }
        }
        if self.probe.volume_exists(Volume::Root) {
            candidates.push(NormalizedPath::empty(Volume::Root).join_all(rest));
        }

        candidates
            .into_iter()
            .map(|dir| dir.join(file_name))
            .find(|candidate| self.probe.file_exists(&candidate.to_path_buf()))
    }

    fn resolve_legacy(&self, shadow: &NormalizedPath, file_name: &str) -> Option<NormalizedPath> {
        let rest = shadow.strip_prefix(&self.repository_root)?;
        let candidate = self.project_root.join_all(rest).join(file_name);
        self.probe
            .file_exists(&candidate.to_path_buf())
            .then_some(candidate)
    }
}
