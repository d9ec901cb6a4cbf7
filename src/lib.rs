//! # localhistory - Shadow revision history for project files
//!
//! Every time a tracked file is saved, a timestamped copy is written into a
//! parallel repository directory under the project root. Past copies can be
//! listed, labeled, diffed against each other or the live file, and deleted.
//!
//! ## Overview
//!
//! The engine has three parts:
//!
//! - **Filename codec** ([`codec`]): a revision's identity (timestamp,
//!   original file name, optional label) is encoded into the name of the file
//!   holding its content, `{timestamp}${name}` or `{timestamp}${name}${label}`
//! - **Path mapper** ([`path_mapper`]): projects an absolute file path into a
//!   deterministic shadow directory and back, across drive letters and the
//!   legacy layout written by earlier versions
//! - **Revision store** ([`store`]): creates, lists, labels and prunes
//!   revisions, recovering everything from a plain directory scan
//!
//! There is no index or database. The repository can be inspected, copied or
//! repaired with ordinary file tools.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use localhistory::{DiffPair, RevisionStore};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RevisionStore::open("./my_project")?;
//! let file = Path::new("./my_project/src/main.rs");
//!
//! // Called by the editor right before saving
//! store.create_revision(file);
//!
//! for revision in store.list_revisions(file) {
//!     println!("{}", revision.timestamp_and_label());
//! }
//!
//! if let Some(latest) = store.list_revisions(file).first() {
//!     let pair = DiffPair::against_live(latest);
//!     println!("diff {:?} {:?}", pair.left, pair.right);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Repository Layout
//!
//! ```text
//! project/
//! ├── src/main.rs
//! └── .localhistory/
//!     ├── config.json
//!     ├── home/user/project/src/          current layout
//!     │   ├── 1700000000$main.rs
//!     │   └── 1700000500$main.rs$before-refactor
//!     └── src/                            legacy layout
//!         └── 1690000000$main.rs
//! ```
//!
//! ## Logging
//!
//! The library logs through `tracing` and never installs a subscriber.
//! Failures swallowed by [`RevisionStore::create_revision`] and
//! [`RevisionStore::list_revisions`] are reported at `WARN`, skipped and
//! dropped shadow files at `DEBUG`.

pub mod codec;
pub mod error;
pub mod hook;
pub mod path_mapper;
pub mod revision;
pub mod store;
pub mod types;
pub mod utils;

pub use codec::VersionName;
pub use error::{HistoryError, Result};
pub use hook::{DirtyTracker, SaveHook};
pub use path_mapper::{AddressFormat, FsProbe, MemoryProbe, PathMapper, PathProbe, Volume};
pub use revision::RevisionEntry;
pub use store::{RevisionStore, RevisionStoreBuilder};
pub use types::{DiffPair, HistoryConfig, ListOptions, ListOrder, PruneStats, RepositoryStats};
