//! Editor-side save hook
//!
//! Hosts report two events: a document's dirty flag changed, and a document
//! is about to be saved. [`SaveHook`] turns the second into a call to
//! [`RevisionStore::create_revision`], honoring the `create_only_if_dirty`
//! setting: with it enabled, only documents that were modified since their
//! last save get a revision, and the dirty mark is consumed by the save.
//!
//! ```rust,no_run
//! use localhistory::{RevisionStore, SaveHook};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RevisionStore::open("/home/user/project")?);
//! let hook: SaveHook<u32> = SaveHook::new(store);
//!
//! hook.on_dirty_changed(7, true);
//! hook.on_before_save(&7, Path::new("/home/user/project/src/main.rs"));
//! # Ok(())
//! # }
//! ```

use crate::revision::RevisionEntry;
use crate::store::RevisionStore;
use dashmap::DashSet;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Set of documents with unsaved changes
///
/// Safe to update from several threads at once.
#[derive(Debug)]
pub struct DirtyTracker<K: Eq + Hash> {
    dirty: DashSet<K>,
}

impl<K: Eq + Hash> Default for DirtyTracker<K> {
    fn default() -> Self {
        Self {
            dirty: DashSet::new(),
        }
    }
}

impl<K: Eq + Hash> DirtyTracker<K> {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the dirty flag of a document
    pub fn set_dirty(&self, doc: K, dirty: bool) {
        if dirty {
            self.dirty.insert(doc);
        } else {
            self.dirty.remove(&doc);
        }
    }

    /// Whether the document has unsaved changes
    pub fn is_dirty(&self, doc: &K) -> bool {
        self.dirty.contains(doc)
    }

    /// Clear the mark, returning whether it was set
    pub fn take(&self, doc: &K) -> bool {
        self.dirty.remove(doc).is_some()
    }

    /// Number of dirty documents
    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    /// Whether no document is dirty
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }
}

/// Creates revisions when the host saves documents
#[derive(Debug)]
pub struct SaveHook<K: Eq + Hash> {
    store: Arc<RevisionStore>,
    tracker: DirtyTracker<K>,
}

impl<K: Eq + Hash + std::fmt::Debug> SaveHook<K> {
    /// Create a hook writing into `store`
    pub fn new(store: Arc<RevisionStore>) -> Self {
        Self {
            store,
            tracker: DirtyTracker::new(),
        }
    }

    /// Store the hook writes into
    pub fn store(&self) -> &Arc<RevisionStore> {
        &self.store
    }

    /// Dirty documents seen so far
    pub fn tracker(&self) -> &DirtyTracker<K> {
        &self.tracker
    }

    /// The host reports a change of the document's dirty flag
    pub fn on_dirty_changed(&self, doc: K, dirty: bool) {
        if !self.store.config().create_only_if_dirty {
            return;
        }
        trace!("Document {:?} dirty: {}", doc, dirty);
        self.tracker.set_dirty(doc, dirty);
    }

    /// The host is about to save `doc` to `path`
    ///
    /// Returns the revision that was created, if any.
    pub fn on_before_save(&self, doc: &K, path: &Path) -> Option<RevisionEntry> {
        if self.store.config().create_only_if_dirty && !self.tracker.take(doc) {
            debug!("{:?} is not dirty, no revision created", path);
            return None;
        }
        if !self.store.is_tracked(path) {
            trace!("{:?} is not tracked", path);
            return None;
        }

        debug!("Creating revision for {:?}", path);
        self.store.create_revision(path)
    }

    /// The host closed the document
    pub fn on_closed(&self, doc: &K) {
        self.tracker.take(doc);
    }
}
