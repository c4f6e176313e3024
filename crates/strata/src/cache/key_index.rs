//! Module: cache::key_index
//! Responsibility: the persisted map from repository identity to the
//! cache entries written for it, used when the store cannot tag.
//! Does not own: the cached values themselves.

use crate::traits::KeyIndex;
use std::{
    cell::RefCell,
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};
use tracing::warn;

///
/// MemoryKeyIndex
///

#[derive(Clone, Debug, Default)]
pub struct MemoryKeyIndex {
    entries: Rc<RefCell<BTreeMap<String, Vec<String>>>>,
}

impl MemoryKeyIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyIndex for MemoryKeyIndex {
    fn get(&self, repository_id: &str) -> Vec<String> {
        self.entries
            .borrow()
            .get(repository_id)
            .cloned()
            .unwrap_or_default()
    }

    fn append(&self, repository_id: &str, entry: &str) {
        let mut entries = self.entries.borrow_mut();
        let list = entries.entry(repository_id.to_string()).or_default();
        if !list.iter().any(|existing| existing == entry) {
            list.push(entry.to_string());
        }
    }

    fn clear(&self, repository_id: &str) -> Vec<String> {
        self.entries
            .borrow_mut()
            .remove(repository_id)
            .unwrap_or_default()
    }
}

///
/// FileKeyIndex
///
/// JSON file holding `{ repository_id: ["method.hash", ..] }`. Every
/// operation is a full read-modify-write of the file; IO failures are
/// logged and treated as an empty index rather than surfaced, since a
/// lost index only means over-retention until the next flush.
///

#[derive(Clone, Debug)]
pub struct FileKeyIndex {
    path: PathBuf,
}

impl FileKeyIndex {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, Vec<String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "cache key index unreadable");
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(path = %self.path.display(), %err, "cache key index corrupt");
            BTreeMap::new()
        })
    }

    fn save(&self, entries: &BTreeMap<String, Vec<String>>) {
        let payload = match serde_json::to_string(entries) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "cache key index not serializable");
                return;
            }
        };

        if let Err(err) = fs::write(&self.path, payload) {
            warn!(path = %self.path.display(), %err, "cache key index not writable");
        }
    }
}

impl KeyIndex for FileKeyIndex {
    fn get(&self, repository_id: &str) -> Vec<String> {
        self.load().get(repository_id).cloned().unwrap_or_default()
    }

    fn append(&self, repository_id: &str, entry: &str) {
        let mut entries = self.load();
        let list = entries.entry(repository_id.to_string()).or_default();
        if !list.iter().any(|existing| existing == entry) {
            list.push(entry.to_string());
            self.save(&entries);
        }
    }

    fn clear(&self, repository_id: &str) -> Vec<String> {
        let mut entries = self.load();
        let removed = entries.remove(repository_id).unwrap_or_default();
        if !removed.is_empty() {
            self.save(&entries);
        }

        removed
    }
}
