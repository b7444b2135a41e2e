use std::collections::BTreeMap;

use crate::file::File;

/// A fully materialized file tree at some revision, as folded by
/// [`crate::collection::Collection::compute_state_at`].
#[derive(Debug, Clone, Default)]
pub struct StateAtPoint {
    files: BTreeMap<String, File>,
}

impl StateAtPoint {
    pub fn empty() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, file: File) {
        self.files.insert(file.path.clone(), file);
    }

    pub(crate) fn remove(&mut self, path: &str) {
        self.files.remove(path);
    }

    pub fn get(&self, path: &str) -> Option<&File> {
        self.files.get(path)
    }

    /// Files sorted lexicographically by path, for reproducible listings.
    /// `BTreeMap` already maintains this order, so this is a plain
    /// iteration rather than a sort.
    pub fn file_list(&self) -> Vec<File> {
        self.files.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
