use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ChangesetId;
use crate::error::FsError;
use crate::file::File;

/// A delta between two states of a collection's file tree.
///
/// Invariant: within one changeset, a path appears at most once across
/// `files_created`, `files_updated`, and `files_deleted` combined. This
/// supersedes the original implementation's documented "double update"
/// bug (see `DESIGN.md`) by rejecting such changesets outright in
/// [`Changeset::validate`] rather than silently applying both updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Changeset {
    pub id: ChangesetId,
    pub parent: ChangesetId,
    pub created: DateTime<Utc>,
    pub files_created: Vec<File>,
    pub files_updated: Vec<File>,
    pub files_deleted: Vec<String>,
}

impl Changeset {
    /// Checks the "each path touched at most once" invariant.
    pub fn validate(&self) -> Result<(), FsError> {
        let mut seen = HashSet::new();
        let paths = self
            .files_created
            .iter()
            .map(|f| f.path.as_str())
            .chain(self.files_updated.iter().map(|f| f.path.as_str()))
            .chain(self.files_deleted.iter().map(|p| p.as_str()));

        for path in paths {
            if !seen.insert(path) {
                return Err(FsError::DuplicatePathInChangeset {
                    changeset_id: self.id.clone(),
                    path: path.to_string(),
                });
            }
        }
        Ok(())
    }
}
