use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use varasto_crypto::{KeyEnvelope, NO_PARENT};

use crate::ChangesetId;
use crate::changeset::Changeset;
use crate::error::FsError;
use crate::state::StateAtPoint;

/// A versioned set of files sharing an encryption context.
///
/// Invariant: `changesets` forms a contiguous linked list with exactly
/// one chain ending at `head`; the first changeset's `parent` is
/// [`NO_PARENT`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub directory_id: String,
    pub name: String,
    pub head: ChangesetId,
    pub changesets: Vec<Changeset>,
    pub encryption_keys: Vec<KeyEnvelope>,
    pub desired_volumes: BTreeSet<i64>,
    pub tags: Vec<String>,
    pub sensitivity: i32,
}

impl Collection {
    /// Creates an empty collection with no changesets and `head ==
    /// NO_PARENT`.
    pub fn new(id: impl Into<String>, directory_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            directory_id: directory_id.into(),
            name: name.into(),
            head: NO_PARENT.to_string(),
            changesets: Vec::new(),
            encryption_keys: Vec::new(),
            desired_volumes: BTreeSet::new(),
            tags: Vec::new(),
            sensitivity: 0,
        }
    }

    /// Appends `changeset` as the new head. `changeset.parent` must equal
    /// the current head, and the changeset must satisfy
    /// [`Changeset::validate`].
    pub fn commit(&mut self, changeset: Changeset) -> Result<(), FsError> {
        changeset.validate()?;

        if changeset.parent != self.head {
            return Err(FsError::NotLinearDescendantOfHead {
                changeset_id: changeset.id.clone(),
                parent: changeset.parent.clone(),
                head: self.head.clone(),
            });
        }

        self.head = changeset.id.clone();
        self.changesets.push(changeset);
        Ok(())
    }

    /// Folds the changeset chain up to and including `changeset_id` into
    /// a materialized file tree.
    ///
    /// `create` inserts a path, last-write-wins if already present
    /// (permissive form). `update` replaces. `delete` removes the path if
    /// present and is a no-op otherwise, tolerating concurrent edits.
    pub fn compute_state_at(&self, changeset_id: &str) -> Result<StateAtPoint, FsError> {
        if changeset_id == self.head && self.head == NO_PARENT {
            return Ok(StateAtPoint::empty());
        }

        if !self.changesets.iter().any(|cs| cs.id == changeset_id) {
            return Err(FsError::ChangesetNotFound(changeset_id.to_string()));
        }

        let mut state = StateAtPoint::empty();

        for changeset in &self.changesets {
            for file in &changeset.files_created {
                state.insert(file.clone());
            }
            for file in &changeset.files_updated {
                state.insert(file.clone());
            }
            for path in &changeset.files_deleted {
                state.remove(path);
            }

            if changeset.id == changeset_id {
                break;
            }
        }

        Ok(state)
    }

    /// Convenience for `compute_state_at(&self.head)`.
    pub fn compute_state_at_head(&self) -> Result<StateAtPoint, FsError> {
        if self.head == NO_PARENT {
            return Ok(StateAtPoint::empty());
        }
        self.compute_state_at(&self.head)
    }
}
