use thiserror::Error;

use crate::ChangesetId;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("changeset not found: {0}")]
    ChangesetNotFound(ChangesetId),

    #[error("path {path:?} appears more than once within changeset {changeset_id}")]
    DuplicatePathInChangeset {
        changeset_id: ChangesetId,
        path: String,
    },

    #[error("changeset {changeset_id} has parent {parent:?}, which is not the current head {head:?}")]
    NotLinearDescendantOfHead {
        changeset_id: ChangesetId,
        parent: ChangesetId,
        head: ChangesetId,
    },
}
