//! The state resolver: folds a [`Collection`]'s linear changeset chain
//! into a materialized file tree at any revision, and offers a
//! single-traversal [`dir_peek::dir_peek`] view for UI/FUSE-style
//! directory listings without building a tree structure.

pub mod changeset;
pub mod collection;
pub mod dir_peek;
pub mod error;
pub mod file;
pub mod state;

pub use changeset::Changeset;
pub use collection::Collection;
pub use dir_peek::{DirPeek, dir_peek};
pub use error::FsError;
pub use file::File;
pub use state::StateAtPoint;

pub use varasto_crypto::NO_PARENT;

/// A changeset identifier within a collection's chain.
pub type ChangesetId = String;
