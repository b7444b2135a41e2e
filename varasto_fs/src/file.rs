use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use varasto_crypto::BlobRef;

/// A file as it exists at some revision: whole-file digest plus the
/// ordered list of blobs that, concatenated, reproduce its contents.
///
/// Invariant: `blob_refs` is non-empty iff `size > 0`; every blob except
/// possibly the last is exactly `varasto_crypto::BLOB_SIZE` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub path: String,
    /// SHA-256 of the whole file (all blobs concatenated), as hex.
    pub sha256: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub blob_refs: Vec<BlobRef>,
}

impl File {
    /// The directory containing this file's path, `"."` for top-level
    /// files. Mirrors `path::Path::parent()` but always yields `"."`
    /// instead of an empty string for root-level files, matching the
    /// convention `dir_peek` expects.
    pub fn parent_dir(&self) -> String {
        match self.path.rsplit_once('/') {
            Some((dir, _name)) => dir.to_string(),
            None => ".".to_string(),
        }
    }
}
