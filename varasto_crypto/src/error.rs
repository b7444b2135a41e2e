use thiserror::Error;

/// Errors surfaced by [`crate::blob_ref`], [`crate::envelope`], and
/// [`crate::verify`]. Kept separate from `varasto_disk::DiskError`, which
/// wraps these variants alongside I/O and metadata-port failures.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid blob ref: expected 64 hex characters, got {0}")]
    WrongLength(usize),

    #[error("invalid blob ref: non-hex character in input")]
    InvalidHex,

    #[error("digest mismatch")]
    DigestMismatch,

    #[error("no envelope slot could be unwrapped with the given key")]
    NoMatchingSlot,

    #[error("failed to decrypt envelope slot: {0}")]
    DecryptFailure(String),
}
