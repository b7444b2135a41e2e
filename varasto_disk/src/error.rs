use thiserror::Error;

use varasto_crypto::{BlobRef, CryptoError};

pub type VolumeId = i32;

/// Errors surfaced by the disk access controller and its volume drivers.
#[derive(Debug, Error)]
pub enum DiskError {
    #[error("invalid blob ref")]
    InvalidBlobRef(#[from] CryptoError),

    #[error("volume {0} not found")]
    VolumeNotFound(VolumeId),

    #[error("already exists: {0}")]
    AlreadyExists(BlobRef),

    #[error("not found: {0}")]
    NotFound(BlobRef),

    #[error("digest mismatch")]
    DigestMismatch,

    #[error("driver error: {0}")]
    DriverTransient(#[source] anyhow::Error),

    #[error("metadata port error: {0}")]
    Metadata(#[source] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DiskError {
    /// Translates the integrity failures raised inline by the streaming
    /// verifiers in `varasto_crypto::verify` (surfaced as
    /// `io::ErrorKind::InvalidData` wrapping a `CryptoError`) into the
    /// controller's own error type, matching the teacher's convention of
    /// narrowing generic I/O errors at crate boundaries.
    pub fn from_stream_io(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::InvalidData
            && err.get_ref().map(|e| e.is::<CryptoError>()).unwrap_or(false)
        {
            return DiskError::DigestMismatch;
        }
        DiskError::Io(err)
    }
}
