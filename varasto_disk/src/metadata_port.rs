//! The narrow slice of the out-of-scope metadata database that the disk
//! access controller needs. Real deployments back this with a
//! transactional store (see `varasto_metadata_redb`); tests and small
//! deployments can use `varasto_metadata_memory`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use varasto_crypto::{BlobRef, KeyEnvelope};

use crate::error::{DiskError, VolumeId};

/// Everything the controller needs to know about one stored blob,
/// independent of which volume(s) currently hold it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMeta {
    pub ref_: BlobRef,
    pub expected_crc32: u32,
    /// Ciphertext size as it sits on a volume.
    pub size_on_disk: u64,
    /// Plaintext size.
    pub size: u64,
    pub is_compressed: bool,
    pub volumes: BTreeSet<VolumeId>,
    pub encryption_key_id: String,
    /// The unwrapped 32-byte symmetric key, populated by
    /// `query_blob_metadata` from one of the caller-supplied envelopes.
    /// Never persisted in this form; callers must not serialize it back
    /// to a metadata store.
    #[serde(skip)]
    pub encryption_key: [u8; 32],
}

/// The controller's view of the metadata database. Implementations are
/// responsible for their own transactional guarantees; the controller
/// assumes `write_blob_created` enforces at-most-once insertion per ref.
#[async_trait]
pub trait MetadataPort: std::fmt::Debug + Send + Sync {
    async fn query_blob_exists(&self, ref_: BlobRef) -> Result<bool, DiskError>;

    /// Returns the key id and raw 32-byte symmetric key new blobs in
    /// `collection_id` should be encrypted with.
    async fn query_collection_encryption_key_for_new_blobs(
        &self,
        collection_id: &str,
    ) -> Result<(String, [u8; 32]), DiskError>;

    async fn query_blob_crc32(&self, ref_: BlobRef) -> Result<u32, DiskError>;

    /// Full metadata for an existing blob, with `encryption_key` unwrapped
    /// using whichever of `envelopes` matches the blob's `encryption_key_id`.
    async fn query_blob_metadata(
        &self,
        ref_: BlobRef,
        envelopes: &[KeyEnvelope],
    ) -> Result<BlobMeta, DiskError>;

    /// Atomically records a newly written blob. Implementations must
    /// reject a second call for the same `meta.ref_` so concurrent
    /// `write_blob` callers racing on the duplicate check still converge
    /// on at-most-one winner.
    async fn write_blob_created(&self, meta: BlobMeta) -> Result<(), DiskError>;

    async fn write_blob_replicated(&self, ref_: BlobRef, volume_id: VolumeId) -> Result<(), DiskError>;
}
