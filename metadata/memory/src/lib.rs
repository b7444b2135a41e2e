//! A `HashMap`-backed [`MetadataPort`]. Collection keys are generated on
//! first use and wrapped for the node's own key, so the same envelope path
//! a multi-recipient deployment uses also exercises single-node setups.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rsa::{RsaPrivateKey, RsaPublicKey};
use varasto_crypto::{decrypt_envelope, encrypt_envelope, BlobRef, KeyEnvelope};
use varasto_disk::{BlobMeta, DiskError, MetadataPort, VolumeId};

/// `BlobMeta` as kept at rest: identical to the wire type except the
/// symmetric key is never present, mirroring the `#[serde(skip)]` on
/// `BlobMeta::encryption_key`.
#[derive(Debug, Clone)]
struct StoredBlobMeta {
    ref_: BlobRef,
    expected_crc32: u32,
    size_on_disk: u64,
    size: u64,
    is_compressed: bool,
    volumes: std::collections::BTreeSet<VolumeId>,
    encryption_key_id: String,
}

impl From<BlobMeta> for StoredBlobMeta {
    fn from(meta: BlobMeta) -> Self {
        Self {
            ref_: meta.ref_,
            expected_crc32: meta.expected_crc32,
            size_on_disk: meta.size_on_disk,
            size: meta.size,
            is_compressed: meta.is_compressed,
            volumes: meta.volumes,
            encryption_key_id: meta.encryption_key_id,
        }
    }
}

#[derive(Debug)]
pub struct InMemoryMetadataPort {
    node_private_key: RsaPrivateKey,
    node_public_key: RsaPublicKey,
    blobs: Mutex<HashMap<String, StoredBlobMeta>>,
    collection_keys: Mutex<HashMap<String, ([u8; 32], KeyEnvelope)>>,
}

impl InMemoryMetadataPort {
    pub fn new(node_private_key: RsaPrivateKey) -> Self {
        let node_public_key = RsaPublicKey::from(&node_private_key);
        Self {
            node_private_key,
            node_public_key,
            blobs: Mutex::new(HashMap::new()),
            collection_keys: Mutex::new(HashMap::new()),
        }
    }

    /// The envelope a caller needs in order to later `Fetch` blobs
    /// belonging to `collection_id`. `None` until at least one blob has
    /// been written to that collection.
    pub fn collection_envelope(&self, collection_id: &str) -> Option<KeyEnvelope> {
        self.collection_keys
            .lock()
            .expect("metadata lock poisoned")
            .get(collection_id)
            .map(|(_, envelope)| envelope.clone())
    }
}

#[async_trait]
impl MetadataPort for InMemoryMetadataPort {
    async fn query_blob_exists(&self, ref_: BlobRef) -> Result<bool, DiskError> {
        Ok(self
            .blobs
            .lock()
            .expect("metadata lock poisoned")
            .contains_key(&ref_.as_hex()))
    }

    async fn query_collection_encryption_key_for_new_blobs(
        &self,
        collection_id: &str,
    ) -> Result<(String, [u8; 32]), DiskError> {
        let mut collections = self.collection_keys.lock().expect("metadata lock poisoned");
        if let Some((key, _)) = collections.get(collection_id) {
            return Ok((collection_id.to_string(), *key));
        }

        let mut key = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut key);
        let envelope = encrypt_envelope(collection_id, &key, &[self.node_public_key.clone()])
            .map_err(|e| DiskError::Metadata(e.into()))?;
        collections.insert(collection_id.to_string(), (key, envelope));
        Ok((collection_id.to_string(), key))
    }

    async fn query_blob_crc32(&self, ref_: BlobRef) -> Result<u32, DiskError> {
        self.blobs
            .lock()
            .expect("metadata lock poisoned")
            .get(&ref_.as_hex())
            .map(|meta| meta.expected_crc32)
            .ok_or(DiskError::NotFound(ref_))
    }

    async fn query_blob_metadata(
        &self,
        ref_: BlobRef,
        envelopes: &[KeyEnvelope],
    ) -> Result<BlobMeta, DiskError> {
        let stored = self
            .blobs
            .lock()
            .expect("metadata lock poisoned")
            .get(&ref_.as_hex())
            .cloned()
            .ok_or(DiskError::NotFound(ref_))?;

        let envelope = envelopes
            .iter()
            .find(|e| e.key_id == stored.encryption_key_id)
            .ok_or(DiskError::NotFound(ref_))?;
        let encryption_key = decrypt_envelope(envelope, &self.node_private_key)
            .map_err(|e| DiskError::Metadata(e.into()))?;

        Ok(BlobMeta {
            ref_: stored.ref_,
            expected_crc32: stored.expected_crc32,
            size_on_disk: stored.size_on_disk,
            size: stored.size,
            is_compressed: stored.is_compressed,
            volumes: stored.volumes,
            encryption_key_id: stored.encryption_key_id,
            encryption_key,
        })
    }

    async fn write_blob_created(&self, meta: BlobMeta) -> Result<(), DiskError> {
        let mut blobs = self.blobs.lock().expect("metadata lock poisoned");
        let key = meta.ref_.as_hex();
        if blobs.contains_key(&key) {
            return Err(DiskError::AlreadyExists(meta.ref_));
        }
        blobs.insert(key, meta.into());
        Ok(())
    }

    async fn write_blob_replicated(&self, ref_: BlobRef, volume_id: VolumeId) -> Result<(), DiskError> {
        let mut blobs = self.blobs.lock().expect("metadata lock poisoned");
        let meta = blobs.get_mut(&ref_.as_hex()).ok_or(DiskError::NotFound(ref_))?;
        meta.volumes.insert(volume_id);
        Ok(())
    }
}
