//! A [`redb`](https://docs.rs/redb)-backed [`MetadataPort`]. Blob records
//! and per-collection key envelopes live in separate tables; both are
//! plain bytes on disk, so the symmetric key for a collection never
//! touches storage unwrapped.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use varasto_crypto::{decrypt_envelope, encrypt_envelope, BlobRef, KeyEnvelope};
use varasto_disk::{BlobMeta, DiskError, MetadataPort, VolumeId};

const BLOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("blobs");
const COLLECTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("collection_key_envelopes");

#[derive(Debug, Serialize, Deserialize, Clone)]
struct StoredBlobMeta {
    ref_hex: String,
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
            ref_hex: meta.ref_.as_hex(),
            expected_crc32: meta.expected_crc32,
            size_on_disk: meta.size_on_disk,
            size: meta.size,
            is_compressed: meta.is_compressed,
            volumes: meta.volumes,
            encryption_key_id: meta.encryption_key_id,
        }
    }
}

#[derive(Clone)]
pub struct RedbMetadataPort {
    db: Arc<Database>,
    node_private_key: Arc<RsaPrivateKey>,
    node_public_key: RsaPublicKey,
}

impl std::fmt::Debug for RedbMetadataPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbMetadataPort").finish()
    }
}

impl RedbMetadataPort {
    pub fn open<P: AsRef<Path>>(path: P, node_private_key: RsaPrivateKey) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let db = Database::create(path.join("metadata.redb"))?;

        {
            let write_txn = db.begin_write()?;
            {
                let _ = write_txn.open_table(BLOBS)?;
                let _ = write_txn.open_table(COLLECTIONS)?;
            }
            write_txn.commit()?;
        }

        let node_public_key = RsaPublicKey::from(&node_private_key);
        Ok(Self {
            db: Arc::new(db),
            node_private_key: Arc::new(node_private_key),
            node_public_key,
        })
    }
}

#[async_trait]
impl MetadataPort for RedbMetadataPort {
    async fn query_blob_exists(&self, ref_: BlobRef) -> Result<bool, DiskError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(BLOBS)?;
            Ok(table.get(ref_.as_hex().as_str())?.is_some())
        })
        .await
        .map_err(|e| DiskError::Metadata(anyhow::anyhow!("redb read task failed: {e}")))?
        .map_err(DiskError::Metadata)
    }

    async fn query_collection_encryption_key_for_new_blobs(
        &self,
        collection_id: &str,
    ) -> Result<(String, [u8; 32]), DiskError> {
        let db = self.db.clone();
        let node_public_key = self.node_public_key.clone();
        let collection_id = collection_id.to_string();

        let envelope = {
            let db = db.clone();
            let collection_id = collection_id.clone();
            tokio::task::spawn_blocking(move || -> anyhow::Result<Option<KeyEnvelope>> {
                let read_txn = db.begin_read()?;
                let table = read_txn.open_table(COLLECTIONS)?;
                table
                    .get(collection_id.as_str())?
                    .map(|guard| serde_json::from_slice(guard.value()).map_err(anyhow::Error::from))
                    .transpose()
            })
            .await
            .map_err(|e| DiskError::Metadata(anyhow::anyhow!("redb read task failed: {e}")))?
            .map_err(DiskError::Metadata)?
        };

        let envelope = match envelope {
            Some(envelope) => envelope,
            None => {
                let mut key = [0u8; 32];
                rand::Rng::fill(&mut rand::thread_rng(), &mut key);
                let envelope = encrypt_envelope(collection_id.clone(), &key, &[node_public_key])
                    .map_err(|e| DiskError::Metadata(e.into()))?;

                let serialized =
                    serde_json::to_vec(&envelope).map_err(|e| DiskError::Metadata(e.into()))?;
                let write_collection_id = collection_id.clone();
                tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
                    let write_txn = db.begin_write()?;
                    {
                        let mut table = write_txn.open_table(COLLECTIONS)?;
                        table.insert(write_collection_id.as_str(), serialized.as_slice())?;
                    }
                    write_txn.commit()?;
                    Ok(())
                })
                .await
                .map_err(|e| DiskError::Metadata(anyhow::anyhow!("redb write task failed: {e}")))?
                .map_err(DiskError::Metadata)?;

                envelope
            }
        };

        let key = decrypt_envelope(&envelope, &self.node_private_key)
            .map_err(|e| DiskError::Metadata(e.into()))?;
        Ok((collection_id, key))
    }

    async fn query_blob_crc32(&self, ref_: BlobRef) -> Result<u32, DiskError> {
        let db = self.db.clone();
        let stored = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<StoredBlobMeta>> {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(BLOBS)?;
            table
                .get(ref_.as_hex().as_str())?
                .map(|guard| serde_json::from_slice(guard.value()).map_err(anyhow::Error::from))
                .transpose()
        })
        .await
        .map_err(|e| DiskError::Metadata(anyhow::anyhow!("redb read task failed: {e}")))?
        .map_err(DiskError::Metadata)?;

        stored.map(|meta| meta.expected_crc32).ok_or(DiskError::NotFound(ref_))
    }

    async fn query_blob_metadata(
        &self,
        ref_: BlobRef,
        envelopes: &[KeyEnvelope],
    ) -> Result<BlobMeta, DiskError> {
        let db = self.db.clone();
        let stored = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<StoredBlobMeta>> {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(BLOBS)?;
            table
                .get(ref_.as_hex().as_str())?
                .map(|guard| serde_json::from_slice(guard.value()).map_err(anyhow::Error::from))
                .transpose()
        })
        .await
        .map_err(|e| DiskError::Metadata(anyhow::anyhow!("redb read task failed: {e}")))?
        .map_err(DiskError::Metadata)?
        .ok_or(DiskError::NotFound(ref_))?;

        let envelope = envelopes
            .iter()
            .find(|e| e.key_id == stored.encryption_key_id)
            .ok_or(DiskError::NotFound(ref_))?;
        let encryption_key = decrypt_envelope(envelope, &self.node_private_key)
            .map_err(|e| DiskError::Metadata(e.into()))?;

        Ok(BlobMeta {
            ref_,
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
        let db = self.db.clone();
        let ref_hex = meta.ref_.as_hex();
        let ref_ = meta.ref_;
        let serialized =
            serde_json::to_vec(&StoredBlobMeta::from(meta)).map_err(|e| DiskError::Metadata(e.into()))?;

        tokio::task::spawn_blocking(move || -> anyhow::Result<Result<(), DiskError>> {
            let write_txn = db.begin_write()?;
            let outcome = {
                let mut table = write_txn.open_table(BLOBS)?;
                if table.get(ref_hex.as_str())?.is_some() {
                    Err(DiskError::AlreadyExists(ref_))
                } else {
                    table.insert(ref_hex.as_str(), serialized.as_slice())?;
                    Ok(())
                }
            };
            write_txn.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(|e| DiskError::Metadata(anyhow::anyhow!("redb write task failed: {e}")))?
        .map_err(DiskError::Metadata)?
    }

    async fn write_blob_replicated(&self, ref_: BlobRef, volume_id: VolumeId) -> Result<(), DiskError> {
        let db = self.db.clone();
        let ref_hex = ref_.as_hex();

        tokio::task::spawn_blocking(move || -> anyhow::Result<Result<(), DiskError>> {
            let write_txn = db.begin_write()?;
            let outcome = {
                let mut table = write_txn.open_table(BLOBS)?;
                let existing = table.get(ref_hex.as_str())?.map(|guard| {
                    serde_json::from_slice::<StoredBlobMeta>(guard.value())
                });
                match existing {
                    Some(Ok(mut meta)) => {
                        meta.volumes.insert(volume_id);
                        let serialized = serde_json::to_vec(&meta)?;
                        table.insert(ref_hex.as_str(), serialized.as_slice())?;
                        Ok(())
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => Err(DiskError::NotFound(ref_)),
                }
            };
            write_txn.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(|e| DiskError::Metadata(anyhow::anyhow!("redb write task failed: {e}")))?
        .map_err(DiskError::Metadata)?
    }
}
