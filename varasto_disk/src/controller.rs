//! The disk access controller: the write and read pipelines that sit
//! between collections/changesets and raw volume bytes.

use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use tokio::io::{AsyncReadExt, BufReader};
use tracing::{debug, warn};
use varasto_crypto::compress::{self, COMPRESSION_PROBE_SIZE, COMPRESSION_RATIO_THRESHOLD};
use varasto_crypto::{BlobRef, ByteTap, CtrCursor, CtrReader, HashVerifyingReader, KeyEnvelope, TeeReader};

use crate::driver::{ByteStream, VolumeDriver};
use crate::error::{DiskError, VolumeId};
use crate::metadata_port::{BlobMeta, MetadataPort};

/// Coordinates encryption, (de)compression, and integrity verification
/// around a set of volume drivers and a metadata port. Holds no per-blob
/// locks: at-most-once-per-ref is a `MetadataPort` invariant, not a
/// controller-level mutex.
#[derive(Debug)]
pub struct Controller {
    volumes: RwLock<HashMap<VolumeId, Arc<dyn VolumeDriver>>>,
    metadata: Arc<dyn MetadataPort>,
}

impl Controller {
    pub fn new(metadata: Arc<dyn MetadataPort>) -> Self {
        Self {
            volumes: RwLock::new(HashMap::new()),
            metadata,
        }
    }

    /// Registers a driver for `volume_id`. The registry is effectively
    /// immutable after node startup; there is no `undefine`.
    pub fn define(&self, volume_id: VolumeId, driver: Arc<dyn VolumeDriver>) {
        self.volumes
            .write()
            .expect("volume registry lock poisoned")
            .insert(volume_id, driver);
    }

    fn driver_for(&self, volume_id: VolumeId) -> Result<Arc<dyn VolumeDriver>, DiskError> {
        self.volumes
            .read()
            .expect("volume registry lock poisoned")
            .get(&volume_id)
            .cloned()
            .ok_or(DiskError::VolumeNotFound(volume_id))
    }

    /// Hashes, optionally compresses, encrypts, and stores `plaintext` as
    /// the blob `expected_ref` under `volume_id`, attributing the new
    /// blob's encryption key to `collection_id`.
    pub async fn write_blob(
        &self,
        volume_id: VolumeId,
        collection_id: &str,
        expected_ref: BlobRef,
        plaintext: ByteStream,
        maybe_compressible: bool,
    ) -> Result<(), DiskError> {
        let driver = self.driver_for(volume_id)?;

        if self.metadata.query_blob_exists(expected_ref).await? {
            return Err(DiskError::AlreadyExists(expected_ref));
        }

        let (key_id, key) = self
            .metadata
            .query_collection_encryption_key_for_new_blobs(collection_id)
            .await?;

        let hash_verified = HashVerifyingReader::new(plaintext, expected_ref);
        let plaintext_tap = ByteTap::new();
        let mut counted = TeeReader::new(hash_verified, plaintext_tap.clone());

        let mut probe = vec![0u8; COMPRESSION_PROBE_SIZE];
        let mut probe_len = 0;
        while probe_len < probe.len() {
            let n = counted
                .read(&mut probe[probe_len..])
                .await
                .map_err(DiskError::from_stream_io)?;
            if n == 0 {
                break;
            }
            probe_len += n;
        }
        probe.truncate(probe_len);

        let is_compressed = maybe_compressible
            && compress::probe_compression_ratio(&probe) <= COMPRESSION_RATIO_THRESHOLD;

        let rest: ByteStream = Box::pin(Cursor::new(probe).chain(counted));

        let maybe_compressed: ByteStream = if is_compressed {
            Box::pin(compress::compress_reader(rest))
        } else {
            rest
        };

        let encrypted: ByteStream = Box::pin(CtrReader::new(maybe_compressed, CtrCursor::new(&key)));

        let ciphertext_tap = ByteTap::new();
        let final_stream: ByteStream = Box::pin(TeeReader::new(encrypted, ciphertext_tap.clone()));

        debug!(volume_id, blob_ref = %expected_ref, "storing blob");
        driver
            .raw_store(expected_ref, final_stream)
            .await
            .map_err(|e| match e {
                DiskError::Io(io_err) => DiskError::from_stream_io(io_err),
                other => other,
            })?;

        let meta = BlobMeta {
            ref_: expected_ref,
            expected_crc32: ciphertext_tap.crc32(),
            size_on_disk: ciphertext_tap.bytes(),
            size: plaintext_tap.bytes(),
            is_compressed,
            volumes: BTreeSet::from([volume_id]),
            encryption_key_id: key_id,
            encryption_key: key,
        };

        self.metadata.write_blob_created(meta).await
    }

    /// Opens a fully-verified plaintext reader for `ref_` from `volume_id`.
    pub async fn fetch(
        &self,
        ref_: BlobRef,
        envelopes: &[KeyEnvelope],
        volume_id: VolumeId,
    ) -> Result<ByteStream, DiskError> {
        let driver = self.driver_for(volume_id)?;
        let meta = self.metadata.query_blob_metadata(ref_, envelopes).await?;

        let raw = driver.raw_fetch(ref_).await?;
        let crc_verified: ByteStream =
            Box::pin(varasto_crypto::Crc32VerifyingReader::new(raw, meta.expected_crc32));

        let decrypted: ByteStream = Box::pin(CtrReader::new(
            crc_verified,
            CtrCursor::new(&meta.encryption_key),
        ));

        let maybe_decompressed: ByteStream = if meta.is_compressed {
            Box::pin(compress::decompress_reader(decrypted))
        } else {
            decrypted
        };

        Ok(Box::pin(HashVerifyingReader::new(maybe_decompressed, ref_)))
    }

    /// Copies ciphertext bit-identically from `from_vol` to `to_vol`,
    /// verifying it against the CRC32 already recorded for `ref_`.
    /// No-op if `to_vol` already holds the blob.
    pub async fn replicate(
        &self,
        from_vol: VolumeId,
        to_vol: VolumeId,
        ref_: BlobRef,
    ) -> Result<(), DiskError> {
        let target = self.driver_for(to_vol)?;

        if target.raw_fetch(ref_).await.is_ok() {
            debug!(blob_ref = %ref_, to_vol, "replicate: target already has blob, skipping");
            return Ok(());
        }

        let source = self.driver_for(from_vol)?;
        let expected_crc32 = self.metadata.query_blob_crc32(ref_).await?;

        let raw = source.raw_fetch(ref_).await?;
        let verified: ByteStream =
            Box::pin(varasto_crypto::Crc32VerifyingReader::new(raw, expected_crc32));

        target
            .raw_store(ref_, verified)
            .await
            .map_err(|e| match e {
                DiskError::Io(io_err) => DiskError::from_stream_io(io_err),
                other => other,
            })?;

        self.metadata.write_blob_replicated(ref_, to_vol).await
    }

    /// Reads the entire ciphertext for `ref_` on `volume_id`, verifying
    /// against the recorded CRC32 without decrypting. Returns the number
    /// of bytes verified.
    pub async fn scrub(&self, ref_: BlobRef, volume_id: VolumeId) -> Result<u64, DiskError> {
        let driver = self.driver_for(volume_id)?;
        let expected_crc32 = self.metadata.query_blob_crc32(ref_).await?;

        let raw = driver.raw_fetch(ref_).await?;
        let mut verified = BufReader::new(varasto_crypto::Crc32VerifyingReader::new(raw, expected_crc32));

        let mut sink = Vec::new();
        match verified.read_to_end(&mut sink).await {
            Ok(_) => Ok(sink.len() as u64),
            Err(e) => {
                warn!(blob_ref = %ref_, volume_id, "scrub detected corruption");
                Err(DiskError::from_stream_io(e))
            }
        }
    }
}
