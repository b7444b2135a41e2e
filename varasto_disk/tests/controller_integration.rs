//! End-to-end coverage of the write/fetch/replicate/scrub pipelines,
//! against in-memory test doubles for both `VolumeDriver` and
//! `MetadataPort`. Scenarios mirror the worked examples the disk access
//! controller was ported from: unknown-volume rejection, digest
//! mismatch detection, same-blob-twice rejection, per-collection key
//! derivation, compression, replication (including bit-rot detection),
//! and scrubbing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use varasto_crypto::BlobRef;
use varasto_disk::driver::{ByteStream, VolumeDriver};
use varasto_disk::error::{DiskError, VolumeId};
use varasto_disk::metadata_port::{BlobMeta, MetadataPort};
use varasto_disk::testutil::DriverTests;
use varasto_disk::Controller;

use std::sync::Arc;
use tokio::io::AsyncReadExt;

#[derive(Debug, Default)]
struct MemoryVolume {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl VolumeDriver for MemoryVolume {
    async fn mountable(&self) -> Result<(), DiskError> {
        Ok(())
    }

    async fn raw_store(&self, ref_: BlobRef, mut content: ByteStream) -> Result<(), DiskError> {
        let mut buf = Vec::new();
        content
            .read_to_end(&mut buf)
            .await
            .map_err(DiskError::from_stream_io)?;
        self.files.lock().unwrap().insert(ref_.as_hex(), buf);
        Ok(())
    }

    async fn raw_fetch(&self, ref_: BlobRef) -> Result<ByteStream, DiskError> {
        let files = self.files.lock().unwrap();
        match files.get(&ref_.as_hex()) {
            Some(bytes) => Ok(Box::pin(std::io::Cursor::new(bytes.clone()))),
            None => Err(DiskError::NotFound(ref_)),
        }
    }
}

impl MemoryVolume {
    fn corrupt_byte(&self, ref_: BlobRef, offset: usize, value: u8) {
        let mut files = self.files.lock().unwrap();
        let bytes = files.get_mut(&ref_.as_hex()).expect("blob must exist to corrupt it");
        bytes[offset] = value;
    }

    fn contains(&self, ref_: BlobRef) -> bool {
        self.files.lock().unwrap().contains_key(&ref_.as_hex())
    }
}

/// Derives each collection's blob encryption key by xor'ing a root key
/// with the sha256 of the collection id, so the same plaintext blob
/// encrypts to different ciphertext under different roots.
#[derive(Debug)]
struct XorKeyedMetadata {
    root_key: [u8; 32],
    store: Mutex<HashMap<String, BlobMeta>>,
}

impl XorKeyedMetadata {
    fn new(root_key: [u8; 32]) -> Self {
        Self {
            root_key,
            store: Mutex::new(HashMap::new()),
        }
    }

    fn derive_key(&self, collection_id: &str) -> [u8; 32] {
        let collection_hash = *BlobRef::from_sha256(collection_id.as_bytes()).as_bytes();
        let mut key = [0u8; 32];
        for i in 0..32 {
            key[i] = collection_hash[i] ^ self.root_key[i];
        }
        key
    }
}

#[async_trait]
impl MetadataPort for XorKeyedMetadata {
    async fn query_blob_exists(&self, ref_: BlobRef) -> Result<bool, DiskError> {
        Ok(self.store.lock().unwrap().contains_key(&ref_.as_hex()))
    }

    async fn query_collection_encryption_key_for_new_blobs(
        &self,
        collection_id: &str,
    ) -> Result<(String, [u8; 32]), DiskError> {
        Ok((collection_id.to_string(), self.derive_key(collection_id)))
    }

    async fn query_blob_crc32(&self, ref_: BlobRef) -> Result<u32, DiskError> {
        self.store
            .lock()
            .unwrap()
            .get(&ref_.as_hex())
            .map(|m| m.expected_crc32)
            .ok_or(DiskError::NotFound(ref_))
    }

    async fn query_blob_metadata(
        &self,
        ref_: BlobRef,
        _envelopes: &[varasto_crypto::KeyEnvelope],
    ) -> Result<BlobMeta, DiskError> {
        self.store
            .lock()
            .unwrap()
            .get(&ref_.as_hex())
            .cloned()
            .ok_or(DiskError::NotFound(ref_))
    }

    async fn write_blob_created(&self, meta: BlobMeta) -> Result<(), DiskError> {
        let mut store = self.store.lock().unwrap();
        if store.contains_key(&meta.ref_.as_hex()) {
            return Err(DiskError::AlreadyExists(meta.ref_));
        }
        store.insert(meta.ref_.as_hex(), meta);
        Ok(())
    }

    async fn write_blob_replicated(&self, ref_: BlobRef, volume_id: VolumeId) -> Result<(), DiskError> {
        if let Some(meta) = self.store.lock().unwrap().get_mut(&ref_.as_hex()) {
            meta.volumes.insert(volume_id);
        }
        Ok(())
    }
}

const FOX: &str = "The quick brown fox jumps over the lazy dog";
const FOX_SHA256: &str = "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592";

fn byte_stream(data: &'static str) -> ByteStream {
    Box::pin(data.as_bytes())
}

fn controller_with_volume_1() -> (Controller, Arc<MemoryVolume>) {
    let metadata = Arc::new(XorKeyedMetadata::new([0x81; 32]));
    let controller = Controller::new(metadata);
    let volume = Arc::new(MemoryVolume::default());
    controller.define(1, volume.clone());
    (controller, volume)
}

#[tokio::test]
async fn write_to_unknown_volume_is_rejected() {
    let (controller, _volume) = controller_with_volume_1();
    let ref_ = BlobRef::from_hex(FOX_SHA256).unwrap();

    let err = controller
        .write_blob(2, "dummyCollId", ref_, byte_stream(FOX), true)
        .await
        .unwrap_err();

    assert!(matches!(err, DiskError::VolumeNotFound(2)));
}

#[tokio::test]
async fn write_with_mismatched_digest_is_rejected() {
    let (controller, _volume) = controller_with_volume_1();
    let ref_ = BlobRef::from_hex(FOX_SHA256).unwrap();

    let err = controller
        .write_blob(1, "dummyCollId", ref_, byte_stream("xxx The quick brown fox jumps over the lazy dog"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, DiskError::DigestMismatch));
}

#[tokio::test]
async fn write_then_fetch_round_trips() {
    let (controller, _volume) = controller_with_volume_1();
    let ref_ = BlobRef::from_hex(FOX_SHA256).unwrap();

    controller
        .write_blob(1, "dummyCollId", ref_, byte_stream(FOX), true)
        .await
        .unwrap();

    let result = controller.fetch(ref_, &[], 2).await;
    assert!(matches!(result, Err(DiskError::VolumeNotFound(2))));

    let mut reader = controller.fetch(ref_, &[], 1).await.unwrap();
    let mut content = String::new();
    reader.read_to_string(&mut content).await.unwrap();
    assert_eq!(content, FOX);
}

#[tokio::test]
async fn same_plaintext_encrypts_differently_under_different_roots() {
    let ref_ = BlobRef::from_hex(FOX_SHA256).unwrap();

    let metadata_a = Arc::new(XorKeyedMetadata::new([0x81; 32]));
    let controller_a = Controller::new(metadata_a);
    let volume_a = Arc::new(MemoryVolume::default());
    controller_a.define(1, volume_a.clone());

    let metadata_b = Arc::new(XorKeyedMetadata::new([0x82; 32]));
    let controller_b = Controller::new(metadata_b);
    let volume_b = Arc::new(MemoryVolume::default());
    controller_b.define(1, volume_b.clone());

    controller_a
        .write_blob(1, "dummyCollId", ref_, byte_stream(FOX), true)
        .await
        .unwrap();
    controller_b
        .write_blob(1, "dummyCollId", ref_, byte_stream(FOX), true)
        .await
        .unwrap();

    let ciphertext_a = volume_a.files.lock().unwrap().get(FOX_SHA256).cloned().unwrap();
    let ciphertext_b = volume_b.files.lock().unwrap().get(FOX_SHA256).cloned().unwrap();
    assert_ne!(ciphertext_a, ciphertext_b);
}

#[tokio::test]
async fn cannot_write_same_blob_twice() {
    let (controller, _volume) = controller_with_volume_1();
    let ref_ = BlobRef::from_hex(FOX_SHA256).unwrap();

    controller
        .write_blob(1, "dummyCollId", ref_, byte_stream(FOX), true)
        .await
        .unwrap();

    let err = controller
        .write_blob(1, "dummyCollId", ref_, byte_stream(FOX), true)
        .await
        .unwrap_err();

    assert!(matches!(err, DiskError::AlreadyExists(r) if r == ref_));
}

async fn compression_scenario(maybe_compressible: bool) {
    let (controller, _volume) = controller_with_volume_1();

    let ref_ = BlobRef::from_hex(FOX_SHA256).unwrap();
    controller
        .write_blob(1, "dummyCollId", ref_, byte_stream(FOX), maybe_compressible)
        .await
        .unwrap();

    // a single short sentence never compresses well regardless of intent
    let meta = controller.fetch(ref_, &[], 1).await;
    assert!(meta.is_ok());

    let text4x: &'static str =
        Box::leak(FOX.repeat(4).into_boxed_str());
    let ref2 = BlobRef::from_sha256(text4x.as_bytes());

    controller
        .write_blob(1, "dummyCollId", ref2, byte_stream(text4x), maybe_compressible)
        .await
        .unwrap();

    let mut reader = controller.fetch(ref2, &[], 1).await.unwrap();
    let mut content = String::new();
    reader.read_to_string(&mut content).await.unwrap();
    assert_eq!(content, text4x);
}

#[tokio::test]
async fn compression_when_maybe_compressible_is_true_and_content_repeats() {
    compression_scenario(true).await;
}

#[tokio::test]
async fn compression_when_maybe_compressible_is_false_never_compresses() {
    compression_scenario(false).await;
}

#[tokio::test]
async fn replication_copies_ciphertext_bit_identically() {
    let (controller, volume1) = controller_with_volume_1();
    let volume2 = Arc::new(MemoryVolume::default());
    controller.define(2, volume2.clone());

    let ref_ = BlobRef::from_hex(FOX_SHA256).unwrap();
    controller
        .write_blob(1, "dummyCollId", ref_, byte_stream(FOX), true)
        .await
        .unwrap();

    assert!(!volume2.contains(ref_));

    controller.replicate(1, 2, ref_).await.unwrap();

    assert!(volume2.contains(ref_));
    assert_eq!(
        volume1.files.lock().unwrap().get(&ref_.as_hex()).cloned(),
        volume2.files.lock().unwrap().get(&ref_.as_hex()).cloned(),
    );
}

#[tokio::test]
async fn replicate_is_a_no_op_if_target_already_has_the_blob() {
    let (controller, _volume1) = controller_with_volume_1();
    let volume2 = Arc::new(MemoryVolume::default());
    controller.define(2, volume2.clone());

    let ref_ = BlobRef::from_hex(FOX_SHA256).unwrap();
    controller
        .write_blob(1, "dummyCollId", ref_, byte_stream(FOX), true)
        .await
        .unwrap();

    controller.replicate(1, 2, ref_).await.unwrap();
    // second replicate should be a no-op, not an error
    controller.replicate(1, 2, ref_).await.unwrap();
}

#[tokio::test]
async fn replicate_detects_rotten_source_data() {
    let (controller, volume1) = controller_with_volume_1();
    let volume2 = Arc::new(MemoryVolume::default());
    controller.define(2, volume2.clone());

    let ref_ = BlobRef::from_hex(FOX_SHA256).unwrap();
    controller
        .write_blob(1, "dummyCollId", ref_, byte_stream(FOX), true)
        .await
        .unwrap();

    volume1.corrupt_byte(ref_, 3, 0xff);

    let err = controller.replicate(1, 2, ref_).await.unwrap_err();
    assert!(matches!(err, DiskError::DigestMismatch));
    assert!(!volume2.contains(ref_));
}

#[tokio::test]
async fn scrubbing_detects_bitrot() {
    let (controller, volume) = controller_with_volume_1();

    let ref_ = BlobRef::from_hex(FOX_SHA256).unwrap();
    controller
        .write_blob(1, "dummyCollId", ref_, byte_stream(FOX), true)
        .await
        .unwrap();

    let bytes_verified = controller.scrub(ref_, 1).await.unwrap();
    assert!(bytes_verified > 0);

    volume.corrupt_byte(ref_, 10, 0xff);

    let err = controller.scrub(ref_, 1).await.unwrap_err();
    assert!(matches!(err, DiskError::DigestMismatch));
}

#[tokio::test]
async fn memory_volume_conforms_to_the_driver_contract() {
    let volume = MemoryVolume::default();
    DriverTests::new(&volume).run_all().await;
}
