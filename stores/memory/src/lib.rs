//! An in-process, `HashMap`-backed volume driver. Nothing survives
//! process exit; intended for unit tests and single-shot demos.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use varasto_crypto::BlobRef;
use varasto_disk::{ByteStream, DiskError, VolumeDriver};

#[derive(Debug, Default)]
pub struct MemoryDriver {
    files: Mutex<HashMap<[u8; 32], Vec<u8>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held, for test assertions.
    pub fn len(&self) -> usize {
        self.files.lock().expect("memory driver lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VolumeDriver for MemoryDriver {
    async fn mountable(&self) -> Result<(), DiskError> {
        Ok(())
    }

    async fn raw_store(&self, ref_: BlobRef, mut content: ByteStream) -> Result<(), DiskError> {
        let mut buf = Vec::new();
        content
            .read_to_end(&mut buf)
            .await
            .map_err(DiskError::from_stream_io)?;

        self.files
            .lock()
            .expect("memory driver lock poisoned")
            .insert(*ref_.as_bytes(), buf);
        Ok(())
    }

    async fn raw_fetch(&self, ref_: BlobRef) -> Result<ByteStream, DiskError> {
        let files = self.files.lock().expect("memory driver lock poisoned");
        match files.get(ref_.as_bytes()) {
            Some(bytes) => Ok(Box::pin(std::io::Cursor::new(bytes.clone()))),
            None => Err(DiskError::NotFound(ref_)),
        }
    }
}
