//! A volume driver that stores blobs as hex-named files under a base
//! directory on the local filesystem.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use varasto_crypto::BlobRef;
use varasto_disk::{ByteStream, DiskError, VolumeDriver};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LocalDriverConfig {
    pub base_path: String,
}

#[derive(Debug, Clone)]
pub struct LocalDriver {
    base_path: PathBuf,
}

impl LocalDriver {
    pub fn new(config: LocalDriverConfig) -> Self {
        Self {
            base_path: config.base_path.into(),
        }
    }

    fn path_for(&self, ref_: BlobRef) -> PathBuf {
        self.base_path.join(ref_.as_hex())
    }
}

#[async_trait]
impl VolumeDriver for LocalDriver {
    async fn mountable(&self) -> Result<(), DiskError> {
        tokio::fs::metadata(&self.base_path)
            .await
            .map(|_| ())
            .map_err(|e| DiskError::DriverTransient(e.into()))
    }

    async fn raw_store(&self, ref_: BlobRef, mut content: ByteStream) -> Result<(), DiskError> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| DiskError::DriverTransient(e.into()))?;

        // Write to a temp file first and rename into place, so a crash
        // or error mid-write never leaves a partially-written blob
        // under its final name.
        let tmp_path = self.base_path.join(format!("{}.tmp", ref_.as_hex()));
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| DiskError::DriverTransient(e.into()))?;

        tokio::io::copy(&mut content, &mut file)
            .await
            .map_err(DiskError::from_stream_io)?;

        tokio::fs::rename(&tmp_path, self.path_for(ref_))
            .await
            .map_err(|e| DiskError::DriverTransient(e.into()))?;

        Ok(())
    }

    async fn raw_fetch(&self, ref_: BlobRef) -> Result<ByteStream, DiskError> {
        match tokio::fs::File::open(self.path_for(ref_)).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DiskError::NotFound(ref_)),
            Err(e) => Err(DiskError::DriverTransient(e.into())),
        }
    }
}
