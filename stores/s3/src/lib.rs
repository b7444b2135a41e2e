//! An S3-compatible object storage volume driver. Blobs are stored as
//! objects keyed by `hex(ref)`, path-style addressed so self-hosted
//! S3-compatible endpoints (MinIO, Garage, ...) work the same as AWS.

use anyhow::anyhow;
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use varasto_crypto::BlobRef;
use varasto_disk::{ByteStream, DiskError, VolumeDriver};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct S3DriverConfig {
    pub endpoint: String,
    #[serde(default)]
    pub region: String,
    pub bucket_name: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct S3Driver {
    bucket: Box<Bucket>,
}

impl S3Driver {
    pub fn new(config: S3DriverConfig) -> Result<Self, DiskError> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| DiskError::DriverTransient(e.into()))?;

        let bucket = Bucket::new(
            &config.bucket_name,
            Region::Custom {
                endpoint: config.endpoint,
                region: config.region,
            },
            credentials,
        )
        .map_err(|e| DiskError::DriverTransient(e.into()))?
        .with_path_style();

        Ok(Self { bucket })
    }

    fn key_for(&self, ref_: BlobRef) -> String {
        ref_.as_hex()
    }
}

#[async_trait]
impl VolumeDriver for S3Driver {
    async fn mountable(&self) -> Result<(), DiskError> {
        match self.bucket.head_object("__varasto_mountable_probe__").await {
            Ok(_) => Ok(()),
            Err(s3::error::S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(DiskError::DriverTransient(anyhow!(e))),
        }
    }

    async fn raw_store(&self, ref_: BlobRef, mut content: ByteStream) -> Result<(), DiskError> {
        let key = self.key_for(ref_);
        let status = self
            .bucket
            .put_object_stream(&mut content, &key)
            .await
            .map_err(|e| DiskError::DriverTransient(anyhow!(e)))?
            .status_code();

        if status >= 300 {
            return Err(DiskError::DriverTransient(anyhow!(
                "unexpected http status {status} storing {key}"
            )));
        }
        Ok(())
    }

    async fn raw_fetch(&self, ref_: BlobRef) -> Result<ByteStream, DiskError> {
        let key = self.key_for(ref_);
        match self.bucket.get_object(&key).await {
            Ok(response) => Ok(Box::pin(std::io::Cursor::new(response.bytes().to_vec()))),
            Err(s3::error::S3Error::HttpFailWithBody(404, _)) => Err(DiskError::NotFound(ref_)),
            Err(e) => Err(DiskError::DriverTransient(anyhow!(e))),
        }
    }
}
