//! A Google Drive volume driver. Blobs live as regular files inside a single
//! parent folder, named with the URL-safe-base64 encoding of the raw 32-byte
//! ref (not hex) because Drive file names have no reason to stay
//! hex-readable and the shorter encoding saves a few bytes per request.

use anyhow::anyhow;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use varasto_crypto::BlobRef;
use varasto_disk::{ByteStream, DiskError, VolumeDriver};

const API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3/files";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GoogleDriveDriverConfig {
    pub access_token: String,
    pub parent_folder_id: String,
}

#[derive(Debug, Clone)]
pub struct GoogleDriveDriver {
    client: reqwest::Client,
    access_token: String,
    parent_folder_id: String,
}

#[derive(Deserialize)]
struct FileListResponse {
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

/// Mirrors the original `toGoogleDriveName`: base64url, unpadded, of the raw
/// digest bytes rather than its hex string.
fn drive_name_for(ref_: BlobRef) -> String {
    URL_SAFE_NO_PAD.encode(ref_.as_bytes())
}

impl GoogleDriveDriver {
    pub fn new(config: GoogleDriveDriverConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: config.access_token,
            parent_folder_id: config.parent_folder_id,
        }
    }

    async fn find_file_id(&self, name: &str) -> Result<Option<String>, DiskError> {
        let query = format!(
            "name = '{name}' and '{parent}' in parents and trashed = false",
            parent = self.parent_folder_id
        );

        let response = self
            .client
            .get(format!("{API_BASE}/files"))
            .bearer_auth(&self.access_token)
            .query(&[("q", query.as_str()), ("fields", "files(id)"), ("spaces", "drive")])
            .send()
            .await
            .map_err(|e| DiskError::DriverTransient(anyhow!(e)))?;

        if !response.status().is_success() {
            return Err(DiskError::DriverTransient(anyhow!(
                "drive file list failed with status {}",
                response.status()
            )));
        }

        let parsed: FileListResponse = response
            .json()
            .await
            .map_err(|e| DiskError::DriverTransient(anyhow!(e)))?;

        Ok(parsed.files.into_iter().next().map(|f| f.id))
    }
}

#[async_trait]
impl VolumeDriver for GoogleDriveDriver {
    async fn mountable(&self) -> Result<(), DiskError> {
        let response = self
            .client
            .get(format!("{API_BASE}/files/{}", self.parent_folder_id))
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id")])
            .send()
            .await
            .map_err(|e| DiskError::DriverTransient(anyhow!(e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DiskError::DriverTransient(anyhow!(
                "parent folder not reachable: status {}",
                response.status()
            )))
        }
    }

    async fn raw_store(&self, ref_: BlobRef, mut content: ByteStream) -> Result<(), DiskError> {
        let name = drive_name_for(ref_);

        let mut buf = Vec::new();
        content
            .read_to_end(&mut buf)
            .await
            .map_err(DiskError::from_stream_io)?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [self.parent_folder_id],
        });

        let metadata_part = reqwest::multipart::Part::text(metadata.to_string())
            .mime_str("application/json; charset=UTF-8")
            .expect("static mime string is valid");
        let media_part = reqwest::multipart::Part::bytes(buf)
            .mime_str("application/octet-stream")
            .expect("static mime string is valid");
        let form = reqwest::multipart::Form::new()
            .part("metadata", metadata_part)
            .part("media", media_part);

        let response = self
            .client
            .post(UPLOAD_BASE)
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "multipart")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| DiskError::DriverTransient(anyhow!(e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DiskError::DriverTransient(anyhow!(
                "drive upload failed with status {}",
                response.status()
            )))
        }
    }

    async fn raw_fetch(&self, ref_: BlobRef) -> Result<ByteStream, DiskError> {
        let name = drive_name_for(ref_);
        let file_id = self
            .find_file_id(&name)
            .await?
            .ok_or(DiskError::NotFound(ref_))?;

        let response = self
            .client
            .get(format!("{API_BASE}/files/{file_id}"))
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| DiskError::DriverTransient(anyhow!(e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DiskError::NotFound(ref_));
        }
        if !response.status().is_success() {
            return Err(DiskError::DriverTransient(anyhow!(
                "drive download failed with status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DiskError::DriverTransient(anyhow!(e)))?;
        Ok(Box::pin(std::io::Cursor::new(bytes.to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_name_matches_the_known_fixture_for_the_fox_digest() {
        let ref_ = BlobRef::from_hex(
            "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592",
        )
        .unwrap();
        assert_eq!(
            drive_name_for(ref_),
            "16j7swfXgJRpypq8sAguT41WUeRtPNt2LQLQvzfJ5ZI"
        );
    }

    #[test]
    fn drive_name_is_url_safe_and_unpadded() {
        let ref_ = BlobRef::from_sha256(b"the quick brown fox jumps over the lazy dog");
        let encoded = drive_name_for(ref_);
        assert_eq!(encoded.len(), 43);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
    }
}
