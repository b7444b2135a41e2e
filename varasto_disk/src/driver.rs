//! The narrow contract a volume backend must implement. Drivers see only
//! opaque ciphertext: never plaintext, keys, or CRCs. Everything about
//! what the bytes mean lives in the controller and the metadata port.

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use varasto_crypto::BlobRef;

use crate::error::DiskError;

/// A boxed, owned byte stream. Chosen over a `Bytes`-stream so the
/// controller's hash/CRC/cipher adapters, which all wrap `AsyncRead`,
/// compose directly without an intermediate buffering layer.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// One physical (or logical, for cloud targets) storage location for
/// blob ciphertext.
#[async_trait]
pub trait VolumeDriver: std::fmt::Debug + Send + Sync {
    /// A lightweight probe (existence, credentials) confirming the
    /// volume is currently reachable. Does not guarantee every blob on
    /// it is intact.
    async fn mountable(&self) -> Result<(), DiskError>;

    /// Stores `content` under a name derived deterministically from
    /// `ref_`. Idempotent: storing the same ref with identical bytes
    /// again must succeed and leave the volume in the same state.
    async fn raw_store(&self, ref_: BlobRef, content: ByteStream) -> Result<(), DiskError>;

    /// Opens a stream over the stored ciphertext for `ref_`, or
    /// `DiskError::NotFound` if the volume holds nothing under that name.
    async fn raw_fetch(&self, ref_: BlobRef) -> Result<ByteStream, DiskError>;
}
