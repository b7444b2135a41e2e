//! Streaming integrity adapters.
//!
//! [`HashVerifyingReader`] and [`Crc32VerifyingReader`] both follow the
//! same shape: wrap an `AsyncRead`, accumulate a running digest as bytes
//! pass through, and compare against an expected value the moment the
//! inner reader reports EOF. A caller that reads either adapter to
//! completion without an `io::Error` has cryptographic (or
//! integrity-check) assurance the bytes matched what was expected.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, ReadBuf};

use crate::blob_ref::BlobRef;
use crate::error::CryptoError;

fn digest_mismatch() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, CryptoError::DigestMismatch)
}

/// Wraps a plaintext stream; verifies its SHA-256 equals `expected` at EOF.
pub struct HashVerifyingReader<R> {
    inner: R,
    hasher: Sha256,
    expected: BlobRef,
    bytes_read: u64,
    verified: bool,
}

impl<R> HashVerifyingReader<R> {
    pub fn new(inner: R, expected: BlobRef) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            expected,
            bytes_read: 0,
            verified: false,
        }
    }

    /// Total bytes that have flowed through so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashVerifyingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        dst: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = dst.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, dst) {
            Poll::Ready(Ok(())) => {
                let filled = &dst.filled()[before..];
                if filled.is_empty() {
                    if !self.verified {
                        self.verified = true;
                        let digest: [u8; 32] = self.hasher.clone().finalize().into();
                        if BlobRef::from_bytes(digest) != self.expected {
                            return Poll::Ready(Err(digest_mismatch()));
                        }
                    }
                } else {
                    self.hasher.update(filled);
                    self.bytes_read += filled.len() as u64;
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Wraps a ciphertext stream; verifies its CRC32 equals `expected` at EOF.
pub struct Crc32VerifyingReader<R> {
    inner: R,
    hasher: crc32fast::Hasher,
    expected: u32,
    bytes_read: u64,
    verified: bool,
}

impl<R> Crc32VerifyingReader<R> {
    pub fn new(inner: R, expected: u32) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
            expected,
            bytes_read: 0,
            verified: false,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Crc32VerifyingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        dst: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = dst.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, dst) {
            Poll::Ready(Ok(())) => {
                let filled = &dst.filled()[before..];
                if filled.is_empty() {
                    if !self.verified {
                        self.verified = true;
                        if self.hasher.clone().finalize() != self.expected {
                            return Poll::Ready(Err(digest_mismatch()));
                        }
                    }
                } else {
                    self.hasher.update(filled);
                    self.bytes_read += filled.len() as u64;
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Non-verifying tap: counts bytes and feeds a CRC32 accumulator as they
/// flow through, without asserting anything. Used on the write path,
/// where the expected CRC32 isn't known in advance — it *becomes* the
/// expected value recorded in metadata once the stream completes.
pub struct Crc32CountingReader<R> {
    inner: R,
    hasher: crc32fast::Hasher,
    bytes_read: u64,
}

impl<R> Crc32CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Snapshot of the CRC32 computed over bytes read so far. Only
    /// meaningful once the caller has driven the stream to EOF.
    pub fn crc32(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Crc32CountingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        dst: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = dst.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, dst) {
            Poll::Ready(Ok(())) => {
                let filled = &dst.filled()[before..];
                if !filled.is_empty() {
                    self.hasher.update(filled);
                    self.bytes_read += filled.len() as u64;
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Shared byte-count/CRC32 accumulator that survives past the point its
/// reader is handed off to something that drives it to completion (a
/// volume driver's `raw_store`, which owns the stream and never gives it
/// back). Cloning a `ByteTap` shares the same counters.
#[derive(Clone, Default)]
pub struct ByteTap(Arc<Mutex<ByteTapState>>);

#[derive(Default)]
struct ByteTapState {
    hasher: crc32fast::Hasher,
    bytes_read: u64,
}

impl ByteTap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> u64 {
        self.0.lock().expect("tap mutex poisoned").bytes_read
    }

    pub fn crc32(&self) -> u32 {
        self.0.lock().expect("tap mutex poisoned").hasher.clone().finalize()
    }

    fn record(&self, chunk: &[u8]) {
        let mut state = self.0.lock().expect("tap mutex poisoned");
        state.hasher.update(chunk);
        state.bytes_read += chunk.len() as u64;
    }
}

/// Non-verifying pass-through that records every byte seen into a
/// [`ByteTap`], readable after the fact through the tap's own handle.
pub struct TeeReader<R> {
    inner: R,
    tap: ByteTap,
}

impl<R> TeeReader<R> {
    pub fn new(inner: R, tap: ByteTap) -> Self {
        Self { inner, tap }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TeeReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        dst: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = dst.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, dst) {
            Poll::Ready(Ok(())) => {
                let filled = &dst.filled()[before..];
                if !filled.is_empty() {
                    self.tap.record(filled);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn passes_through_matching_digest() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let expected = BlobRef::from_sha256(data);

        let mut reader = HashVerifyingReader::new(&data[..], expected);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, data);
        assert_eq!(reader.bytes_read(), data.len() as u64);
    }

    #[tokio::test]
    async fn rejects_mismatched_digest() {
        let data = b"xxx The quick brown fox jumps over the lazy dog";
        let wrong = BlobRef::from_sha256(b"The quick brown fox jumps over the lazy dog");

        let mut reader = HashVerifyingReader::new(&data[..], wrong);
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn crc32_tap_then_verify_round_trips() {
        let data = b"The quick brown fox jumps over the lazy dog";

        let mut counting = Crc32CountingReader::new(&data[..]);
        let mut buf = Vec::new();
        counting.read_to_end(&mut buf).await.unwrap();
        let crc = counting.crc32();

        let mut verifying = Crc32VerifyingReader::new(&buf[..], crc);
        let mut out = Vec::new();
        verifying.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, buf);
    }

    #[tokio::test]
    async fn crc32_verify_rejects_tampered_bytes() {
        let data = b"The quick brown fox jumps over the lazy dog".to_vec();
        let mut counting = Crc32CountingReader::new(&data[..]);
        let mut buf = Vec::new();
        counting.read_to_end(&mut buf).await.unwrap();
        let crc = counting.crc32();

        let mut tampered = buf.clone();
        tampered[3] = tampered[3].wrapping_add(1);

        let mut verifying = Crc32VerifyingReader::new(&tampered[..], crc);
        let mut out = Vec::new();
        let err = verifying.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn tee_reader_records_bytes_and_crc32_visible_after_drain() {
        let data = b"The quick brown fox jumps over the lazy dog".to_vec();
        let tap = ByteTap::new();
        let mut tee = TeeReader::new(&data[..], tap.clone());

        let mut out = Vec::new();
        tee.read_to_end(&mut out).await.unwrap();
        drop(tee);

        assert_eq!(out, data);
        assert_eq!(tap.bytes(), data.len() as u64);

        let mut expected_hasher = crc32fast::Hasher::new();
        expected_hasher.update(&data);
        assert_eq!(tap.crc32(), expected_hasher.finalize());
    }
}
