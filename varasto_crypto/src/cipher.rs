//! AES-256-CTR with a fixed zero IV, safe only because every key is
//! single-use (derived/wrapped per blob via the collection KEK). Integrity
//! is provided separately by the outer plaintext hash and stored CRC32 —
//! do not swap this for an AEAD mode, it would change the on-disk layout.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use aes::Aes256;
use aes::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use tokio::io::{AsyncRead, ReadBuf};

type Aes256Ctr = Ctr128BE<Aes256>;

/// A keystream cursor over AES-256-CTR(key, IV=0). `apply` is its own
/// inverse: encrypting then applying again with the same state recovers
/// the original bytes, but callers should construct a fresh instance per
/// direction since the cursor advances as bytes flow through it.
pub struct CtrCursor {
    cipher: Aes256Ctr,
}

impl CtrCursor {
    pub fn new(key: &[u8; 32]) -> Self {
        let iv = [0u8; 16];
        Self {
            cipher: Aes256Ctr::new(key.into(), &iv.into()),
        }
    }

    /// XORs `buf` in place with the keystream, advancing the cursor.
    pub fn apply(&mut self, buf: &mut [u8]) {
        self.cipher.apply_keystream(buf);
    }
}

/// Streams `inner` through an AES-256-CTR keystream cursor, encrypting or
/// decrypting in place depending on direction (CTR is its own inverse).
/// Used to apply the cipher to a blob's byte stream without buffering the
/// whole thing in memory.
pub struct CtrReader<R> {
    inner: R,
    cursor: CtrCursor,
}

impl<R> CtrReader<R> {
    pub fn new(inner: R, cursor: CtrCursor) -> Self {
        Self { inner, cursor }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CtrReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        dst: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = dst.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, dst) {
            Poll::Ready(Ok(())) => {
                self.cursor.apply(&mut dst.filled_mut()[before..]);
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}
