//! DEFLATE (raw, no zlib/gzip framing) compression at the default level.
//!
//! The codec choice is fixed by the wire format, not free: on-disk blobs
//! carry no header identifying their codec, so every reader of a given
//! volume must agree on exactly one. DEFLATE via `flate2`/`async-compression`
//! (both backed by `miniz_oxide`) is used throughout.

use std::io::Write;

use async_compression::tokio::bufread::{DeflateDecoder, DeflateEncoder};
use tokio::io::{AsyncRead, BufReader};

/// Wraps `inner` in a streaming DEFLATE encoder at the default level.
pub fn compress_reader<R: AsyncRead + Unpin>(inner: R) -> DeflateEncoder<BufReader<R>> {
    DeflateEncoder::new(BufReader::new(inner))
}

/// Wraps `inner` in a streaming DEFLATE decoder.
pub fn decompress_reader<R: AsyncRead + Unpin>(inner: R) -> DeflateDecoder<BufReader<R>> {
    DeflateDecoder::new(BufReader::new(inner))
}

/// Compresses `sample` one-shot and returns the compressed/original ratio,
/// used to decide whether a blob is worth compressing before committing
/// the whole stream to the (de)compression pipeline.
pub fn probe_compression_ratio(sample: &[u8]) -> f64 {
    if sample.is_empty() {
        return 1.0;
    }

    let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(sample).expect("in-memory writer cannot fail");
    let compressed = encoder.finish().expect("in-memory writer cannot fail");

    compressed.len() as f64 / sample.len() as f64
}

/// Blobs whose probe compresses to at most this fraction of their
/// original size are stored compressed.
pub const COMPRESSION_RATIO_THRESHOLD: f64 = 0.9;

/// Size of the prefix sampled to decide compressibility.
pub const COMPRESSION_PROBE_SIZE: usize = 64 * 1024;
