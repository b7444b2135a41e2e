//! Blob references, envelope encryption, and streaming integrity primitives.
//!
//! This crate has no I/O dependency beyond the stream adapters in
//! [`verify`]; everything else is pure computation over byte slices.

pub mod blob_ref;
pub mod cipher;
pub mod compress;
pub mod envelope;
pub mod error;
pub mod verify;

pub use blob_ref::BlobRef;
pub use cipher::{CtrCursor, CtrReader};
pub use envelope::{decrypt_envelope, encrypt_envelope, kek_fingerprint, KeyEnvelope, KeySlot};
pub use error::CryptoError;
pub use verify::{ByteTap, Crc32CountingReader, Crc32VerifyingReader, HashVerifyingReader, TeeReader};

/// Size of one blob chunk in a multi-blob file, per the wire format.
pub const BLOB_SIZE: u64 = 4 * 1024 * 1024;

/// Sentinel changeset id denoting "no parent" / an empty collection.
pub const NO_PARENT: &str = "";

/// URL-level revision selector meaning "the current head".
pub const HEAD_REV: &str = "HEAD";
