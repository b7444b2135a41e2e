//! The blob reference type used by Varasto: the SHA-256 digest of a
//! blob's plaintext contents, serialized as 64-char lowercase hex.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Opaque 32-byte content digest. The sole identity of a blob.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlobRef([u8; 32]);

impl BlobRef {
    /// Wraps a raw 32-byte digest without validating it came from SHA-256.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Computes the ref of `data` directly (used pervasively in tests).
    pub fn from_sha256(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(digest.into())
    }

    /// Parses a 64-character lowercase (or uppercase) hex string.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        if s.len() != 64 {
            return Err(CryptoError::WrongLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        data_encoding::HEXLOWER_PERMISSIVE
            .decode_mut(s.to_ascii_lowercase().as_bytes(), &mut bytes)
            .map_err(|_| CryptoError::InvalidHex)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn as_hex(&self) -> String {
        data_encoding::HEXLOWER.encode(&self.0)
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlobRef").field(&self.as_hex()).finish()
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

impl std::str::FromStr for BlobRef {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl serde::Serialize for BlobRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_hex())
    }
}

impl<'de> serde::Deserialize<'de> for BlobRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOX: &str = "The quick brown fox jumps over the lazy dog";
    const FOX_HEX: &str = "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592";

    #[test]
    fn from_sha256_matches_known_vector() {
        let r = BlobRef::from_sha256(FOX.as_bytes());
        assert_eq!(r.as_hex(), FOX_HEX);
    }

    #[test]
    fn round_trips_through_hex() {
        let r = BlobRef::from_sha256(FOX.as_bytes());
        let parsed = BlobRef::from_hex(&r.as_hex()).unwrap();
        assert_eq!(r, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            BlobRef::from_hex("abcd"),
            Err(CryptoError::WrongLength(4))
        ));
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "z".repeat(64);
        assert!(matches!(BlobRef::from_hex(&bad), Err(CryptoError::InvalidHex)));
    }
}
