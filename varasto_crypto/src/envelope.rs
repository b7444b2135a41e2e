//! RSA-wrapped envelope encryption for per-blob/per-collection symmetric
//! keys. Lets the server store ciphertext it cannot read; only holders of
//! a matching private key can unwrap the key and thus the blob.

use base64::Engine;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey, pkcs8::EncodePublicKey};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// One recipient's wrapped copy of a 32-byte key.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KeySlot {
    /// hex(SHA-256 of the recipient public key's DER encoding).
    pub kek_fingerprint: String,
    /// base64 of the RSA-OAEP(SHA-256) ciphertext.
    pub ciphertext: String,
}

/// A symmetric key wrapped for zero or more recipients.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KeyEnvelope {
    pub key_id: String,
    pub slots: Vec<KeySlot>,
}

/// SHA-256 of a public key's DER (SubjectPublicKeyInfo) encoding.
pub fn kek_fingerprint(public_key: &RsaPublicKey) -> Result<[u8; 32], CryptoError> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| CryptoError::DecryptFailure(e.to_string()))?;
    Ok(Sha256::digest(der.as_bytes()).into())
}

/// Wraps `key` for each recipient in `recipients`, preserving order.
pub fn encrypt_envelope(
    key_id: impl Into<String>,
    key: &[u8; 32],
    recipients: &[RsaPublicKey],
) -> Result<KeyEnvelope, CryptoError> {
    let mut rng = rand::thread_rng();
    let mut slots = Vec::with_capacity(recipients.len());

    for recipient in recipients {
        let fingerprint = kek_fingerprint(recipient)?;
        let ciphertext = recipient
            .encrypt(&mut rng, Oaep::new::<Sha256>(), key)
            .map_err(|e| CryptoError::DecryptFailure(e.to_string()))?;

        slots.push(KeySlot {
            kek_fingerprint: hex::encode(fingerprint),
            ciphertext: base64::engine::general_purpose::STANDARD.encode(ciphertext),
        });
    }

    Ok(KeyEnvelope {
        key_id: key_id.into(),
        slots,
    })
}

/// Tries every slot's ciphertext against `private_key` until one unwraps
/// successfully, preferring the slot whose fingerprint matches
/// `private_key`'s public half (when it can be cheaply derived).
pub fn decrypt_envelope(
    envelope: &KeyEnvelope,
    private_key: &RsaPrivateKey,
) -> Result<[u8; 32], CryptoError> {
    if envelope.slots.is_empty() {
        return Err(CryptoError::NoMatchingSlot);
    }

    let public_key = RsaPublicKey::from(private_key);
    let own_fingerprint = kek_fingerprint(&public_key).ok().map(hex::encode);

    let ordered = envelope.slots.iter().enumerate().collect::<Vec<_>>();
    let mut ordered: Vec<_> = ordered;
    if let Some(fp) = &own_fingerprint {
        ordered.sort_by_key(|(_, slot)| if &slot.kek_fingerprint == fp { 0 } else { 1 });
    }

    for (_, slot) in ordered {
        let Ok(ciphertext) = base64::engine::general_purpose::STANDARD.decode(&slot.ciphertext)
        else {
            continue;
        };
        if let Ok(plaintext) = private_key.decrypt(Oaep::new::<Sha256>(), &ciphertext)
            && plaintext.len() == 32
        {
            let mut key = [0u8; 32];
            key.copy_from_slice(&plaintext);
            return Ok(key);
        }
    }

    Err(CryptoError::NoMatchingSlot)
}
