//! Content digests for chunk and whole-file integrity
//!
//! Digests are computed over plaintext and stored as lowercase hex. They are
//! checked after AEAD decryption succeeds, so a wrong-key or substituted chunk
//! surfaces as an integrity failure distinct from a tag failure.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zkv_core::types::HashAlgorithm;

/// Hex digest of `data` under `algorithm`.
pub fn digest_hex(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Blake3 => blake3::hash(data).to_hex().to_string(),
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
    }
}

/// Constant-time comparison of a freshly computed digest against a stored one.
///
/// A stored digest that is not valid hex never matches.
pub fn digests_match(computed_hex: &str, stored_hex: &str) -> bool {
    let (Ok(computed), Ok(stored)) = (hex::decode(computed_hex), hex::decode(stored_hex)) else {
        return false;
    };
    computed.len() == stored.len() && bool::from(computed.ct_eq(&stored))
}

/// Incremental hasher for whole-file digests fed chunk by chunk.
pub enum ContentHasher {
    Blake3(Box<blake3::Hasher>),
    Sha256(Sha256),
}

impl ContentHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
            Self::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}
