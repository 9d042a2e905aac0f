//! XChaCha20-Poly1305 primitive adapter
//!
//! One call, one fresh 192-bit random nonce. The tag is detached so the
//! result carries ciphertext, nonce and tag as separate fields:
//! ```text
//! EncryptionResult { ciphertext: N bytes, nonce: 24 bytes, authTag: 16 bytes }
//! ```
//! Associated data (the caller's context plus positional binding) is never
//! stored; the decrypting side must rebuild it exactly.

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    Tag, XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroize;
use zkv_core::types::{now_millis, EncryptionResult};
use zkv_core::{CryptoError, CryptoResult, ErrorCode, AEAD_ALGORITHM};

use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_SIZE], aad: &[u8]) -> CryptoResult<EncryptionResult> {
    let cipher = XChaCha20Poly1305::new(key.into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let mut buffer = plaintext.to_vec();
    match cipher.encrypt_in_place_detached(nonce, aad, &mut buffer) {
        Ok(tag) => Ok(EncryptionResult {
            ciphertext: buffer,
            nonce: nonce_bytes.to_vec(),
            auth_tag: tag.to_vec(),
            algorithm: AEAD_ALGORITHM.to_string(),
            timestamp: now_millis(),
        }),
        Err(e) => {
            buffer.zeroize();
            Err(CryptoError::new(
                ErrorCode::EncryptionFailed,
                format!("encryption failed: {e}"),
            ))
        }
    }
}

/// Decrypt and authenticate. Fails closed: no plaintext is ever returned
/// unless the tag verifies.
pub fn decrypt(result: &EncryptionResult, key: &[u8; KEY_SIZE], aad: &[u8]) -> CryptoResult<Vec<u8>> {
    if result.algorithm != AEAD_ALGORITHM {
        return Err(CryptoError::new(
            ErrorCode::UnsupportedAlgorithm,
            format!("unsupported algorithm: {}", result.algorithm),
        ));
    }
    if result.nonce.len() != NONCE_SIZE {
        return Err(CryptoError::new(
            ErrorCode::DecryptionFailed,
            format!("nonce must be {NONCE_SIZE} bytes, got {}", result.nonce.len()),
        ));
    }
    if result.auth_tag.len() != TAG_SIZE {
        return Err(CryptoError::new(
            ErrorCode::DecryptionFailed,
            format!("auth tag must be {TAG_SIZE} bytes, got {}", result.auth_tag.len()),
        ));
    }

    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(&result.nonce);
    let tag = Tag::from_slice(&result.auth_tag);

    let mut buffer = result.ciphertext.clone();
    match cipher.decrypt_in_place_detached(nonce, aad, &mut buffer, tag) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            buffer.zeroize();
            Err(CryptoError::new(
                ErrorCode::AuthTagInvalid,
                "authentication failed",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY: [u8; KEY_SIZE] = [7u8; KEY_SIZE];

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = b"hello, encrypted vault!";

        let result = encrypt(plaintext, &KEY, b"ctx").unwrap();
        assert_eq!(result.nonce.len(), NONCE_SIZE);
        assert_eq!(result.auth_tag.len(), TAG_SIZE);
        assert_eq!(result.ciphertext.len(), plaintext.len());
        assert_ne!(result.ciphertext.as_slice(), plaintext.as_slice());

        let decrypted = decrypt(&result, &KEY, b"ctx").unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let result = encrypt(b"", &KEY, b"").unwrap();
        assert!(decrypt(&result, &KEY, b"").unwrap().is_empty());
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let a = encrypt(b"same", &KEY, b"").unwrap();
        let b = encrypt(b"same", &KEY, b"").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let result = encrypt(b"secret data", &KEY, b"").unwrap();
        let err = decrypt(&result, &[8u8; KEY_SIZE], b"").unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthTagInvalid);
    }

    #[test]
    fn test_decrypt_wrong_context() {
        let result = encrypt(b"secret data", &KEY, b"vault-a").unwrap();
        let err = decrypt(&result, &KEY, b"vault-b").unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthTagInvalid);
    }

    #[test]
    fn test_malformed_nonce_and_tag() {
        let mut result = encrypt(b"x", &KEY, b"").unwrap();
        result.nonce.truncate(12);
        assert_eq!(
            decrypt(&result, &KEY, b"").unwrap_err().code(),
            ErrorCode::DecryptionFailed
        );

        let mut result = encrypt(b"x", &KEY, b"").unwrap();
        result.auth_tag.push(0);
        assert_eq!(
            decrypt(&result, &KEY, b"").unwrap_err().code(),
            ErrorCode::DecryptionFailed
        );
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let mut result = encrypt(b"x", &KEY, b"").unwrap();
        result.algorithm = "aes-128-ecb".into();
        assert_eq!(
            decrypt(&result, &KEY, b"").unwrap_err().code(),
            ErrorCode::UnsupportedAlgorithm
        );
    }

    proptest! {
        #[test]
        fn roundtrip_any_plaintext(
            data in proptest::collection::vec(any::<u8>(), 0..=4096),
            key in any::<[u8; 32]>(),
        ) {
            let result = encrypt(&data, &key, b"prop").unwrap();
            prop_assert_eq!(decrypt(&result, &key, b"prop").unwrap(), data);
        }

        /// Any single bit flip in ciphertext, nonce or tag fails authentication
        #[test]
        fn bit_flip_detected(
            data in proptest::collection::vec(any::<u8>(), 1..=512),
            target in 0usize..3,
            position in any::<usize>(),
            bit in 0u8..8,
        ) {
            let mut result = encrypt(&data, &KEY, b"").unwrap();
            let field = match target {
                0 => &mut result.ciphertext,
                1 => &mut result.nonce,
                _ => &mut result.auth_tag,
            };
            let i = position % field.len();
            field[i] ^= 1 << bit;

            let err = decrypt(&result, &KEY, b"").unwrap_err();
            prop_assert_eq!(err.code(), ErrorCode::AuthTagInvalid);
        }
    }
}
