//! Key derivation: Argon2id passphrase → account key

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;
use zkv_core::config::KdfConfig;
use zkv_core::{CryptoError, CryptoResult, ErrorCode};

use crate::keys::AccountKey;
use crate::KEY_SIZE;

/// Length of the Argon2id salt stored next to passphrase-derived material.
pub const SALT_SIZE: usize = 16;

pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit account key from a passphrase and salt using Argon2id.
///
/// The salt should be randomly generated once per account and stored alongside
/// the encrypted data (it does not need to be secret).
pub fn derive_account_key(
    passphrase: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfConfig,
) -> CryptoResult<AccountKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| {
        CryptoError::new(ErrorCode::InvalidConfig, format!("invalid Argon2id params: {e}"))
    })?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, key.as_mut())
        .map_err(|e| {
            CryptoError::new(ErrorCode::KeyDerivationFailed, format!("Argon2id KDF failed: {e}"))
        })?;

    Ok(AccountKey::from_bytes(*key))
}
