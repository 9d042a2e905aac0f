//! Post-quantum key encapsulation
//!
//! [`Kem`] is the seam the hybrid composer encapsulates through. [`MlKem768`]
//! is the production implementation (FIPS 203, RustCrypto `ml-kem`):
//!
//! - Public key: 1184 bytes
//! - Secret key: 2400 bytes
//! - Ciphertext: 1088 bytes
//! - Shared secret: 32 bytes
//!
//! Every length is checked before the KEM is touched, so malformed input
//! surfaces as `INVALID_KEM_KEY` / `INVALID_KEM_CIPHERTEXT` rather than a
//! panic inside the library. Decapsulating with the wrong secret key does not
//! fail here: ML-KEM's implicit rejection returns an unrelated secret.

use kem::{Decapsulate, Encapsulate};
use ml_kem::kem::{DecapsulationKey, EncapsulationKey};
use ml_kem::{EncodedSizeUser, KemCore, MlKem768Params};
use std::fmt;
use zeroize::Zeroizing;
use zkv_core::config::KemConfig;
use zkv_core::{CryptoError, CryptoResult, ErrorCode};

const PUBLIC_KEY_LEN: usize = 1184;
const SECRET_KEY_LEN: usize = 2400;
const CIPHERTEXT_LEN: usize = 1088;
const SHARED_SECRET_LEN: usize = 32;

/// Public/secret key bytes of a KEM key pair
#[derive(Clone)]
pub struct KemKeyPair {
    pub public_key: Vec<u8>,
    pub secret_key: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for KemKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KemKeyPair")
            .field("public_key_len", &self.public_key.len())
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Result of encapsulating against a public key
pub struct Encapsulation {
    /// Sent to the recipient
    pub ciphertext: Vec<u8>,
    /// Kept by the sender, never sent
    pub shared_secret: Zeroizing<Vec<u8>>,
}

pub trait Kem: Send + Sync {
    /// Algorithm identifier recorded in envelopes
    fn algorithm(&self) -> &str;

    /// Byte-length contract this implementation enforces
    fn params(&self) -> &KemConfig;

    fn generate_key_pair(&self) -> CryptoResult<KemKeyPair>;

    fn encapsulate(&self, public_key: &[u8]) -> CryptoResult<Encapsulation>;

    fn decapsulate(&self, secret_key: &[u8], ciphertext: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>>;
}

/// ML-KEM-768 (NIST security level 3)
#[derive(Debug, Clone)]
pub struct MlKem768 {
    params: KemConfig,
}

impl Default for MlKem768 {
    fn default() -> Self {
        Self::new()
    }
}

impl MlKem768 {
    pub fn new() -> Self {
        Self {
            params: KemConfig {
                algorithm: "ML-KEM-768".into(),
                public_key_len: PUBLIC_KEY_LEN,
                secret_key_len: SECRET_KEY_LEN,
                ciphertext_len: CIPHERTEXT_LEN,
                shared_secret_len: SHARED_SECRET_LEN,
            },
        }
    }

    /// Build from configuration, refusing a contract ML-KEM-768 cannot meet.
    pub fn with_params(config: &KemConfig) -> CryptoResult<Self> {
        let kem = Self::new();
        if *config != kem.params {
            return Err(CryptoError::new(
                ErrorCode::UnsupportedAlgorithm,
                format!(
                    "configured KEM {} ({}/{}/{}/{}) is not ML-KEM-768",
                    config.algorithm,
                    config.public_key_len,
                    config.secret_key_len,
                    config.ciphertext_len,
                    config.shared_secret_len
                ),
            ));
        }
        Ok(kem)
    }
}

impl Kem for MlKem768 {
    fn algorithm(&self) -> &str {
        &self.params.algorithm
    }

    fn params(&self) -> &KemConfig {
        &self.params
    }

    fn generate_key_pair(&self) -> CryptoResult<KemKeyPair> {
        let mut rng = rand::rngs::OsRng;
        let (dk, ek) = ml_kem::MlKem768::generate(&mut rng);

        Ok(KemKeyPair {
            public_key: ek.as_bytes().to_vec(),
            secret_key: Zeroizing::new(dk.as_bytes().to_vec()),
        })
    }

    fn encapsulate(&self, public_key: &[u8]) -> CryptoResult<Encapsulation> {
        let ek_bytes: &[u8; PUBLIC_KEY_LEN] = public_key.try_into().map_err(|_| {
            CryptoError::new(
                ErrorCode::InvalidKemKey,
                format!(
                    "public key must be {PUBLIC_KEY_LEN} bytes, got {}",
                    public_key.len()
                ),
            )
        })?;

        let ek = EncapsulationKey::<MlKem768Params>::from_bytes(&(*ek_bytes).into());
        let mut rng = rand::rngs::OsRng;
        let (ciphertext, shared_secret) = ek.encapsulate(&mut rng).map_err(|e| {
            CryptoError::new(
                ErrorCode::KemEncapsulationFailed,
                format!("ML-KEM encapsulation failed: {e:?}"),
            )
        })?;

        Ok(Encapsulation {
            ciphertext: ciphertext.to_vec(),
            shared_secret: Zeroizing::new(shared_secret.to_vec()),
        })
    }

    fn decapsulate(&self, secret_key: &[u8], ciphertext: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let dk_bytes: &[u8; SECRET_KEY_LEN] = secret_key.try_into().map_err(|_| {
            CryptoError::new(
                ErrorCode::InvalidKemKey,
                format!(
                    "secret key must be {SECRET_KEY_LEN} bytes, got {}",
                    secret_key.len()
                ),
            )
        })?;
        let ct_bytes: &[u8; CIPHERTEXT_LEN] = ciphertext.try_into().map_err(|_| {
            CryptoError::new(
                ErrorCode::InvalidKemCiphertext,
                format!(
                    "ciphertext must be {CIPHERTEXT_LEN} bytes, got {}",
                    ciphertext.len()
                ),
            )
        })?;

        let dk = DecapsulationKey::<MlKem768Params>::from_bytes(&(*dk_bytes).into());
        let shared_secret = dk.decapsulate(&(*ct_bytes).into()).map_err(|e| {
            CryptoError::new(
                ErrorCode::KemDecapsulationFailed,
                format!("ML-KEM decapsulation failed: {e:?}"),
            )
        })?;

        Ok(Zeroizing::new(shared_secret.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_sizes() {
        let kem = MlKem768::new();
        let pair = kem.generate_key_pair().unwrap();
        assert_eq!(pair.public_key.len(), PUBLIC_KEY_LEN);
        assert_eq!(pair.secret_key.len(), SECRET_KEY_LEN);

        let enc = kem.encapsulate(&pair.public_key).unwrap();
        assert_eq!(enc.ciphertext.len(), CIPHERTEXT_LEN);
        assert_eq!(enc.shared_secret.len(), SHARED_SECRET_LEN);
    }

    #[test]
    fn test_encapsulate_decapsulate_agree() {
        let kem = MlKem768::new();
        let pair = kem.generate_key_pair().unwrap();
        let enc = kem.encapsulate(&pair.public_key).unwrap();
        let secret = kem.decapsulate(&pair.secret_key, &enc.ciphertext).unwrap();
        assert_eq!(*secret, *enc.shared_secret);
    }

    #[test]
    fn test_wrong_secret_key_yields_different_secret() {
        let kem = MlKem768::new();
        let pair = kem.generate_key_pair().unwrap();
        let other = kem.generate_key_pair().unwrap();
        let enc = kem.encapsulate(&pair.public_key).unwrap();
        let secret = kem.decapsulate(&other.secret_key, &enc.ciphertext).unwrap();
        assert_ne!(*secret, *enc.shared_secret);
    }

    #[test]
    fn test_length_validation() {
        let kem = MlKem768::new();
        let pair = kem.generate_key_pair().unwrap();

        let err = kem.encapsulate(&pair.public_key[..100]).err().unwrap();
        assert_eq!(err.code(), ErrorCode::InvalidKemKey);

        let err = kem.decapsulate(&pair.secret_key[..10], &[0u8; CIPHERTEXT_LEN]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidKemKey);

        let err = kem.decapsulate(&pair.secret_key, &[0u8; 12]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidKemCiphertext);
    }

    #[test]
    fn test_with_params_rejects_other_contract() {
        assert!(MlKem768::with_params(&KemConfig::default()).is_ok());

        let config = KemConfig {
            algorithm: "ML-KEM-1024".into(),
            public_key_len: 1568,
            secret_key_len: 3168,
            ciphertext_len: 1568,
            shared_secret_len: 32,
        };
        assert_eq!(
            MlKem768::with_params(&config).unwrap_err().code(),
            ErrorCode::UnsupportedAlgorithm
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let pair = MlKem768::new().generate_key_pair().unwrap();
        assert!(format!("{pair:?}").contains("REDACTED"));
    }
}
