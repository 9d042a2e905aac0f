//! Hybrid classical + post-quantum envelopes
//!
//! ```text
//! inner  = AEAD(ephemeral, plaintext)
//! ss, ct = KEM.encapsulate(recipient.kem_public_key)
//! key    = HKDF(ephemeral || ss, "hybrid-key-{wc}-{wq}")
//! outer  = AEAD(key, inner.ciphertext)
//! wrap   = AEAD(recipient.classical_key, ephemeral)
//! ```
//!
//! Opening needs both the KEM secret key (to recover `ss`) and the classical
//! key (to unwrap the ephemeral key). Either one alone is useless.

use tracing::debug;
use zeroize::Zeroizing;
use zkv_core::config::HybridConfig;
use zkv_core::types::{
    now_millis, EncryptionResult, HybridEncryptionResult, InnerLayer, KeyInfo,
    PostQuantumEnvelope,
};
use zkv_core::{CryptoError, CryptoResult, ErrorCode, ZkvConfig, AEAD_ALGORITHM, FORMAT_VERSION};

use crate::cipher;
use crate::kem::{Kem, KemKeyPair, MlKem768};
use crate::keys::{hkdf_expand, ClassicalKey, EphemeralKey};

const INNER_LABEL: &str = "hybrid-inner";
const OUTER_LABEL: &str = "hybrid-outer";
const WRAP_LABEL: &str = "hybrid-ephemeral";

/// Classical key plus KEM key pair
#[derive(Debug, Clone)]
pub struct HybridKeyPair {
    classical_key: ClassicalKey,
    kem: KemKeyPair,
}

impl HybridKeyPair {
    pub fn classical_key(&self) -> &ClassicalKey {
        &self.classical_key
    }

    pub fn kem_key_pair(&self) -> &KemKeyPair {
        &self.kem
    }

    /// What a sender needs to seal for this key pair
    pub fn recipient(&self) -> HybridRecipient {
        HybridRecipient::new(self.kem.public_key.clone(), self.classical_key.clone())
    }

    /// What the holder needs to open envelopes
    pub fn private_key(&self) -> HybridPrivateKey {
        HybridPrivateKey::new(self.kem.secret_key.to_vec(), self.classical_key.clone())
    }
}

/// Sealing side: the KEM public key and the shared classical key
#[derive(Debug, Clone)]
pub struct HybridRecipient {
    pub kem_public_key: Vec<u8>,
    pub classical_key: ClassicalKey,
}

impl HybridRecipient {
    pub fn new(kem_public_key: Vec<u8>, classical_key: ClassicalKey) -> Self {
        Self {
            kem_public_key,
            classical_key,
        }
    }
}

/// Opening side: the KEM secret key and the classical key
#[derive(Clone)]
pub struct HybridPrivateKey {
    pub kem_secret_key: Zeroizing<Vec<u8>>,
    pub classical_key: ClassicalKey,
}

impl HybridPrivateKey {
    pub fn new(kem_secret_key: Vec<u8>, classical_key: ClassicalKey) -> Self {
        Self {
            kem_secret_key: Zeroizing::new(kem_secret_key),
            classical_key,
        }
    }
}

impl std::fmt::Debug for HybridPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridPrivateKey")
            .field("kem_secret_key", &"[REDACTED]")
            .field("classical_key", &self.classical_key)
            .finish()
    }
}

/// Seals and opens hybrid envelopes under one agreed weight configuration
#[derive(Debug, Clone)]
pub struct HybridComposer<K: Kem = MlKem768> {
    kem: K,
    weights: HybridConfig,
    version: u32,
}

impl HybridComposer<MlKem768> {
    pub fn new(config: &ZkvConfig) -> CryptoResult<Self> {
        Self::with_kem(MlKem768::with_params(&config.kem)?, config)
    }
}

impl<K: Kem> HybridComposer<K> {
    pub fn with_kem(kem: K, config: &ZkvConfig) -> CryptoResult<Self> {
        config.validate()?;
        if kem.params() != &config.kem {
            return Err(CryptoError::new(
                ErrorCode::UnsupportedAlgorithm,
                format!(
                    "KEM {} does not satisfy configured {}",
                    kem.algorithm(),
                    config.kem.algorithm
                ),
            ));
        }
        Ok(Self {
            kem,
            weights: config.hybrid.clone(),
            version: config.format_version,
        })
    }

    /// Envelope algorithm identifier, e.g. `xchacha20-poly1305+ML-KEM-768`
    pub fn algorithm(&self) -> String {
        format!("{AEAD_ALGORITHM}+{}", self.kem.algorithm())
    }

    pub fn generate_key_pair(&self) -> CryptoResult<HybridKeyPair> {
        Ok(HybridKeyPair {
            classical_key: ClassicalKey::generate(),
            kem: self.kem.generate_key_pair()?,
        })
    }

    pub fn encrypt(
        &self,
        plaintext: &[u8],
        recipient: &HybridRecipient,
        context: &[u8],
    ) -> CryptoResult<HybridEncryptionResult> {
        let ephemeral = EphemeralKey::generate();
        let inner = cipher::encrypt(plaintext, ephemeral.as_bytes(), &layer_aad(INNER_LABEL, context, &[]))?;

        let encapsulation = self.kem.encapsulate(&recipient.kem_public_key)?;
        let kem_ct = &encapsulation.ciphertext;
        let combined = self.combine(&ephemeral, &encapsulation.shared_secret)?;

        let outer = cipher::encrypt(&inner.ciphertext, &combined, &layer_aad(OUTER_LABEL, context, kem_ct))?;
        let wrapped = cipher::encrypt(
            ephemeral.as_bytes(),
            recipient.classical_key.as_bytes(),
            &layer_aad(WRAP_LABEL, context, kem_ct),
        )?;

        debug!(bytes = plaintext.len(), kem = self.kem.algorithm(), "hybrid envelope sealed");

        Ok(HybridEncryptionResult {
            version: self.version,
            classical: outer,
            inner: InnerLayer {
                nonce: inner.nonce,
                auth_tag: inner.auth_tag,
            },
            post_quantum: PostQuantumEnvelope {
                kem_algorithm: self.kem.algorithm().to_string(),
                ciphertext: encapsulation.ciphertext,
                wrapped_ephemeral_key: wrapped,
            },
            key_info: KeyInfo {
                classical_weight: self.weights.classical_weight,
                quantum_weight: self.weights.quantum_weight,
                algorithm: self.algorithm(),
            },
            algorithm: self.algorithm(),
            timestamp: now_millis(),
        })
    }

    /// Open an envelope. Each stage fails with its own code and nothing is
    /// returned unless every layer authenticates.
    pub fn decrypt(
        &self,
        envelope: &HybridEncryptionResult,
        private_key: &HybridPrivateKey,
        context: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        self.check_envelope(envelope)?;
        let pq = &envelope.post_quantum;

        let shared_secret = self
            .kem
            .decapsulate(&private_key.kem_secret_key, &pq.ciphertext)?;

        let ephemeral = cipher::decrypt(
            &pq.wrapped_ephemeral_key,
            private_key.classical_key.as_bytes(),
            &layer_aad(WRAP_LABEL, context, &pq.ciphertext),
        )
        .map(Zeroizing::new)
        .and_then(|bytes| EphemeralKey::from_slice(&bytes))
        .map_err(stage(ErrorCode::EphemeralKeyUnwrapFailed))?;

        let combined = self.combine(&ephemeral, &shared_secret)?;
        let inner_ciphertext = cipher::decrypt(
            &envelope.classical,
            &combined,
            &layer_aad(OUTER_LABEL, context, &pq.ciphertext),
        )
        .map_err(stage(ErrorCode::HybridOuterDecryptFailed))?;

        let inner = EncryptionResult {
            ciphertext: inner_ciphertext,
            nonce: envelope.inner.nonce.clone(),
            auth_tag: envelope.inner.auth_tag.clone(),
            algorithm: AEAD_ALGORITHM.to_string(),
            timestamp: envelope.timestamp,
        };
        let plaintext = cipher::decrypt(&inner, ephemeral.as_bytes(), &layer_aad(INNER_LABEL, context, &[]))
            .map_err(stage(ErrorCode::HybridInnerDecryptFailed))?;

        debug!(bytes = plaintext.len(), "hybrid envelope opened");
        Ok(plaintext)
    }

    fn check_envelope(&self, envelope: &HybridEncryptionResult) -> CryptoResult<()> {
        if envelope.version == 0 || envelope.version > FORMAT_VERSION {
            return Err(CryptoError::new(
                ErrorCode::UnsupportedVersion,
                format!("envelope version {} not supported", envelope.version),
            ));
        }
        if envelope.algorithm != self.algorithm()
            || envelope.post_quantum.kem_algorithm != self.kem.algorithm()
        {
            return Err(CryptoError::new(
                ErrorCode::UnsupportedAlgorithm,
                format!(
                    "envelope uses {} / {}, expected {}",
                    envelope.algorithm,
                    envelope.post_quantum.kem_algorithm,
                    self.algorithm()
                ),
            ));
        }
        let info = &envelope.key_info;
        if info.classical_weight != self.weights.classical_weight
            || info.quantum_weight != self.weights.quantum_weight
        {
            return Err(CryptoError::new(
                ErrorCode::HybridConfigMismatch,
                format!(
                    "envelope weights {}/{} differ from configured {}/{}",
                    info.classical_weight,
                    info.quantum_weight,
                    self.weights.classical_weight,
                    self.weights.quantum_weight
                ),
            ));
        }
        Ok(())
    }

    fn combine(&self, ephemeral: &EphemeralKey, shared_secret: &[u8]) -> CryptoResult<Zeroizing<[u8; 32]>> {
        let mut ikm = Zeroizing::new(Vec::with_capacity(32 + shared_secret.len()));
        ikm.extend_from_slice(ephemeral.as_bytes());
        ikm.extend_from_slice(shared_secret);
        let info = format!(
            "hybrid-key-{}-{}",
            self.weights.classical_weight, self.weights.quantum_weight
        );
        hkdf_expand(&ikm, info.as_bytes())
    }
}

fn layer_aad(label: &str, context: &[u8], kem_ciphertext: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(label.len() + 1 + context.len() + kem_ciphertext.len());
    aad.extend_from_slice(label.as_bytes());
    aad.push(0);
    aad.extend_from_slice(context);
    aad.extend_from_slice(kem_ciphertext);
    aad
}

fn stage(code: ErrorCode) -> impl FnOnce(CryptoError) -> CryptoError {
    move |e| CryptoError::new(code, format!("{} ({})", e.message(), e.code()))
}
