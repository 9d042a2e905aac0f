//! Key hierarchy: account key → item key → field / chunk keys
//!
//! All derivations are HKDF-SHA256 expansions keyed by the parent secret, with
//! the info string carrying the domain-separation label. Identical inputs give
//! identical keys, which is what lets decryption rebuild the key used to encrypt.

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, Zeroizing};
use zkv_core::{CryptoError, CryptoResult, ErrorCode};

use crate::KEY_SIZE;

macro_rules! secret_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            bytes: [u8; KEY_SIZE],
        }

        impl $name {
            pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
                Self { bytes }
            }

            /// Copy a key out of a slice, rejecting anything but 32 bytes.
            pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
                let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
                    CryptoError::new(
                        ErrorCode::InvalidKeyLength,
                        format!(
                            concat!(stringify!($name), " must be {} bytes, got {}"),
                            KEY_SIZE,
                            bytes.len()
                        ),
                    )
                })?;
                Ok(Self { bytes: array })
            }

            pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
                &self.bytes
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.bytes.zeroize();
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("bytes", &"[REDACTED]")
                    .finish()
            }
        }
    };
}

secret_key!(
    /// Root of trust for one user. Never persisted by the core.
    AccountKey
);
secret_key!(
    /// Per-item key, recomputed on demand from the account key.
    ItemKey
);
secret_key!(
    /// Single-use key scoped to one field of one item.
    FieldKey
);
secret_key!(
    /// Single-use key scoped to one chunk position of one item or stream.
    ChunkKey
);
secret_key!(
    /// Long-term classical half of a hybrid key pair, shared out of band.
    ClassicalKey
);
secret_key!(
    /// Per-message key of a hybrid envelope's inner layer.
    EphemeralKey
);

impl AccountKey {
    /// Generate a random 256-bit account key.
    pub fn generate() -> Self {
        Self::from_bytes(random_key())
    }
}

impl ClassicalKey {
    pub fn generate() -> Self {
        Self::from_bytes(random_key())
    }
}

impl EphemeralKey {
    pub fn generate() -> Self {
        Self::from_bytes(random_key())
    }
}

fn random_key() -> [u8; KEY_SIZE] {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// What kind of vault object an item key protects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Password,
    File,
    /// Ad-hoc chunked stream addressed by session id
    Stream,
}

impl ItemKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::File => "file",
            Self::Stream => "stream",
        }
    }
}

/// A sensitive field of a password item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName<'a> {
    Username,
    Password,
    Notes,
    Custom(&'a str),
}

impl FieldName<'_> {
    pub fn label(&self) -> String {
        match self {
            Self::Username => "username".into(),
            Self::Password => "password".into(),
            Self::Notes => "notes".into(),
            Self::Custom(name) => format!("custom_{name}"),
        }
    }
}

/// HKDF-SHA256 expansion of arbitrary input key material.
pub(crate) fn hkdf_expand(ikm: &[u8], info: &[u8]) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hkdf.expand(info, okm.as_mut()).map_err(|e| {
        CryptoError::new(ErrorCode::KeyDerivationFailed, format!("HKDF expand failed: {e}"))
    })?;
    Ok(okm)
}

/// Derive a child key from a 32-byte parent secret and a label.
pub(crate) fn hkdf_derive(parent: &[u8], info: &str) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
    if parent.len() != KEY_SIZE {
        return Err(CryptoError::new(
            ErrorCode::KeyDerivationFailed,
            format!("parent key must be {KEY_SIZE} bytes, got {}", parent.len()),
        ));
    }
    hkdf_expand(parent, info.as_bytes())
}

pub fn derive_item_key(account: &AccountKey, item_id: &str, kind: ItemKind) -> CryptoResult<ItemKey> {
    let okm = hkdf_derive(account.as_bytes(), &format!("item-{}-{item_id}", kind.label()))?;
    Ok(ItemKey::from_bytes(*okm))
}

pub fn derive_field_key(item: &ItemKey, field: &FieldName<'_>) -> CryptoResult<FieldKey> {
    let okm = hkdf_derive(item.as_bytes(), &format!("field-{}", field.label()))?;
    Ok(FieldKey::from_bytes(*okm))
}

/// Chunk keys bind both the position and the chunk count, so re-chunking the
/// same item at a different size never reuses a key.
pub fn derive_chunk_key(item: &ItemKey, chunk_index: u64, total_chunks: u64) -> CryptoResult<ChunkKey> {
    let okm = hkdf_derive(
        item.as_bytes(),
        &format!("chunk-{chunk_index}-of-{total_chunks}"),
    )?;
    Ok(ChunkKey::from_bytes(*okm))
}
