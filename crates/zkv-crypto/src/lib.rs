//! zkv-crypto: client-side zero-knowledge encryption core for zkvault
//!
//! Architecture: derive-per-use keys, chunk-then-encrypt with XChaCha20-Poly1305
//!
//! Key hierarchy:
//! ```text
//! Account Key (256-bit, caller-supplied or Argon2id from passphrase)
//!   └── Item Key   HKDF(account, "item-{kind}-{itemId}")
//!       ├── Field Key  HKDF(item, "field-{name}" | "field-custom_{name}")
//!       └── Chunk Key  HKDF(item, "chunk-{index}-of-{totalChunks}")
//!
//! Hybrid envelope:
//!   ephemeral key ──AEAD──> inner ciphertext
//!   HKDF(ephemeral || ML-KEM shared secret, "hybrid-key-{wc}-{wq}") ──AEAD──> outer ciphertext
//!   ephemeral key wrapped under the recipient's classical key
//! ```
//!
//! Every derived key is zeroized on drop, so it is wiped on every exit path of
//! the call that consumed it. The crate performs no I/O.

pub mod cipher;
pub mod file;
pub mod hybrid;
pub mod item;
pub mod kdf;
pub mod kem;
pub mod keys;
pub mod session;
pub mod stream;

pub use file::{DecryptFileOptions, EncryptFileOptions, FileEncryptor};
pub use hybrid::{HybridComposer, HybridKeyPair, HybridPrivateKey, HybridRecipient};
pub use item::{
    decrypt_password_item, encrypt_password_item, update_password_item,
    validate_encrypted_password_item, validate_password_item,
};
pub use kdf::{derive_account_key, generate_salt};
pub use kem::{Encapsulation, Kem, KemKeyPair, MlKem768};
pub use keys::{
    derive_chunk_key, derive_field_key, derive_item_key, AccountKey, ChunkKey, ClassicalKey,
    FieldKey, FieldName, ItemKey, ItemKind,
};
pub use session::{SessionHandle, SessionTable};
pub use stream::{decrypt_from_chunks, encrypt_in_chunks, DecryptionStream, EncryptionStream, StreamState};

/// Size of every symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
