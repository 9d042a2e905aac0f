//! Persisted and returned structures
//!
//! Everything here is JSON-safe (byte fields are base64 strings) and uses
//! camelCase field names, matching what the upload pipeline and the vault item
//! store persist verbatim.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::encoding::b64;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Digest used for chunk and whole-file integrity hashes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }
}

/// Output of one AEAD call. Round-trips through decrypt bit-for-bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionResult {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "b64")]
    pub auth_tag: Vec<u8>,
    pub algorithm: String,
    pub timestamp: u64,
}

/// Per-chunk record. Must be preserved byte-for-byte between encrypt and decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Zero-based position in the session
    pub index: u64,
    /// Plaintext length of this chunk
    pub original_size: u64,
    /// Ciphertext length (equals `original_size`; nonce and tag travel separately)
    pub encrypted_size: u64,
    /// Hex digest of the plaintext chunk
    pub integrity_digest: String,
    pub timestamp: u64,
}

/// Session-level description of a chunked encryption.
///
/// `processed_chunks == total_chunks` iff the session finalized successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedEncryptionSession {
    pub version: u32,
    pub session_id: String,
    pub total_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u64,
    pub processed_chunks: u64,
    pub hash_algorithm: HashAlgorithm,
}

/// One encrypted chunk together with its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedChunk {
    pub metadata: ChunkMetadata,
    pub payload: EncryptionResult,
}

/// File chunks are stream chunks; the alias keeps file-level signatures readable.
pub type FileChunk = EncryptedChunk;

/// Output of the buffered wrapper around the streaming engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedCiphertext {
    pub session: ChunkedEncryptionSession,
    pub chunks: Vec<EncryptedChunk>,
}

/// Chunk-count progress of a stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub processed: u64,
    pub total: u64,
    pub percentage: f64,
}

impl Progress {
    pub fn new(processed: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            processed as f64 * 100.0 / total as f64
        };
        Self {
            processed,
            total,
            percentage,
        }
    }
}

/// Byte-level progress reported by the file orchestrator after each chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProgress {
    /// Plaintext bytes processed so far
    pub processed: u64,
    /// Total plaintext bytes
    pub total: u64,
    pub percentage: f64,
    /// One-based number of the chunk just processed
    pub current_chunk: u64,
    pub total_chunks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedFileMetadata {
    pub filename: String,
    pub original_size: u64,
    pub mime_type: String,
    pub chunk_count: u64,
    pub chunk_size: u64,
    /// Hex digest of the whole plaintext
    pub file_hash: String,
    pub hash_algorithm: HashAlgorithm,
    pub encrypted_at: u64,
    pub version: u32,
}

/// `chunks.len() == metadata.chunk_count` and indices are exactly `0..chunk_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedFile {
    pub metadata: EncryptedFileMetadata,
    pub chunks: Vec<FileChunk>,
}

/// Nonce and tag of the inner (ephemeral-key) layer of a hybrid envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerLayer {
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "b64")]
    pub auth_tag: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostQuantumEnvelope {
    pub kem_algorithm: String,
    /// KEM ciphertext; decapsulates to the shared secret
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    /// Ephemeral classical key sealed under the recipient's classical key
    pub wrapped_ephemeral_key: EncryptionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub classical_weight: f64,
    pub quantum_weight: f64,
    pub algorithm: String,
}

/// Self-describing hybrid envelope, openable only by the KEM private-key holder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridEncryptionResult {
    pub version: u32,
    /// Outer layer: the inner ciphertext sealed under the combined key
    pub classical: EncryptionResult,
    pub inner: InnerLayer,
    pub post_quantum: PostQuantumEnvelope,
    pub key_info: KeyInfo,
    pub algorithm: String,
    pub timestamp: u64,
}

/// Plaintext password item as handed over by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<BTreeMap<String, String>>,
    pub created_at: u64,
    pub modified_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Field-level changes for an update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordItemPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the URL
    pub url: Option<Option<String>>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `Some(None)` clears the notes
    pub notes: Option<Option<String>>,
    /// Entries to insert or overwrite
    pub set_custom_fields: BTreeMap<String, String>,
    /// Custom field names to remove
    pub remove_custom_fields: Vec<String>,
    pub tags: Option<Option<Vec<String>>>,
}

/// Non-sensitive item metadata, stored in clear for upstream search and sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: u64,
    pub modified_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedFields {
    pub username: EncryptionResult,
    pub password: EncryptionResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<EncryptionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<BTreeMap<String, EncryptionResult>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPasswordItem {
    pub metadata: ItemMetadata,
    pub encrypted_fields: EncryptedFields,
    pub version: u32,
}
