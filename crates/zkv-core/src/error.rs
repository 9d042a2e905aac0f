use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

pub type ZkvResult<T> = Result<T, ZkvError>;

/// Broad failure class of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad input caught before any cryptographic call. Recoverable by fixing the input.
    Validation,
    /// AEAD or KEM failure. Fails closed.
    Cryptographic,
    /// Digest mismatch on data that otherwise decrypted.
    Integrity,
    /// Misuse of the streaming contract. Fatal to the session.
    Protocol,
}

/// Machine-readable error code. Callers branch on this, never on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidKeyLength,
    InvalidSize,
    InvalidChunkSize,
    ChunkSizeMismatch,
    KeyDerivationFailed,
    EncryptionFailed,
    DecryptionFailed,
    AuthTagInvalid,
    ChunkIntegrityFailed,
    FileIntegrityFailed,
    ChunkOutOfOrder,
    MissingChunk,
    IncompleteEncryption,
    IncompleteDecryption,
    SessionClosed,
    SessionNotFound,
    EmptyFile,
    FileTooLarge,
    InvalidKemKey,
    InvalidKemCiphertext,
    KemEncapsulationFailed,
    KemDecapsulationFailed,
    EphemeralKeyUnwrapFailed,
    HybridConfigMismatch,
    HybridOuterDecryptFailed,
    HybridInnerDecryptFailed,
    InvalidItem,
    InvalidEncryptedItem,
    UnsupportedVersion,
    UnsupportedAlgorithm,
    InvalidConfig,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidKeyLength => "INVALID_KEY_LENGTH",
            Self::InvalidSize => "INVALID_SIZE",
            Self::InvalidChunkSize => "INVALID_CHUNK_SIZE",
            Self::ChunkSizeMismatch => "CHUNK_SIZE_MISMATCH",
            Self::KeyDerivationFailed => "KEY_DERIVATION_FAILED",
            Self::EncryptionFailed => "ENCRYPTION_FAILED",
            Self::DecryptionFailed => "DECRYPTION_FAILED",
            Self::AuthTagInvalid => "AUTH_TAG_INVALID",
            Self::ChunkIntegrityFailed => "CHUNK_INTEGRITY_FAILED",
            Self::FileIntegrityFailed => "FILE_INTEGRITY_FAILED",
            Self::ChunkOutOfOrder => "CHUNK_OUT_OF_ORDER",
            Self::MissingChunk => "MISSING_CHUNK",
            Self::IncompleteEncryption => "INCOMPLETE_ENCRYPTION",
            Self::IncompleteDecryption => "INCOMPLETE_DECRYPTION",
            Self::SessionClosed => "SESSION_CLOSED",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::EmptyFile => "EMPTY_FILE",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::InvalidKemKey => "INVALID_KEM_KEY",
            Self::InvalidKemCiphertext => "INVALID_KEM_CIPHERTEXT",
            Self::KemEncapsulationFailed => "KEM_ENCAPSULATION_FAILED",
            Self::KemDecapsulationFailed => "KEM_DECAPSULATION_FAILED",
            Self::EphemeralKeyUnwrapFailed => "EPHEMERAL_KEY_UNWRAP_FAILED",
            Self::HybridConfigMismatch => "HYBRID_CONFIG_MISMATCH",
            Self::HybridOuterDecryptFailed => "HYBRID_OUTER_DECRYPT_FAILED",
            Self::HybridInnerDecryptFailed => "HYBRID_INNER_DECRYPT_FAILED",
            Self::InvalidItem => "INVALID_ITEM",
            Self::InvalidEncryptedItem => "INVALID_ENCRYPTED_ITEM",
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
            Self::UnsupportedAlgorithm => "UNSUPPORTED_ALGORITHM",
            Self::InvalidConfig => "INVALID_CONFIG",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidKeyLength
            | Self::InvalidSize
            | Self::InvalidChunkSize
            | Self::ChunkSizeMismatch
            | Self::EmptyFile
            | Self::FileTooLarge
            | Self::InvalidKemKey
            | Self::InvalidKemCiphertext
            | Self::HybridConfigMismatch
            | Self::InvalidItem
            | Self::InvalidEncryptedItem
            | Self::UnsupportedVersion
            | Self::UnsupportedAlgorithm
            | Self::InvalidConfig => ErrorCategory::Validation,

            Self::KeyDerivationFailed
            | Self::EncryptionFailed
            | Self::DecryptionFailed
            | Self::AuthTagInvalid
            | Self::KemEncapsulationFailed
            | Self::KemDecapsulationFailed
            | Self::EphemeralKeyUnwrapFailed
            | Self::HybridOuterDecryptFailed
            | Self::HybridInnerDecryptFailed => ErrorCategory::Cryptographic,

            Self::ChunkIntegrityFailed | Self::FileIntegrityFailed => ErrorCategory::Integrity,

            Self::ChunkOutOfOrder
            | Self::MissingChunk
            | Self::IncompleteEncryption
            | Self::IncompleteDecryption
            | Self::SessionClosed
            | Self::SessionNotFound => ErrorCategory::Protocol,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every core operation: a stable code plus a readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CryptoError {
    code: ErrorCode,
    message: String,
}

impl CryptoError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum ZkvError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::ChunkOutOfOrder).unwrap();
        assert_eq!(json, "\"CHUNK_OUT_OF_ORDER\"");
        assert_eq!(ErrorCode::ChunkOutOfOrder.as_str(), "CHUNK_OUT_OF_ORDER");
    }

    #[test]
    fn as_str_matches_serde_name() {
        for code in [
            ErrorCode::KeyDerivationFailed,
            ErrorCode::AuthTagInvalid,
            ErrorCode::HybridOuterDecryptFailed,
            ErrorCode::EphemeralKeyUnwrapFailed,
            ErrorCode::InvalidKemCiphertext,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json.trim_matches('"'), code.as_str());
        }
    }

    #[test]
    fn integrity_is_distinct_from_cryptographic() {
        assert_eq!(
            ErrorCode::ChunkIntegrityFailed.category(),
            ErrorCategory::Integrity
        );
        assert_eq!(
            ErrorCode::AuthTagInvalid.category(),
            ErrorCategory::Cryptographic
        );
        assert_eq!(ErrorCode::MissingChunk.category(), ErrorCategory::Protocol);
        assert_eq!(ErrorCode::EmptyFile.category(), ErrorCategory::Validation);
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = CryptoError::new(ErrorCode::MissingChunk, "chunk 3 absent");
        assert_eq!(err.to_string(), "MISSING_CHUNK: chunk 3 absent");
        assert_eq!(err.code(), ErrorCode::MissingChunk);
        assert_eq!(err.message(), "chunk 3 absent");
    }
}
