//! Session table: many concurrent streams addressed by id
//!
//! Each entry is an independent stream with its own key material, so entries
//! never interact. The table itself is single-writer; share it behind a
//! mutex if several tasks need it.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;
use uuid::Uuid;
use zkv_core::types::{
    ChunkMetadata, ChunkedEncryptionSession, EncryptedChunk, EncryptionResult, Progress,
};
use zkv_core::{CryptoError, CryptoResult, ErrorCode, ZkvConfig};

use crate::stream::{DecryptionStream, EncryptionStream};

/// Opaque identifier of an open stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
enum Stream {
    Encrypt(EncryptionStream),
    Decrypt(DecryptionStream),
}

#[derive(Debug)]
pub struct SessionTable {
    config: ZkvConfig,
    sessions: HashMap<SessionHandle, Stream>,
}

fn not_found(handle: &SessionHandle, direction: &str) -> CryptoError {
    CryptoError::new(
        ErrorCode::SessionNotFound,
        format!("no open {direction} with handle {handle}"),
    )
}

impl SessionTable {
    pub fn new(config: ZkvConfig) -> CryptoResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sessions: HashMap::new(),
        })
    }

    /// Open an encryption stream. The handle equals the stream's session id.
    pub fn open_encryption(
        &mut self,
        master_key: &[u8],
        total_size: u64,
        chunk_size: usize,
        context: &[u8],
    ) -> CryptoResult<SessionHandle> {
        let stream =
            EncryptionStream::create(master_key, total_size, chunk_size, context, &self.config)?;
        let handle = SessionHandle(stream.session_id().to_string());
        self.sessions.insert(handle.clone(), Stream::Encrypt(stream));
        debug!(session = %handle, open = self.sessions.len(), "encryption session opened");
        Ok(handle)
    }

    /// Open a decryption stream. Handles are fresh, so the same session
    /// record may be decrypted by several streams at once.
    pub fn open_decryption(
        &mut self,
        master_key: &[u8],
        session: &ChunkedEncryptionSession,
        context: &[u8],
    ) -> CryptoResult<SessionHandle> {
        let stream = DecryptionStream::create(master_key, session, context, &self.config)?;
        let handle = SessionHandle(Uuid::new_v4().to_string());
        self.sessions.insert(handle.clone(), Stream::Decrypt(stream));
        debug!(session = %handle, open = self.sessions.len(), "decryption session opened");
        Ok(handle)
    }

    pub fn encrypt_chunk(&mut self, handle: &SessionHandle, data: &[u8]) -> CryptoResult<EncryptedChunk> {
        match self.sessions.get_mut(handle) {
            Some(Stream::Encrypt(stream)) => stream.process_chunk(data),
            _ => Err(not_found(handle, "encryption session")),
        }
    }

    pub fn decrypt_chunk(
        &mut self,
        handle: &SessionHandle,
        payload: &EncryptionResult,
        metadata: &ChunkMetadata,
    ) -> CryptoResult<Vec<u8>> {
        match self.sessions.get_mut(handle) {
            Some(Stream::Decrypt(stream)) => stream.process_chunk(payload, metadata),
            _ => Err(not_found(handle, "decryption session")),
        }
    }

    pub fn progress(&self, handle: &SessionHandle) -> CryptoResult<Progress> {
        match self.sessions.get(handle) {
            Some(Stream::Encrypt(stream)) => Ok(stream.progress()),
            Some(Stream::Decrypt(stream)) => Ok(stream.progress()),
            None => Err(not_found(handle, "session")),
        }
    }

    /// Finalize and remove an encryption session, returning its record.
    ///
    /// The entry is removed whether or not finalization succeeds.
    pub fn finalize_encryption(&mut self, handle: &SessionHandle) -> CryptoResult<ChunkedEncryptionSession> {
        match self.sessions.remove(handle) {
            Some(Stream::Encrypt(mut stream)) => stream.finalize(),
            Some(other) => {
                self.sessions.insert(handle.clone(), other);
                Err(not_found(handle, "encryption session"))
            }
            None => Err(not_found(handle, "encryption session")),
        }
    }

    /// Finalize and remove a decryption session.
    pub fn finalize_decryption(&mut self, handle: &SessionHandle) -> CryptoResult<()> {
        match self.sessions.remove(handle) {
            Some(Stream::Decrypt(mut stream)) => stream.finalize(),
            Some(other) => {
                self.sessions.insert(handle.clone(), other);
                Err(not_found(handle, "decryption session"))
            }
            None => Err(not_found(handle, "decryption session")),
        }
    }

    /// Drop a session without finalizing. Returns whether it existed.
    pub fn abandon(&mut self, handle: &SessionHandle) -> bool {
        let existed = self.sessions.remove(handle).is_some();
        if existed {
            debug!(session = %handle, "session abandoned");
        }
        existed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: [u8; 32] = [3u8; 32];

    #[test]
    fn test_interleaved_sessions() {
        let mut table = SessionTable::new(ZkvConfig::default()).unwrap();
        let a_data = vec![0xAA; 2048];
        let b_data = vec![0xBB; 1500];

        let a = table.open_encryption(&MASTER, 2048, 1024, b"a").unwrap();
        let b = table.open_encryption(&MASTER, 1500, 1024, b"b").unwrap();
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);

        let a0 = table.encrypt_chunk(&a, &a_data[..1024]).unwrap();
        let b0 = table.encrypt_chunk(&b, &b_data[..1024]).unwrap();
        let a1 = table.encrypt_chunk(&a, &a_data[1024..]).unwrap();
        let b1 = table.encrypt_chunk(&b, &b_data[1024..]).unwrap();
        assert_eq!(table.progress(&a).unwrap().percentage, 100.0);

        let a_session = table.finalize_encryption(&a).unwrap();
        let b_session = table.finalize_encryption(&b).unwrap();
        assert!(table.is_empty());

        let d = table.open_decryption(&MASTER, &a_session, b"a").unwrap();
        let mut out = table.decrypt_chunk(&d, &a0.payload, &a0.metadata).unwrap();
        out.extend(table.decrypt_chunk(&d, &a1.payload, &a1.metadata).unwrap());
        table.finalize_decryption(&d).unwrap();
        assert_eq!(out, a_data);

        let d = table.open_decryption(&MASTER, &b_session, b"b").unwrap();
        let mut out = table.decrypt_chunk(&d, &b0.payload, &b0.metadata).unwrap();
        out.extend(table.decrypt_chunk(&d, &b1.payload, &b1.metadata).unwrap());
        table.finalize_decryption(&d).unwrap();
        assert_eq!(out, b_data);
    }

    #[test]
    fn test_unknown_and_wrong_direction_handles() {
        let mut table = SessionTable::new(ZkvConfig::default()).unwrap();
        let ghost = SessionHandle("missing".into());
        assert_eq!(
            table.encrypt_chunk(&ghost, b"x").unwrap_err().code(),
            ErrorCode::SessionNotFound
        );
        assert_eq!(table.progress(&ghost).unwrap_err().code(), ErrorCode::SessionNotFound);

        let enc = table.open_encryption(&MASTER, 1024, 1024, b"").unwrap();
        assert_eq!(
            table.finalize_decryption(&enc).unwrap_err().code(),
            ErrorCode::SessionNotFound
        );
        // The wrong-direction call left the session in place
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_inverted_bounds_rejected_at_construction() {
        let mut config = ZkvConfig::default();
        config.chunking.min_chunk_size = 8192;
        config.chunking.max_chunk_size = 1024;
        let err = SessionTable::new(config).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_abandon_discards_session() {
        let mut table = SessionTable::new(ZkvConfig::default()).unwrap();
        let h = table.open_encryption(&MASTER, 4096, 1024, b"").unwrap();
        table.encrypt_chunk(&h, &[0u8; 1024]).unwrap();

        assert!(table.abandon(&h));
        assert!(!table.abandon(&h));
        assert_eq!(
            table.encrypt_chunk(&h, &[0u8; 1024]).unwrap_err().code(),
            ErrorCode::SessionNotFound
        );
    }
}
