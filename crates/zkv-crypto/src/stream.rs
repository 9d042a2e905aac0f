//! Chunked streaming engine
//!
//! A stream owns one session: a validated [`ChunkPlan`], the root item key the
//! chunk keys hang off, and a strictly increasing chunk counter. Callers feed
//! one chunk per call and decide when to fetch the next one.
//!
//! ```text
//! encrypt: Created ──process_chunk──> Streaming ──finalize──> Finalized
//! decrypt: Created ──process_chunk──> Streaming ──finalize──> Finalized | Incomplete
//!          any cryptographic / integrity / ordering error ──> Failed
//! ```
//!
//! Chunk `i` of `n` is sealed under `HKDF(root, "chunk-{i}-of-{n}")` with
//! associated data `context || i (u64 BE) || n (u64 BE)`, so chunks cannot be
//! reordered or moved between sessions without detection.

use std::mem;

use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};
use zkv_chunks::{digest_hex, digests_match, ChunkBounds, ChunkPlan};
use zkv_core::types::{
    now_millis, ChunkMetadata, ChunkedCiphertext, ChunkedEncryptionSession, EncryptedChunk,
    EncryptionResult, HashAlgorithm, Progress,
};
use zkv_core::{CryptoError, CryptoResult, ErrorCategory, ErrorCode, ZkvConfig, FORMAT_VERSION};

use crate::cipher;
use crate::keys::{derive_chunk_key, derive_item_key, AccountKey, ItemKey, ItemKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Created,
    Streaming,
    Finalized,
    /// Decryption finalized before every chunk arrived
    Incomplete,
    /// Poisoned by an error; every further call returns `SESSION_CLOSED`
    Failed,
}

/// State shared by both stream directions
#[derive(Debug)]
struct StreamCore {
    session_id: String,
    plan: ChunkPlan,
    root: ItemKey,
    context: Vec<u8>,
    hash_algorithm: HashAlgorithm,
    version: u32,
    next_index: u64,
    state: StreamState,
}

impl StreamCore {
    fn ensure_open(&self) -> CryptoResult<()> {
        match self.state {
            StreamState::Created | StreamState::Streaming => Ok(()),
            state => Err(CryptoError::new(
                ErrorCode::SessionClosed,
                format!("session {} is closed ({state:?})", self.session_id),
            )),
        }
    }

    /// Poison the stream on anything but an input-validation error.
    fn record<T>(&mut self, result: CryptoResult<T>) -> CryptoResult<T> {
        if let Err(e) = &result {
            if e.category() != ErrorCategory::Validation {
                warn!(
                    session_id = %self.session_id,
                    chunk_index = self.next_index,
                    code = %e.code(),
                    "stream failed"
                );
                self.state = StreamState::Failed;
            }
        }
        result
    }

    fn aad(&self, index: u64) -> Vec<u8> {
        let mut aad = Vec::with_capacity(self.context.len() + 16);
        aad.extend_from_slice(&self.context);
        aad.extend_from_slice(&index.to_be_bytes());
        aad.extend_from_slice(&self.plan.total_chunks().to_be_bytes());
        aad
    }

    fn expected_len(&self, index: u64) -> CryptoResult<usize> {
        self.plan.chunk_len(index).ok_or_else(|| {
            CryptoError::new(
                ErrorCode::ChunkOutOfOrder,
                format!(
                    "chunk {index} is past the end of a {}-chunk session",
                    self.plan.total_chunks()
                ),
            )
        })
    }

    fn progress(&self) -> Progress {
        Progress::new(self.next_index, self.plan.total_chunks())
    }

    fn session(&self) -> ChunkedEncryptionSession {
        ChunkedEncryptionSession {
            version: self.version,
            session_id: self.session_id.clone(),
            total_size: self.plan.total_size(),
            chunk_size: self.plan.chunk_size() as u64,
            total_chunks: self.plan.total_chunks(),
            processed_chunks: self.next_index,
            hash_algorithm: self.hash_algorithm,
        }
    }
}

fn account_key(master_key: &[u8]) -> CryptoResult<AccountKey> {
    AccountKey::from_slice(master_key)
}

/// Encrypting half of a chunked session
#[derive(Debug)]
pub struct EncryptionStream {
    core: StreamCore,
    metadata: Vec<ChunkMetadata>,
}

impl EncryptionStream {
    /// Open a stream for `total_size` bytes cut into `chunk_size` pieces.
    ///
    /// The session id is random; the root key is derived from the master key
    /// and that id, so the decrypting side only needs the session record.
    pub fn create(
        master_key: &[u8],
        total_size: u64,
        chunk_size: usize,
        context: &[u8],
        config: &ZkvConfig,
    ) -> CryptoResult<Self> {
        config.validate()?;
        let account = account_key(master_key)?;
        let plan = ChunkPlan::new(total_size, chunk_size, ChunkBounds::from(&config.chunking))?;
        let session_id = Uuid::new_v4().to_string();
        let root = derive_item_key(&account, &session_id, ItemKind::Stream)?;

        Ok(Self::with_root(
            session_id,
            root,
            plan,
            context,
            config.file.hash_algorithm,
            config.format_version,
        ))
    }

    pub(crate) fn with_root(
        session_id: String,
        root: ItemKey,
        plan: ChunkPlan,
        context: &[u8],
        hash_algorithm: HashAlgorithm,
        version: u32,
    ) -> Self {
        debug!(
            session_id = %session_id,
            total_chunks = plan.total_chunks(),
            bytes = plan.total_size(),
            "encryption stream created"
        );
        Self {
            metadata: Vec::with_capacity(plan.total_chunks().min(1024) as usize),
            core: StreamCore {
                session_id,
                plan,
                root,
                context: context.to_vec(),
                hash_algorithm,
                version,
                next_index: 0,
                state: StreamState::Created,
            },
        }
    }

    /// Encrypt the next chunk in sequence.
    ///
    /// `data` must be exactly `chunk_size` bytes, or the remainder for the
    /// final chunk.
    pub fn process_chunk(&mut self, data: &[u8]) -> CryptoResult<EncryptedChunk> {
        self.core.ensure_open()?;
        let index = self.core.next_index;

        let expected = self.core.expected_len(index);
        let expected = self.core.record(expected)?;
        if data.len() != expected {
            return Err(CryptoError::new(
                ErrorCode::ChunkSizeMismatch,
                format!("chunk {index} must be {expected} bytes, got {}", data.len()),
            ));
        }

        let sealed = self.seal(index, data);
        let chunk = self.core.record(sealed)?;

        self.metadata.push(chunk.metadata.clone());
        self.core.next_index += 1;
        self.core.state = StreamState::Streaming;
        debug!(
            session_id = %self.core.session_id,
            chunk_index = index,
            total_chunks = self.core.plan.total_chunks(),
            bytes = data.len(),
            "chunk encrypted"
        );
        Ok(chunk)
    }

    fn seal(&self, index: u64, data: &[u8]) -> CryptoResult<EncryptedChunk> {
        let key = derive_chunk_key(&self.core.root, index, self.core.plan.total_chunks())?;
        let payload = cipher::encrypt(data, key.as_bytes(), &self.core.aad(index))?;

        Ok(EncryptedChunk {
            metadata: ChunkMetadata {
                index,
                original_size: data.len() as u64,
                encrypted_size: payload.ciphertext.len() as u64,
                integrity_digest: digest_hex(self.core.hash_algorithm, data),
                timestamp: now_millis(),
            },
            payload,
        })
    }

    /// Close the session. Fails with `INCOMPLETE_ENCRYPTION` unless every
    /// planned chunk was processed.
    pub fn finalize(&mut self) -> CryptoResult<ChunkedEncryptionSession> {
        self.core.ensure_open()?;
        if self.core.next_index != self.core.plan.total_chunks() {
            let err = Err(CryptoError::new(
                ErrorCode::IncompleteEncryption,
                format!(
                    "only {} of {} chunks encrypted",
                    self.core.next_index,
                    self.core.plan.total_chunks()
                ),
            ));
            return self.core.record(err);
        }

        self.core.state = StreamState::Finalized;
        info!(
            session_id = %self.core.session_id,
            total_chunks = self.core.plan.total_chunks(),
            bytes = self.core.plan.total_size(),
            "encryption stream finalized"
        );
        Ok(self.core.session())
    }

    pub fn progress(&self) -> Progress {
        self.core.progress()
    }

    /// Snapshot of the session record; `processed_chunks` tracks the counter.
    pub fn session(&self) -> ChunkedEncryptionSession {
        self.core.session()
    }

    pub fn session_id(&self) -> &str {
        &self.core.session_id
    }

    pub fn state(&self) -> StreamState {
        self.core.state
    }

    /// Metadata of every chunk produced so far, in index order
    pub fn chunk_metadata(&self) -> &[ChunkMetadata] {
        &self.metadata
    }
}

/// Decrypting half of a chunked session
#[derive(Debug)]
pub struct DecryptionStream {
    core: StreamCore,
    verify_digests: bool,
}

impl DecryptionStream {
    pub fn create(
        master_key: &[u8],
        session: &ChunkedEncryptionSession,
        context: &[u8],
        config: &ZkvConfig,
    ) -> CryptoResult<Self> {
        config.validate()?;
        let account = account_key(master_key)?;
        let plan = plan_for_session(session, config)?;
        let root = derive_item_key(&account, &session.session_id, ItemKind::Stream)?;

        Ok(Self::with_root(
            session.session_id.clone(),
            root,
            plan,
            context,
            session.hash_algorithm,
            session.version,
            true,
        ))
    }

    pub(crate) fn with_root(
        session_id: String,
        root: ItemKey,
        plan: ChunkPlan,
        context: &[u8],
        hash_algorithm: HashAlgorithm,
        version: u32,
        verify_digests: bool,
    ) -> Self {
        debug!(
            session_id = %session_id,
            total_chunks = plan.total_chunks(),
            verify_digests,
            "decryption stream created"
        );
        Self {
            core: StreamCore {
                session_id,
                plan,
                root,
                context: context.to_vec(),
                hash_algorithm,
                version,
                next_index: 0,
                state: StreamState::Created,
            },
            verify_digests,
        }
    }

    /// Decrypt the next chunk. `metadata.index` must equal the expected next
    /// index; a mismatch fails with `CHUNK_OUT_OF_ORDER` without advancing.
    pub fn process_chunk(
        &mut self,
        payload: &EncryptionResult,
        metadata: &ChunkMetadata,
    ) -> CryptoResult<Vec<u8>> {
        self.core.ensure_open()?;
        let index = self.core.next_index;

        if metadata.index != index {
            let err = Err(CryptoError::new(
                ErrorCode::ChunkOutOfOrder,
                format!("expected chunk {index}, got {}", metadata.index),
            ));
            return self.core.record(err);
        }

        let opened = self.open(index, payload, metadata);
        let plaintext = self.core.record(opened)?;

        self.core.next_index += 1;
        self.core.state = StreamState::Streaming;
        debug!(
            session_id = %self.core.session_id,
            chunk_index = index,
            total_chunks = self.core.plan.total_chunks(),
            bytes = plaintext.len(),
            "chunk decrypted"
        );
        Ok(plaintext)
    }

    fn open(
        &self,
        index: u64,
        payload: &EncryptionResult,
        metadata: &ChunkMetadata,
    ) -> CryptoResult<Vec<u8>> {
        let expected = self.core.expected_len(index)?;
        let key = derive_chunk_key(&self.core.root, index, self.core.plan.total_chunks())?;
        let mut plaintext = cipher::decrypt(payload, key.as_bytes(), &self.core.aad(index))?;

        if plaintext.len() != expected || metadata.original_size != expected as u64 {
            plaintext.zeroize();
            return Err(CryptoError::new(
                ErrorCode::ChunkIntegrityFailed,
                format!(
                    "chunk {index} length mismatch: planned {expected}, recorded {}",
                    metadata.original_size
                ),
            ));
        }

        if self.verify_digests {
            let computed = digest_hex(self.core.hash_algorithm, &plaintext);
            if !digests_match(&computed, &metadata.integrity_digest) {
                plaintext.zeroize();
                return Err(CryptoError::new(
                    ErrorCode::ChunkIntegrityFailed,
                    format!("chunk {index} digest does not match its metadata"),
                ));
            }
        }

        Ok(plaintext)
    }

    /// Close the session. Fails with `INCOMPLETE_DECRYPTION` and moves to
    /// [`StreamState::Incomplete`] unless every chunk was decrypted.
    pub fn finalize(&mut self) -> CryptoResult<()> {
        self.core.ensure_open()?;
        let total = self.core.plan.total_chunks();
        if self.core.next_index != total {
            self.core.state = StreamState::Incomplete;
            warn!(
                session_id = %self.core.session_id,
                processed = self.core.next_index,
                total_chunks = total,
                "decryption finalized early"
            );
            return Err(CryptoError::new(
                ErrorCode::IncompleteDecryption,
                format!("only {} of {total} chunks decrypted", self.core.next_index),
            ));
        }

        self.core.state = StreamState::Finalized;
        info!(
            session_id = %self.core.session_id,
            total_chunks = total,
            bytes = self.core.plan.total_size(),
            "decryption stream finalized"
        );
        Ok(())
    }

    /// Whether the stream still expects chunks
    pub fn has_more(&self) -> bool {
        self.core.ensure_open().is_ok() && self.core.next_index < self.core.plan.total_chunks()
    }

    pub fn progress(&self) -> Progress {
        self.core.progress()
    }

    pub fn session_id(&self) -> &str {
        &self.core.session_id
    }

    pub fn state(&self) -> StreamState {
        self.core.state
    }
}

/// Rebuild and cross-check the chunk layout a session record claims.
fn plan_for_session(session: &ChunkedEncryptionSession, config: &ZkvConfig) -> CryptoResult<ChunkPlan> {
    if session.version == 0 || session.version > FORMAT_VERSION {
        return Err(CryptoError::new(
            ErrorCode::UnsupportedVersion,
            format!(
                "session version {} not supported (max {FORMAT_VERSION})",
                session.version
            ),
        ));
    }
    let chunk_size = usize::try_from(session.chunk_size).map_err(|_| {
        CryptoError::new(
            ErrorCode::InvalidChunkSize,
            format!("chunk size {} does not fit this platform", session.chunk_size),
        )
    })?;
    let plan = ChunkPlan::new(
        session.total_size,
        chunk_size,
        ChunkBounds::from(&config.chunking),
    )?;
    if plan.total_chunks() != session.total_chunks {
        return Err(CryptoError::new(
            ErrorCode::InvalidSize,
            format!(
                "session declares {} chunks but its sizes imply {}",
                session.total_chunks,
                plan.total_chunks()
            ),
        ));
    }
    Ok(plan)
}

/// Encrypt a buffer already held in memory, chunk by chunk.
pub fn encrypt_in_chunks(
    data: &[u8],
    master_key: &[u8],
    chunk_size: usize,
    context: &[u8],
    config: &ZkvConfig,
) -> CryptoResult<ChunkedCiphertext> {
    let mut stream =
        EncryptionStream::create(master_key, data.len() as u64, chunk_size, context, config)?;

    let mut chunks = Vec::with_capacity(data.len().div_ceil(chunk_size));
    for piece in data.chunks(chunk_size) {
        chunks.push(stream.process_chunk(piece)?);
    }
    let session = stream.finalize()?;

    Ok(ChunkedCiphertext { session, chunks })
}

/// Inverse of [`encrypt_in_chunks`]. Chunks must be supplied in index order.
pub fn decrypt_from_chunks(
    ciphertext: &ChunkedCiphertext,
    master_key: &[u8],
    context: &[u8],
    config: &ZkvConfig,
) -> CryptoResult<Vec<u8>> {
    let mut stream = DecryptionStream::create(master_key, &ciphertext.session, context, config)?;

    let capacity = ciphertext
        .chunks
        .iter()
        .map(|c| c.payload.ciphertext.len())
        .sum();
    let mut output = Zeroizing::new(Vec::with_capacity(capacity));
    for chunk in &ciphertext.chunks {
        let plaintext = Zeroizing::new(stream.process_chunk(&chunk.payload, &chunk.metadata)?);
        output.extend_from_slice(&plaintext);
    }
    stream.finalize()?;

    Ok(mem::take(&mut *output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MASTER: [u8; 32] = [0x11; 32];

    fn config() -> ZkvConfig {
        ZkvConfig::default()
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_create_validates_inputs() {
        let c = config();
        assert_eq!(
            EncryptionStream::create(&[0u8; 16], 100, 1024, b"", &c).unwrap_err().code(),
            ErrorCode::InvalidKeyLength
        );
        assert_eq!(
            EncryptionStream::create(&MASTER, 0, 1024, b"", &c).unwrap_err().code(),
            ErrorCode::InvalidSize
        );
        assert_eq!(
            EncryptionStream::create(&MASTER, 100, 10, b"", &c).unwrap_err().code(),
            ErrorCode::InvalidChunkSize
        );
    }

    #[test]
    fn test_unvalidated_config_is_rejected_not_panicking() {
        let mut c = config();
        c.chunking.min_chunk_size = 0;
        let result = std::panic::catch_unwind(|| {
            EncryptionStream::create(&MASTER, 100, 0, b"", &c).map(|_| ())
        });
        let err = result.expect("create must not panic").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);

        let session = encrypt_in_chunks(&sample(2048), &MASTER, 1024, b"", &config())
            .unwrap()
            .session;
        assert_eq!(
            DecryptionStream::create(&MASTER, &session, b"", &c).unwrap_err().code(),
            ErrorCode::InvalidConfig
        );
    }

    #[test]
    fn test_state_transitions_and_progress() {
        let data = sample(2500);
        let mut enc = EncryptionStream::create(&MASTER, 2500, 1024, b"ctx", &config()).unwrap();
        assert_eq!(enc.state(), StreamState::Created);
        assert_eq!(enc.progress().total, 3);

        enc.process_chunk(&data[..1024]).unwrap();
        assert_eq!(enc.state(), StreamState::Streaming);
        assert_eq!(enc.progress().processed, 1);

        enc.process_chunk(&data[1024..2048]).unwrap();
        enc.process_chunk(&data[2048..]).unwrap();
        assert_eq!(enc.progress().percentage, 100.0);

        let session = enc.finalize().unwrap();
        assert_eq!(enc.state(), StreamState::Finalized);
        assert_eq!(session.processed_chunks, session.total_chunks);
        assert_eq!(enc.chunk_metadata().len(), 3);
        assert_eq!(enc.chunk_metadata()[2].original_size, 452);

        let err = enc.process_chunk(b"more").unwrap_err();
        assert_eq!(err.code(), ErrorCode::SessionClosed);
    }

    #[test]
    fn test_wrong_chunk_size_is_recoverable() {
        let data = sample(2048);
        let mut enc = EncryptionStream::create(&MASTER, 2048, 1024, b"", &config()).unwrap();

        let err = enc.process_chunk(&data[..1000]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ChunkSizeMismatch);
        assert_eq!(enc.state(), StreamState::Created);

        enc.process_chunk(&data[..1024]).unwrap();
        enc.process_chunk(&data[1024..]).unwrap();
        enc.finalize().unwrap();
    }

    #[test]
    fn test_early_finalize_fails() {
        let mut enc = EncryptionStream::create(&MASTER, 4096, 1024, b"", &config()).unwrap();
        enc.process_chunk(&sample(1024)).unwrap();

        let err = enc.finalize().unwrap_err();
        assert_eq!(err.code(), ErrorCode::IncompleteEncryption);
        assert_eq!(enc.state(), StreamState::Failed);
        assert_eq!(enc.session().processed_chunks, 1);
    }

    #[test]
    fn test_out_of_order_does_not_advance() {
        let data = sample(3 * 1024);
        let ct = encrypt_in_chunks(&data, &MASTER, 1024, b"", &config()).unwrap();
        let mut dec = DecryptionStream::create(&MASTER, &ct.session, b"", &config()).unwrap();

        dec.process_chunk(&ct.chunks[0].payload, &ct.chunks[0].metadata).unwrap();
        let err = dec
            .process_chunk(&ct.chunks[2].payload, &ct.chunks[2].metadata)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ChunkOutOfOrder);
        assert_eq!(dec.progress().processed, 1);
        assert_eq!(dec.state(), StreamState::Failed);

        let err = dec
            .process_chunk(&ct.chunks[1].payload, &ct.chunks[1].metadata)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SessionClosed);
    }

    #[test]
    fn test_incomplete_decryption() {
        let data = sample(3000);
        let ct = encrypt_in_chunks(&data, &MASTER, 1024, b"", &config()).unwrap();
        let mut dec = DecryptionStream::create(&MASTER, &ct.session, b"", &config()).unwrap();

        dec.process_chunk(&ct.chunks[0].payload, &ct.chunks[0].metadata).unwrap();
        assert!(dec.has_more());

        let err = dec.finalize().unwrap_err();
        assert_eq!(err.code(), ErrorCode::IncompleteDecryption);
        assert_eq!(dec.state(), StreamState::Incomplete);
        assert!(!dec.has_more());
    }

    #[test]
    fn test_swapped_payloads_fail_authentication() {
        let data = sample(2048);
        let mut ct = encrypt_in_chunks(&data, &MASTER, 1024, b"", &config()).unwrap();
        let first = ct.chunks[0].payload.clone();
        ct.chunks[0].payload = ct.chunks[1].payload.clone();
        ct.chunks[1].payload = first;

        let err = decrypt_from_chunks(&ct, &MASTER, b"", &config()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthTagInvalid);
    }

    #[test]
    fn test_wrong_context_or_key_fails() {
        let data = sample(1500);
        let ct = encrypt_in_chunks(&data, &MASTER, 1024, b"vault-1", &config()).unwrap();

        let err = decrypt_from_chunks(&ct, &MASTER, b"vault-2", &config()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthTagInvalid);

        let err = decrypt_from_chunks(&ct, &[0x22; 32], b"vault-1", &config()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthTagInvalid);
    }

    #[test]
    fn test_tampered_digest_detected() {
        let data = sample(2048);
        let mut ct = encrypt_in_chunks(&data, &MASTER, 1024, b"", &config()).unwrap();
        ct.chunks[1].metadata.integrity_digest = digest_hex(HashAlgorithm::Blake3, b"other");

        let err = decrypt_from_chunks(&ct, &MASTER, b"", &config()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ChunkIntegrityFailed);
        assert_eq!(err.category(), ErrorCategory::Integrity);
    }

    #[test]
    fn test_inconsistent_session_rejected() {
        let data = sample(2048);
        let mut ct = encrypt_in_chunks(&data, &MASTER, 1024, b"", &config()).unwrap();
        ct.session.total_chunks = 5;
        assert_eq!(
            decrypt_from_chunks(&ct, &MASTER, b"", &config()).unwrap_err().code(),
            ErrorCode::InvalidSize
        );

        ct.session.total_chunks = 2;
        ct.session.version = FORMAT_VERSION + 1;
        assert_eq!(
            decrypt_from_chunks(&ct, &MASTER, b"", &config()).unwrap_err().code(),
            ErrorCode::UnsupportedVersion
        );
    }

    #[test]
    fn test_sha256_sessions_roundtrip() {
        let mut c = config();
        c.file.hash_algorithm = HashAlgorithm::Sha256;
        let data = sample(5000);
        let ct = encrypt_in_chunks(&data, &MASTER, 2048, b"", &c).unwrap();
        assert_eq!(ct.session.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(ct.chunks[0].metadata.integrity_digest.len(), 64);

        // The session record, not the local config, picks the digest
        let recovered = decrypt_from_chunks(&ct, &MASTER, b"", &config()).unwrap();
        assert_eq!(recovered, data);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Chunking is transparent to the reconstructed plaintext
        #[test]
        fn chunked_roundtrip_any_size(
            data in proptest::collection::vec(any::<u8>(), 1..=20_000),
            chunk_size in 1024usize..=8192,
        ) {
            let ct = encrypt_in_chunks(&data, &MASTER, chunk_size, b"prop", &config()).unwrap();
            prop_assert_eq!(ct.session.total_chunks, (data.len() as u64).div_ceil(chunk_size as u64));
            let recovered = decrypt_from_chunks(&ct, &MASTER, b"prop", &config()).unwrap();
            prop_assert_eq!(recovered, data);
        }

        /// A bit flip anywhere in any chunk's payload fails closed
        #[test]
        fn tampered_chunk_never_decrypts(
            chunk in 0usize..3,
            target in 0usize..3,
            position in any::<usize>(),
            bit in 0u8..8,
        ) {
            let data = sample(3 * 1024);
            let mut ct = encrypt_in_chunks(&data, &MASTER, 1024, b"", &config()).unwrap();
            let payload = &mut ct.chunks[chunk].payload;
            let field = match target {
                0 => &mut payload.ciphertext,
                1 => &mut payload.nonce,
                _ => &mut payload.auth_tag,
            };
            let i = position % field.len();
            field[i] ^= 1 << bit;

            let err = decrypt_from_chunks(&ct, &MASTER, b"", &config()).unwrap_err();
            prop_assert_eq!(err.category(), ErrorCategory::Cryptographic);
        }
    }
}
