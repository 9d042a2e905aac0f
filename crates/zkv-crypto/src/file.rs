//! File encryption orchestrator
//!
//! Wraps the streaming engine with file-level metadata: one item key per
//! file (`item-file-{itemId}`), one chunk key per chunk, per-chunk plaintext
//! digests, and a whole-file digest for end-to-end integrity.

use std::mem;

use tracing::{info, warn};
use zeroize::Zeroizing;
use zkv_chunks::{digests_match, optimal_chunk_size, ChunkBounds, ChunkPlan, ContentHasher};
use zkv_core::types::{now_millis, EncryptedFile, EncryptedFileMetadata, FileChunk, FileProgress};
use zkv_core::{CryptoError, CryptoResult, ErrorCode, ZkvConfig, FORMAT_VERSION};

use crate::keys::{derive_item_key, AccountKey, ItemKind};
use crate::stream::{DecryptionStream, EncryptionStream};

/// Called after each chunk
pub type ProgressFn<'a> = &'a dyn Fn(FileProgress);

#[derive(Default)]
pub struct EncryptFileOptions<'a> {
    /// Overrides the sizing heuristic
    pub chunk_size: Option<usize>,
    pub progress: Option<ProgressFn<'a>>,
    /// Associated data bound into every chunk
    pub context: Option<&'a [u8]>,
}

pub struct DecryptFileOptions<'a> {
    pub progress: Option<ProgressFn<'a>>,
    pub context: Option<&'a [u8]>,
    /// Recompute per-chunk and whole-file digests (default: true)
    pub verify_integrity: bool,
}

impl Default for DecryptFileOptions<'_> {
    fn default() -> Self {
        Self {
            progress: None,
            context: None,
            verify_integrity: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileEncryptor {
    config: ZkvConfig,
}

impl FileEncryptor {
    pub fn new(config: ZkvConfig) -> CryptoResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ZkvConfig {
        &self.config
    }

    pub fn optimal_chunk_size(&self, file_size: u64) -> usize {
        optimal_chunk_size(file_size, &self.config.chunking)
    }

    pub fn encrypt_file(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        account_key: &AccountKey,
        item_id: &str,
        options: EncryptFileOptions<'_>,
    ) -> CryptoResult<EncryptedFile> {
        let total = data.len() as u64;
        if total == 0 {
            return Err(CryptoError::new(ErrorCode::EmptyFile, "file is empty"));
        }
        if total > self.config.file.max_file_size {
            return Err(CryptoError::new(
                ErrorCode::FileTooLarge,
                format!(
                    "file is {total} bytes, limit is {}",
                    self.config.file.max_file_size
                ),
            ));
        }

        let chunk_size = options
            .chunk_size
            .unwrap_or_else(|| self.optimal_chunk_size(total));
        let plan = ChunkPlan::new(total, chunk_size, ChunkBounds::from(&self.config.chunking))?;
        let hash_algorithm = self.config.file.hash_algorithm;
        let root = derive_item_key(account_key, item_id, ItemKind::File)?;

        let mut stream = EncryptionStream::with_root(
            item_id.to_string(),
            root,
            plan,
            options.context.unwrap_or_default(),
            hash_algorithm,
            self.config.format_version,
        );
        let mut hasher = ContentHasher::new(hash_algorithm);
        let mut chunks = Vec::with_capacity(plan.total_chunks() as usize);
        let mut processed = 0u64;

        for index in 0..plan.total_chunks() {
            let piece = plan.range(index).and_then(|r| data.get(r)).ok_or_else(|| {
                CryptoError::new(
                    ErrorCode::InvalidSize,
                    format!("chunk {index} lies outside the {total}-byte input"),
                )
            })?;
            hasher.update(piece);
            chunks.push(stream.process_chunk(piece)?);
            processed += piece.len() as u64;
            report(options.progress, processed, total, chunks.len() as u64, plan.total_chunks());
        }
        stream.finalize()?;

        info!(
            item_id,
            bytes = total,
            chunks = plan.total_chunks(),
            chunk_size,
            "file encrypted"
        );

        Ok(EncryptedFile {
            metadata: EncryptedFileMetadata {
                filename: filename.to_string(),
                original_size: total,
                mime_type: mime_type.to_string(),
                chunk_count: plan.total_chunks(),
                chunk_size: chunk_size as u64,
                file_hash: hasher.finalize_hex(),
                hash_algorithm,
                encrypted_at: now_millis(),
                version: self.config.format_version,
            },
            chunks,
        })
    }

    pub fn decrypt_file(
        &self,
        file: &EncryptedFile,
        account_key: &AccountKey,
        item_id: &str,
        options: DecryptFileOptions<'_>,
    ) -> CryptoResult<Vec<u8>> {
        let meta = &file.metadata;
        if meta.version == 0 || meta.version > FORMAT_VERSION {
            return Err(CryptoError::new(
                ErrorCode::UnsupportedVersion,
                format!("file version {} not supported (max {FORMAT_VERSION})", meta.version),
            ));
        }
        if meta.original_size > self.config.file.max_file_size {
            return Err(CryptoError::new(
                ErrorCode::FileTooLarge,
                format!(
                    "file is {} bytes, limit is {}",
                    meta.original_size, self.config.file.max_file_size
                ),
            ));
        }

        let plan = self.plan_for(meta)?;
        let ordered = order_chunks(&file.chunks, meta.chunk_count)?;
        let root = derive_item_key(account_key, item_id, ItemKind::File)?;

        let mut stream = DecryptionStream::with_root(
            item_id.to_string(),
            root,
            plan,
            options.context.unwrap_or_default(),
            meta.hash_algorithm,
            meta.version,
            options.verify_integrity,
        );
        let mut hasher = options
            .verify_integrity
            .then(|| ContentHasher::new(meta.hash_algorithm));
        let capacity = ordered.iter().map(|c| c.payload.ciphertext.len()).sum();
        let mut output = Zeroizing::new(Vec::with_capacity(capacity));

        for (i, chunk) in ordered.iter().enumerate() {
            let plaintext = Zeroizing::new(stream.process_chunk(&chunk.payload, &chunk.metadata)?);
            if let Some(h) = hasher.as_mut() {
                h.update(&plaintext);
            }
            output.extend_from_slice(&plaintext);
            report(
                options.progress,
                output.len() as u64,
                meta.original_size,
                i as u64 + 1,
                meta.chunk_count,
            );
        }
        stream.finalize()?;

        if let Some(h) = hasher {
            if !digests_match(&h.finalize_hex(), &meta.file_hash) {
                warn!(item_id, "whole-file digest mismatch");
                return Err(CryptoError::new(
                    ErrorCode::FileIntegrityFailed,
                    format!("{} does not match its recorded hash", meta.filename),
                ));
            }
        }

        info!(
            item_id,
            bytes = meta.original_size,
            chunks = meta.chunk_count,
            verified = options.verify_integrity,
            "file decrypted"
        );
        Ok(mem::take(&mut *output))
    }

    fn plan_for(&self, meta: &EncryptedFileMetadata) -> CryptoResult<ChunkPlan> {
        let chunk_size = usize::try_from(meta.chunk_size).map_err(|_| {
            CryptoError::new(
                ErrorCode::InvalidChunkSize,
                format!("chunk size {} does not fit this platform", meta.chunk_size),
            )
        })?;
        let plan = ChunkPlan::new(
            meta.original_size,
            chunk_size,
            ChunkBounds::from(&self.config.chunking),
        )?;
        if plan.total_chunks() != meta.chunk_count {
            return Err(CryptoError::new(
                ErrorCode::InvalidSize,
                format!(
                    "metadata declares {} chunks but its sizes imply {}",
                    meta.chunk_count,
                    plan.total_chunks()
                ),
            ));
        }
        Ok(plan)
    }
}

fn report(progress: Option<ProgressFn<'_>>, processed: u64, total: u64, current: u64, chunks: u64) {
    if let Some(callback) = progress {
        callback(FileProgress {
            processed,
            total,
            percentage: processed as f64 * 100.0 / total as f64,
            current_chunk: current,
            total_chunks: chunks,
        });
    }
}

/// Arrange chunks by index, requiring exactly one chunk per index in
/// `0..chunk_count`.
fn order_chunks(chunks: &[FileChunk], chunk_count: u64) -> CryptoResult<Vec<&FileChunk>> {
    let missing = |msg: String| CryptoError::new(ErrorCode::MissingChunk, msg);

    if chunks.len() as u64 != chunk_count {
        return Err(missing(format!(
            "expected {chunk_count} chunks, got {}",
            chunks.len()
        )));
    }

    let mut slots: Vec<Option<&FileChunk>> = vec![None; chunks.len()];
    for chunk in chunks {
        let index = chunk.metadata.index;
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| slots.get_mut(i))
            .ok_or_else(|| missing(format!("chunk index {index} out of range 0..{chunk_count}")))?;
        if slot.is_some() {
            return Err(missing(format!("chunk index {index} appears twice")));
        }
        *slot = Some(chunk);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or_else(|| missing(format!("chunk {i} is missing"))))
        .collect()
}
