//! End-to-end file encryption: large buffers, chunk-by-chunk persistence
//! through JSON, and integrity detection beyond the AEAD tag.

use zkv_core::types::{EncryptedFile, FileProgress, HashAlgorithm};
use zkv_core::{ErrorCategory, ErrorCode, ZkvConfig};
use zkv_crypto::{AccountKey, DecryptFileOptions, EncryptFileOptions, FileEncryptor};

const MIB: usize = 1024 * 1024;

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[test]
fn ten_mib_file_in_one_mib_chunks() {
    let data = make_data(10 * MIB);
    let account = AccountKey::generate();
    let enc = FileEncryptor::new(ZkvConfig::default()).unwrap();

    let file = enc
        .encrypt_file(
            &data,
            "backup.tar",
            "application/x-tar",
            &account,
            "item-10mib",
            EncryptFileOptions {
                chunk_size: Some(MIB),
                ..Default::default()
            },
        )
        .expect("encrypt should succeed");

    assert_eq!(file.metadata.chunk_count, 10);
    assert_eq!(file.chunks.len(), 10);
    for (i, chunk) in file.chunks.iter().enumerate() {
        assert_eq!(chunk.metadata.index, i as u64);
        assert_eq!(chunk.metadata.original_size, MIB as u64);
    }

    let out = enc
        .decrypt_file(
            &file,
            &account,
            "item-10mib",
            DecryptFileOptions {
                verify_integrity: true,
                ..Default::default()
            },
        )
        .expect("decrypt should succeed");
    assert_eq!(out.len(), data.len());
    assert!(out == data, "recovered data differs");
}

#[test]
fn decrypt_progress_reaches_total() {
    let data = make_data(3 * 64 * 1024 + 17);
    let account = AccountKey::generate();
    let enc = FileEncryptor::new(ZkvConfig::default()).unwrap();
    let file = enc
        .encrypt_file(&data, "p.bin", "application/octet-stream", &account, "p", EncryptFileOptions::default())
        .unwrap();
    assert_eq!(file.metadata.chunk_count, 4);

    let seen = std::cell::RefCell::new(Vec::new());
    let callback = |p: FileProgress| seen.borrow_mut().push(p);
    enc.decrypt_file(
        &file,
        &account,
        "p",
        DecryptFileOptions {
            progress: Some(&callback),
            ..Default::default()
        },
    )
    .unwrap();

    let seen = seen.into_inner();
    assert_eq!(seen.len(), 4);
    let done = seen.last().unwrap();
    assert_eq!(done.processed, data.len() as u64);
    assert_eq!(done.current_chunk, done.total_chunks);
    assert_eq!(done.percentage, 100.0);
}

#[test]
fn file_survives_json_persistence() {
    let data = make_data(200_000);
    let account = AccountKey::generate();
    let enc = FileEncryptor::new(ZkvConfig::default()).unwrap();
    let file = enc
        .encrypt_file(&data, "doc.pdf", "application/pdf", &account, "doc", EncryptFileOptions::default())
        .unwrap();

    let json = serde_json::to_string(&file).unwrap();
    assert!(json.contains("\"mimeType\":\"application/pdf\""));
    assert!(json.contains("\"integrityDigest\""));

    let restored: EncryptedFile = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, file);
    let out = enc
        .decrypt_file(&restored, &account, "doc", DecryptFileOptions::default())
        .unwrap();
    assert_eq!(out, data);
}

/// A digest replaced by the digest of other plaintext fails with the
/// integrity code even though every AEAD tag still verifies.
#[test]
fn substituted_chunk_digest_is_an_integrity_failure() {
    let data = make_data(4 * 1024);
    let account = AccountKey::generate();
    let enc = FileEncryptor::new(ZkvConfig::default()).unwrap();
    let mut file = enc
        .encrypt_file(
            &data,
            "d",
            "x",
            &account,
            "d",
            EncryptFileOptions {
                chunk_size: Some(1024),
                ..Default::default()
            },
        )
        .unwrap();

    let other = zkv_chunks::digest_hex(HashAlgorithm::Blake3, &make_data(1024)[..1000]);
    file.chunks[2].metadata.integrity_digest = other;

    let err = enc
        .decrypt_file(&file, &account, "d", DecryptFileOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ChunkIntegrityFailed);
    assert_eq!(err.category(), ErrorCategory::Integrity);
}

#[test]
fn rechunked_file_uses_distinct_keys() {
    let data = make_data(8 * 1024);
    let account = AccountKey::generate();
    let enc = FileEncryptor::new(ZkvConfig::default()).unwrap();
    let opts = |size| EncryptFileOptions {
        chunk_size: Some(size),
        ..Default::default()
    };

    let a = enc.encrypt_file(&data, "f", "x", &account, "same", opts(1024)).unwrap();
    let b = enc.encrypt_file(&data, "f", "x", &account, "same", opts(2048)).unwrap();

    // Graft chunk 0 of the 8-chunk layout into the 4-chunk layout
    let mut mixed = b.clone();
    mixed.chunks[0].payload = a.chunks[0].payload.clone();
    let err = enc
        .decrypt_file(&mixed, &account, "same", DecryptFileOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AuthTagInvalid);
}
