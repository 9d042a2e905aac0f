//! Loading zkv.toml from disk.

use std::io::Write;

use tempfile::NamedTempFile;
use zkv_core::{ErrorCode, ZkvConfig, ZkvError};

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = ZkvConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, ZkvConfig::default());
}

#[test]
fn file_values_override_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[chunking]\ndefault_chunk_size = 524288\n\n[log]\nformat = \"json\""
    )
    .unwrap();

    let config = ZkvConfig::load(file.path()).unwrap();
    assert_eq!(config.chunking.default_chunk_size, 524288);
    assert_eq!(config.chunking.min_chunk_size, 1024);
}

#[test]
fn malformed_toml_is_a_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[chunking\nmin_chunk_size = ").unwrap();

    let err = ZkvConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ZkvError::Config(_)), "got {err:?}");
}

#[test]
fn invalid_values_fail_validation() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[chunking]\nsmall_chunk_size = 16").unwrap();

    match ZkvConfig::load(file.path()).unwrap_err() {
        ZkvError::Crypto(e) => assert_eq!(e.code(), ErrorCode::InvalidConfig),
        other => panic!("expected validation failure, got {other:?}"),
    }
}
