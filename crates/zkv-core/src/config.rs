use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CryptoError, CryptoResult, ErrorCode, ZkvError, ZkvResult};
use crate::types::HashAlgorithm;
use crate::FORMAT_VERSION;

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

/// Top-level configuration (loaded from zkv.toml).
///
/// Every value here participates in wire or storage compatibility. Changing a
/// default means bumping `format_version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZkvConfig {
    /// Newest persisted-structure version this build writes and accepts
    pub format_version: u32,
    pub chunking: ChunkingConfig,
    pub file: FileConfig,
    pub kem: KemConfig,
    pub hybrid: HybridConfig,
    pub kdf: KdfConfig,
    pub log: LogConfig,
}

impl Default for ZkvConfig {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            chunking: ChunkingConfig::default(),
            file: FileConfig::default(),
            kem: KemConfig::default(),
            hybrid: HybridConfig::default(),
            kdf: KdfConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Chunk-size bounds and the sizing heuristic's tiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Smallest accepted chunk size in bytes (default: 1 KiB)
    pub min_chunk_size: usize,
    /// Largest accepted chunk size in bytes (default: 16 MiB)
    pub max_chunk_size: usize,
    /// Chunk size for large files (default: 1 MiB)
    pub default_chunk_size: usize,
    /// Chunk size for files below `small_file_threshold` (default: 64 KiB)
    pub small_chunk_size: usize,
    /// Files smaller than this use `small_chunk_size` (default: 4 MiB)
    pub small_file_threshold: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: KIB,
            max_chunk_size: 16 * MIB,
            default_chunk_size: MIB,
            small_chunk_size: 64 * KIB,
            small_file_threshold: 4 * MIB as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Largest plaintext accepted by the file orchestrator (default: 2 GiB)
    pub max_file_size: u64,
    /// Digest used for per-chunk and whole-file integrity hashes
    pub hash_algorithm: HashAlgorithm,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            max_file_size: 2 * 1024 * MIB as u64,
            hash_algorithm: HashAlgorithm::Blake3,
        }
    }
}

/// Byte-length contract of the key-encapsulation mechanism
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KemConfig {
    pub algorithm: String,
    pub public_key_len: usize,
    pub secret_key_len: usize,
    pub ciphertext_len: usize,
    pub shared_secret_len: usize,
}

impl Default for KemConfig {
    fn default() -> Self {
        Self {
            algorithm: "ML-KEM-768".into(),
            public_key_len: 1184,
            secret_key_len: 2400,
            ciphertext_len: 1088,
            shared_secret_len: 32,
        }
    }
}

/// Weights mixed into the hybrid key-combination label.
///
/// Both parties must agree on these out of band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub classical_weight: f64,
    pub quantum_weight: f64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            classical_weight: 0.5,
            quantum_weight: 0.5,
        }
    }
}

/// Argon2id parameters for passphrase-derived account keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

impl ZkvConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ZkvResult<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)
                .map_err(|e| ZkvError::Config(format!("{}: {e}", path.display())))?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml_string(&self) -> ZkvResult<String> {
        toml::to_string_pretty(self).map_err(|e| ZkvError::Config(e.to_string()))
    }

    /// Reject parameter combinations the engine cannot honor.
    pub fn validate(&self) -> CryptoResult<()> {
        let invalid = |msg: String| Err(CryptoError::new(ErrorCode::InvalidConfig, msg));
        let c = &self.chunking;

        if self.format_version == 0 || self.format_version > FORMAT_VERSION {
            return invalid(format!(
                "format_version {} not supported (max {FORMAT_VERSION})",
                self.format_version
            ));
        }
        if c.min_chunk_size == 0 || c.min_chunk_size > c.max_chunk_size {
            return invalid(format!(
                "chunk bounds inverted or empty: min {} max {}",
                c.min_chunk_size, c.max_chunk_size
            ));
        }
        for (name, size) in [
            ("default_chunk_size", c.default_chunk_size),
            ("small_chunk_size", c.small_chunk_size),
        ] {
            if size < c.min_chunk_size || size > c.max_chunk_size {
                return invalid(format!(
                    "{name} {size} outside [{}, {}]",
                    c.min_chunk_size, c.max_chunk_size
                ));
            }
        }
        if self.file.max_file_size == 0 {
            return invalid("max_file_size must be positive".into());
        }
        let k = &self.kem;
        if k.public_key_len == 0
            || k.secret_key_len == 0
            || k.ciphertext_len == 0
            || k.shared_secret_len == 0
        {
            return invalid("KEM byte lengths must be positive".into());
        }
        let h = &self.hybrid;
        let weights_ok = |w: f64| w.is_finite() && w > 0.0;
        if !weights_ok(h.classical_weight) || !weights_ok(h.quantum_weight) {
            return invalid(format!(
                "hybrid weights must be finite and positive: {} / {}",
                h.classical_weight, h.quantum_weight
            ));
        }
        Ok(())
    }
}
