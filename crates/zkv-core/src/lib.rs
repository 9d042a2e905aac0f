//! zkv-core: shared vocabulary of the zkvault crypto engine
//!
//! - `config`: versioned, wire-relevant parameters (chunk bounds, KEM sizes, hybrid weights)
//! - `error`: discriminated error codes returned by every core operation
//! - `types`: persisted structures (encryption results, chunk metadata, files, items)
//! - `encoding`: base64 serde adapters keeping byte fields JSON-safe

pub mod config;
pub mod encoding;
pub mod error;
pub mod types;

pub use config::ZkvConfig;
pub use error::{CryptoError, CryptoResult, ErrorCategory, ErrorCode, ZkvError, ZkvResult};

/// Version written into every persisted structure.
pub const FORMAT_VERSION: u32 = 1;

/// Identifier of the AEAD primitive used for every symmetric layer.
pub const AEAD_ALGORITHM: &str = "xchacha20-poly1305";
