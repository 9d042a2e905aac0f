//! zkv-chunks: chunk planning and integrity digests
//!
//! # Overview
//! - `digest`: BLAKE3 / SHA-256 digests for chunk and whole-file integrity
//! - `plan`: fixed-size slicing of a plaintext into bounded chunks, plus the
//!   throughput-driven chunk-size heuristic

pub mod digest;
pub mod plan;

pub use digest::{digest_hex, digests_match, ContentHasher};
pub use plan::{optimal_chunk_size, ChunkBounds, ChunkPlan};
