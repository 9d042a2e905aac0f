//! Fixed-size chunk planning
//!
//! A plaintext of `total_size` bytes is cut into `ceil(total_size / chunk_size)`
//! chunks. Every chunk is exactly `chunk_size` bytes except the last, which
//! holds the remainder. Chunk indices are contiguous and zero-based.

use std::ops::Range;

use zkv_core::config::ChunkingConfig;
use zkv_core::{CryptoError, CryptoResult, ErrorCode};

/// Accepted chunk-size range (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBounds {
    pub min: usize,
    pub max: usize,
}

impl From<&ChunkingConfig> for ChunkBounds {
    fn from(c: &ChunkingConfig) -> Self {
        Self {
            min: c.min_chunk_size,
            max: c.max_chunk_size,
        }
    }
}

/// Validated layout of one chunked session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: usize,
    total_chunks: u64,
}

impl ChunkPlan {
    pub fn new(total_size: u64, chunk_size: usize, bounds: ChunkBounds) -> CryptoResult<Self> {
        if total_size == 0 {
            return Err(CryptoError::new(
                ErrorCode::InvalidSize,
                "total size must be greater than zero",
            ));
        }
        if chunk_size == 0 || chunk_size < bounds.min || chunk_size > bounds.max {
            return Err(CryptoError::new(
                ErrorCode::InvalidChunkSize,
                format!(
                    "chunk size {chunk_size} outside [{}, {}]",
                    bounds.min, bounds.max
                ),
            ));
        }
        Ok(Self {
            total_size,
            chunk_size,
            total_chunks: total_size.div_ceil(chunk_size as u64),
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Expected plaintext length of chunk `index`, or `None` past the end.
    pub fn chunk_len(&self, index: u64) -> Option<usize> {
        if index >= self.total_chunks {
            return None;
        }
        let start = index * self.chunk_size as u64;
        Some((self.total_size - start).min(self.chunk_size as u64) as usize)
    }

    /// Byte range of chunk `index` within the plaintext.
    pub fn range(&self, index: u64) -> Option<Range<usize>> {
        let len = self.chunk_len(index)?;
        let start = (index * self.chunk_size as u64) as usize;
        Some(start..start + len)
    }
}

/// Pick a chunk size for a file of `file_size` bytes.
///
/// Small files get the small fixed size so progress stays granular; everything
/// else uses the default large size. The result always lies within the
/// configured bounds; inverted bounds yield `max_chunk_size` and are left for
/// [`ChunkPlan::new`] to reject.
pub fn optimal_chunk_size(file_size: u64, config: &ChunkingConfig) -> usize {
    let size = if file_size < config.small_file_threshold {
        config.small_chunk_size
    } else {
        config.default_chunk_size
    };
    size.max(config.min_chunk_size).min(config.max_chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BOUNDS: ChunkBounds = ChunkBounds {
        min: 1024,
        max: 16 * 1024 * 1024,
    };

    #[test]
    fn ten_mib_at_one_mib_is_ten_chunks() {
        let plan = ChunkPlan::new(10 * 1024 * 1024, 1024 * 1024, BOUNDS).unwrap();
        assert_eq!(plan.total_chunks(), 10);
        assert_eq!(plan.chunk_len(9), Some(1024 * 1024));
        assert_eq!(plan.chunk_len(10), None);
    }

    #[test]
    fn last_chunk_holds_remainder() {
        let plan = ChunkPlan::new(2500, 1024, BOUNDS).unwrap();
        assert_eq!(plan.total_chunks(), 3);
        assert_eq!(plan.chunk_len(0), Some(1024));
        assert_eq!(plan.chunk_len(2), Some(452));
        assert_eq!(plan.range(2), Some(2048..2500));
    }

    #[test]
    fn zero_size_rejected() {
        let err = ChunkPlan::new(0, 4096, BOUNDS).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSize);
    }

    #[test]
    fn chunk_size_bounds_enforced() {
        assert_eq!(
            ChunkPlan::new(100, 512, BOUNDS).unwrap_err().code(),
            ErrorCode::InvalidChunkSize
        );
        assert_eq!(
            ChunkPlan::new(100, 32 * 1024 * 1024, BOUNDS)
                .unwrap_err()
                .code(),
            ErrorCode::InvalidChunkSize
        );
        assert!(ChunkPlan::new(100, 1024, BOUNDS).is_ok());
    }

    #[test]
    fn zero_chunk_size_rejected_even_with_zero_minimum() {
        let open = ChunkBounds { min: 0, max: 4096 };
        let err = ChunkPlan::new(100, 0, open).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidChunkSize);
    }

    #[test]
    fn optimal_size_with_inverted_bounds_does_not_panic() {
        let config = ChunkingConfig {
            min_chunk_size: 8192,
            max_chunk_size: 1024,
            ..ChunkingConfig::default()
        };
        let chosen = optimal_chunk_size(10, &config);
        assert_eq!(chosen, 1024);
        let bounds = ChunkBounds::from(&config);
        assert!(ChunkPlan::new(10, chosen, bounds).is_err());
    }

    #[test]
    fn optimal_size_tiers() {
        let config = ChunkingConfig::default();
        assert_eq!(optimal_chunk_size(10 * 1024, &config), 64 * 1024);
        assert_eq!(optimal_chunk_size(100 * 1024 * 1024, &config), 1024 * 1024);
        assert_eq!(
            optimal_chunk_size(config.small_file_threshold, &config),
            config.default_chunk_size
        );
    }

    proptest! {
        /// Chunk ranges tile the plaintext without gaps or overlap
        #[test]
        fn ranges_cover_total(total in 1u64..=200_000, chunk in 1024usize..=65536) {
            let plan = ChunkPlan::new(total, chunk, BOUNDS).unwrap();
            let mut expected_start = 0usize;
            for i in 0..plan.total_chunks() {
                let r = plan.range(i).unwrap();
                prop_assert_eq!(r.start, expected_start);
                prop_assert!(!r.is_empty());
                expected_start = r.end;
            }
            prop_assert_eq!(expected_start as u64, total);
        }

        #[test]
        fn optimal_size_within_bounds(size in any::<u64>()) {
            let config = ChunkingConfig::default();
            let chosen = optimal_chunk_size(size, &config);
            prop_assert!(chosen >= config.min_chunk_size && chosen <= config.max_chunk_size);
        }
    }
}
