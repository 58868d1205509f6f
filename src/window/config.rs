// Block and hash-table sizing.

use crate::wire::tag::OFF1;

/// Default history block (1 MiB).
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 20;

/// Smallest block the encoder will allocate.
pub const MIN_BLOCK_SIZE: usize = 16;

/// Largest block either side will allocate (1 GiB).
pub const MAX_BLOCK_SIZE: usize = 1 << 30;

/// Smallest match index.
pub const MIN_HASH_TABLE_SIZE: usize = 16;

/// Largest match index accepted from callers.
pub const MAX_HASH_TABLE_SIZE: usize = 1 << 26;

/// Cap for the index size derived from the block size.
pub const DEFAULT_MAX_HASH_TABLE_SIZE: usize = 1 << 16;

/// Matches must be longer than this when the offset fits in one byte.
pub const MIN_MATCH: usize = 4;

/// Matches must be longer than this when the offset needs an escape.
pub const MIN_MATCH_FAR: usize = 6;

/// Round `size` up to a power of two within `[MIN_BLOCK_SIZE, MAX_BLOCK_SIZE]`.
pub fn normalize_block_size(size: usize) -> usize {
    size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE).next_power_of_two()
}

/// Round `size` up to a power of two within the hash table limits.
pub fn normalize_hash_table_size(size: usize) -> usize {
    size.clamp(MIN_HASH_TABLE_SIZE, MAX_HASH_TABLE_SIZE)
        .next_power_of_two()
}

/// Index size used when the caller does not pick one: a quarter of the block.
pub fn default_hash_table_size(block_size: usize) -> usize {
    normalize_hash_table_size(normalize_block_size(block_size) / 4)
        .min(DEFAULT_MAX_HASH_TABLE_SIZE)
}

/// log2 of a power-of-two block size.
#[inline]
pub fn block_bits(block_size: usize) -> u8 {
    debug_assert!(block_size.is_power_of_two());
    block_size.trailing_zeros() as u8
}

/// Length a match must exceed to be worth a Copy op at offset `off`.
#[inline]
pub fn min_match_len(off: u64) -> usize {
    if off < u64::from(OFF1) {
        MIN_MATCH
    } else {
        MIN_MATCH_FAR
    }
}

/// Encoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    /// History block size in bytes (rounded up to a power of two).
    pub block_size: usize,
    /// Match index buckets (rounded up to a power of two).
    pub hash_table_size: usize,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }
}

impl EncoderOptions {
    /// Options for `block_size` with the derived index size.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size,
            hash_table_size: default_hash_table_size(block_size),
        }
    }

    /// Both sizes rounded and clamped to what will actually be allocated.
    pub fn normalized(self) -> Self {
        Self {
            block_size: normalize_block_size(self.block_size),
            hash_table_size: normalize_hash_table_size(self.hash_table_size),
        }
    }
}

/// Decoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Largest block a stream may request via its reset record.
    pub max_block_size: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_block_size: MAX_BLOCK_SIZE,
        }
    }
}
