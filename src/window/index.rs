// Match index: single-entry-per-bucket hash of 4-byte prefixes.
//
// Each bucket holds the last absolute position whose 4 bytes hashed there.
// Stored values carry HASH_CKOFFSET so that 0 means "empty bucket".

/// LCG multiplier for the 4-byte hash.
pub const HASH_MULT_32: u32 = 1_597_334_677;

/// Offset added to stored positions so 0 means "empty bucket".
pub const HASH_CKOFFSET: u64 = 1;

/// Bytes hashed per position.
pub const HASH_LOOK: usize = 4;

/// Hash the first four bytes of `window`.
///
/// The bytes are read little-endian so streams hash identically on every
/// target.
#[inline(always)]
pub fn hash4(window: &[u8]) -> u32 {
    let v = u32::from_le_bytes([window[0], window[1], window[2], window[3]]);
    v.wrapping_mul(HASH_MULT_32)
}

/// Last-seen-position table keyed by `hash4`.
pub struct MatchIndex {
    table: Vec<u64>,
    /// `32 - log2(size)`: the bucket is the top bits of the hash.
    shift: u32,
}

impl MatchIndex {
    /// Create a table with `size` buckets (a power of two).
    pub fn new(size: usize) -> Self {
        debug_assert!(size.is_power_of_two());
        let bits = size.trailing_zeros();
        Self {
            table: vec![0u64; size],
            shift: 32 - bits,
        }
    }

    /// Forget every stored position.
    pub fn reset(&mut self) {
        self.table.fill(0);
    }

    /// Bucket count.
    pub fn size(&self) -> usize {
        self.table.len()
    }

    /// Bucket for the 4 bytes at the front of `window`.
    #[inline(always)]
    pub fn bucket(&self, window: &[u8]) -> usize {
        hash4(window).checked_shr(self.shift).unwrap_or(0) as usize
    }

    /// Record `pos` in `bucket`, returning the position it replaces.
    #[inline(always)]
    pub fn replace(&mut self, bucket: usize, pos: u64) -> Option<u64> {
        let old = std::mem::replace(&mut self.table[bucket], pos + HASH_CKOFFSET);
        old.checked_sub(HASH_CKOFFSET)
    }

    /// Position stored in `bucket`, if any.
    #[inline]
    pub fn lookup(&self, bucket: usize) -> Option<u64> {
        self.table[bucket].checked_sub(HASH_CKOFFSET)
    }
}
