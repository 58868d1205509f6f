// History block: a power-of-two ring addressed by absolute stream position.
//
// `pos` counts every byte ever appended. The byte at absolute position `p`
// lives at `p & mask` and is retained while `pos - p <= size`.

/// Fixed-size history ring shared in shape by encoder and decoder.
#[derive(Debug, Clone)]
pub struct RingWindow {
    buf: Vec<u8>,
    mask: u64,
    bits: u8,
    pos: u64,
}

impl RingWindow {
    /// Allocate a ring of `1 << bits` bytes.
    pub fn with_bits(bits: u8) -> Self {
        let size = 1usize << bits;
        Self {
            buf: vec![0u8; size],
            mask: size as u64 - 1,
            bits,
            pos: 0,
        }
    }

    /// Zero the ring and rewind to position 0, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.fill(0);
        self.pos = 0;
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Absolute position of the next byte to be appended.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    #[inline(always)]
    fn index(&self, abs: u64) -> usize {
        (abs & self.mask) as usize
    }

    /// True if the byte at `abs` has been written and not yet overwritten.
    #[inline]
    pub fn is_within_retained_window(&self, abs: u64) -> bool {
        abs < self.pos && self.pos - abs <= self.buf.len() as u64
    }

    /// Byte at absolute position `abs`. Meaningful only inside the window.
    #[inline(always)]
    pub fn read_at(&self, abs: u64) -> u8 {
        debug_assert!(self.is_within_retained_window(abs));
        self.buf[self.index(abs)]
    }

    /// Overwrite the slot for `abs` without moving `pos`.
    #[inline(always)]
    pub fn write_at(&mut self, abs: u64, byte: u8) {
        let i = self.index(abs);
        self.buf[i] = byte;
    }

    /// Append one byte at `pos`.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.write_at(self.pos, byte);
        self.pos += 1;
    }

    /// Append `data` at `pos`, wrapping as needed.
    ///
    /// Input longer than the ring only leaves its last `size` bytes behind,
    /// but `pos` still advances by the full length.
    pub fn extend(&mut self, data: &[u8]) {
        let size = self.buf.len();
        let total = data.len() as u64;
        let (start, tail) = if data.len() > size {
            (self.pos + total - size as u64, &data[data.len() - size..])
        } else {
            (self.pos, data)
        };

        let at = self.index(start);
        let first = tail.len().min(size - at);
        self.buf[at..at + first].copy_from_slice(&tail[..first]);
        self.buf[..tail.len() - first].copy_from_slice(&tail[first..]);

        self.pos += total;
    }

    /// Copy `out.len()` bytes starting at absolute position `abs` into `out`.
    ///
    /// The whole range must lie inside the retained window.
    pub fn copy_out(&self, abs: u64, out: &mut [u8]) {
        debug_assert!(out.is_empty() || self.is_within_retained_window(abs));
        debug_assert!(abs + out.len() as u64 <= self.pos);
        let size = self.buf.len();
        let at = self.index(abs);
        let first = out.len().min(size - at);
        out[..first].copy_from_slice(&self.buf[at..at + first]);
        let rest = out.len() - first;
        out[first..].copy_from_slice(&self.buf[..rest]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_read_back() {
        let mut r = RingWindow::with_bits(3);
        for b in 0..5u8 {
            r.push(b);
        }
        assert_eq!(r.pos(), 5);
        assert_eq!(r.read_at(0), 0);
        assert_eq!(r.read_at(4), 4);
        assert!(!r.is_within_retained_window(5));
    }

    #[test]
    fn extend_wraps_around() {
        let mut r = RingWindow::with_bits(3);
        r.extend(b"abcdef");
        r.extend(b"ghij");
        assert_eq!(r.pos(), 10);
        // Positions 0 and 1 were overwritten by 8 and 9.
        assert!(!r.is_within_retained_window(1));
        assert!(r.is_within_retained_window(2));
        let mut out = [0u8; 8];
        r.copy_out(2, &mut out);
        assert_eq!(&out, b"cdefghij");
    }

    #[test]
    fn extend_longer_than_ring_keeps_tail() {
        let mut r = RingWindow::with_bits(2);
        r.extend(b"0123456789");
        assert_eq!(r.pos(), 10);
        let mut out = [0u8; 4];
        r.copy_out(6, &mut out);
        assert_eq!(&out, b"6789");
    }

    #[test]
    fn copy_out_across_wrap() {
        let mut r = RingWindow::with_bits(2);
        r.extend(b"abc");
        r.extend(b"de");
        // Physical layout: e b c d; logical 1..5 = b c d e
        let mut out = [0u8; 4];
        r.copy_out(1, &mut out);
        assert_eq!(&out, b"bcde");
    }

    #[test]
    fn reset_clears_without_reallocating() {
        let mut r = RingWindow::with_bits(4);
        r.extend(b"hello");
        r.reset();
        assert_eq!(r.pos(), 0);
        assert_eq!(r.size(), 16);
        assert!(!r.is_within_retained_window(0));
        r.push(b'x');
        assert_eq!(r.read_at(0), b'x');
    }

    #[test]
    fn write_at_does_not_move_pos() {
        let mut r = RingWindow::with_bits(2);
        r.extend(b"abcd");
        r.write_at(5, b'z');
        assert_eq!(r.pos(), 4);
        assert_eq!(r.read_at(1), b'z');
    }
}
