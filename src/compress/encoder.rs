// Streaming tlz encoder.
//
// Encoder implements `Write`:
//   - The first non-empty write emits the stream header
//   - Each chunk is scanned once; back-references are found through the
//     4-byte match index and checked against the history block
//   - Every op's plaintext is appended to the encoder's own block, so the
//     block mirrors what a decoder reconstructs
//   - The tagged bytes for a chunk are handed to the sink in one write_all

use std::io::{self, Write};

use log::{debug, trace, warn};

use crate::window::config::{self, EncoderOptions};
use crate::window::index::{HASH_LOOK, MatchIndex};
use crate::window::ring::RingWindow;
use crate::wire::meta;
use crate::wire::tag::{self, Kind};

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Streaming block-windowed LZ encoder.
///
/// One instance models one compressed stream. Calls must be serialized by
/// the caller.
///
/// # Example
/// ```
/// use std::io::Write;
/// use tlz::compress::Encoder;
///
/// let mut enc = Encoder::new(Vec::new(), 1 << 16);
/// enc.write_all(b"first event\n").unwrap();
/// enc.write_all(b"second event\n").unwrap();
/// let compressed = enc.into_inner();
/// assert!(compressed.starts_with(b"\x7f\x03tlz"));
/// ```
pub struct Encoder<W: Write> {
    sink: W,
    block: RingWindow,
    index: MatchIndex,
    /// Tagged output for the chunk being encoded.
    out: Vec<u8>,
    /// Header already emitted for this stream.
    started: bool,
    bytes_in: u64,
    bytes_out: u64,
}

impl<W: Write> Encoder<W> {
    /// Create an encoder with a `block_size` history window and the derived
    /// match index size.
    pub fn new(sink: W, block_size: usize) -> Self {
        Self::with_options(sink, EncoderOptions::with_block_size(block_size))
    }

    /// Create an encoder with an explicit match index size.
    pub fn with_hash_table_size(sink: W, block_size: usize, hash_table_size: usize) -> Self {
        Self::with_options(
            sink,
            EncoderOptions {
                block_size,
                hash_table_size,
            },
        )
    }

    /// Create an encoder from options. Sizes are rounded up to powers of two.
    pub fn with_options(sink: W, opts: EncoderOptions) -> Self {
        let opts = opts.normalized();
        debug!(
            "tlz encoder: block {} bytes, index {} buckets",
            opts.block_size, opts.hash_table_size
        );
        Self {
            sink,
            block: RingWindow::with_bits(config::block_bits(opts.block_size)),
            index: MatchIndex::new(opts.hash_table_size),
            out: Vec::new(),
            started: false,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Start a fresh stream on `sink`, returning the previous sink.
    ///
    /// The block and index are cleared in place; the next write emits a new
    /// header.
    pub fn reset(&mut self, sink: W) -> W {
        self.clear();
        std::mem::replace(&mut self.sink, sink)
    }

    fn clear(&mut self) {
        self.block.reset();
        self.index.reset();
        self.out.clear();
        self.started = false;
        self.bytes_in = 0;
        self.bytes_out = 0;
    }

    /// History block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block.size()
    }

    /// Match index bucket count.
    pub fn hash_table_size(&self) -> usize {
        self.index.size()
    }

    /// Plaintext bytes accepted since the stream started.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Tagged bytes handed to the sink since the stream started.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Consume the encoder, returning the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Encode one chunk into `self.out`.
    fn encode_chunk(&mut self, p: &[u8]) {
        let size = self.block.size() as u64;
        let base = self.block.pos();
        let n = p.len();

        // p[..done] has been emitted; p[done..i] is pending literal.
        let mut done = 0usize;
        let mut i = 0usize;

        while i + HASH_LOOK < n {
            let cpy = base + i as u64;
            let bucket = self.index.bucket(&p[i..]);
            let Some(bck) = self.index.replace(bucket, cpy) else {
                i += 1;
                continue;
            };
            if bck >= cpy || cpy - bck > size {
                i += 1;
                continue;
            }

            let dist = (cpy - bck) as usize;
            let (st, end) = self.extend_match(p, base, done, i, dist);
            let len = end - st;
            let off = (dist - len) as u64;
            if len <= config::min_match_len(off) {
                i += 1;
                continue;
            }

            self.emit_literal(&p[done..st]);
            self.emit_copy(&p[st..end], off);
            i = end;
            done = end;
        }

        self.emit_literal(&p[done..]);
    }

    /// Grow a candidate at `p[i]` with source `dist` bytes back, first
    /// forward then backward. The match never grows past `dist` bytes, so
    /// its source ends before its own start, and never reaches back into
    /// `p[..done]`, which is already emitted.
    fn extend_match(
        &self,
        p: &[u8],
        base: u64,
        done: usize,
        i: usize,
        dist: usize,
    ) -> (usize, usize) {
        let dist64 = dist as u64;
        let mut st = i;
        let mut end = i;

        while end < p.len()
            && end - st < dist
            && self.history_byte(p, base, base + end as u64 - dist64) == p[end]
        {
            end += 1;
        }

        while st > done
            && end - st < dist
            && base + st as u64 > dist64
            && self.history_byte(p, base, base + st as u64 - 1 - dist64) == p[st - 1]
        {
            st -= 1;
        }

        (st, end)
    }

    /// Byte at absolute position `abs`, taken from the chunk when it belongs
    /// to it and from the block otherwise.
    #[inline(always)]
    fn history_byte(&self, p: &[u8], base: u64, abs: u64) -> u8 {
        if abs >= base {
            p[(abs - base) as usize]
        } else {
            self.block.read_at(abs)
        }
    }

    /// Encode `buf` into the scratch buffer, preceded by the header if this
    /// is the stream's first chunk.
    fn stage(&mut self, buf: &[u8]) {
        self.out.clear();
        if !self.started {
            debug!(
                "tlz encoder: stream header, block 2^{}",
                self.block.bits()
            );
            meta::append_header(&mut self.out, self.block.bits());
            self.started = true;
        }
        self.encode_chunk(buf);
    }

    fn commit(&mut self, consumed: usize) {
        self.bytes_in += consumed as u64;
        self.bytes_out += self.out.len() as u64;
    }

    fn emit_literal(&mut self, lit: &[u8]) {
        if lit.is_empty() {
            return;
        }
        trace!("tlz lit  pos={} len={}", self.block.pos(), lit.len());
        tag::append_tag(&mut self.out, Kind::Literal, lit.len() as u64);
        self.out.extend_from_slice(lit);
        self.block.extend(lit);
    }

    fn emit_copy(&mut self, plain: &[u8], off: u64) {
        trace!(
            "tlz copy pos={} len={} off={off}",
            self.block.pos(),
            plain.len()
        );
        tag::append_tag(&mut self.out, Kind::Copy, plain.len() as u64);
        tag::append_offset(&mut self.out, off);
        self.block.extend(plain);
    }
}

impl<W: Write> Write for Encoder<W> {
    /// Encode `buf` completely and hand the tagged bytes to the sink.
    ///
    /// A sink failure leaves the stream unrecoverable: the encoder is reset
    /// and the next write starts a new stream with a fresh header.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        self.stage(buf);

        if let Err(e) = self.sink.write_all(&self.out) {
            warn!("tlz encoder: sink write failed, stream reset: {e}");
            self.clear();
            return Err(e);
        }

        self.commit(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Compress `data` as a single chunk with a `block_size` history window.
pub fn compress_all(data: &[u8], block_size: usize) -> Vec<u8> {
    let mut enc = Encoder::new(Vec::with_capacity(data.len() / 2 + 16), block_size);
    enc.append(data);
    enc.into_inner()
}

impl Encoder<Vec<u8>> {
    /// Infallible counterpart of `write` for an in-memory sink.
    pub fn append(&mut self, buf: &[u8]) {
        if buf.is_empty() {
            return;
        }
        self.stage(buf);
        self.sink.extend_from_slice(&self.out);
        self.commit(buf.len());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
