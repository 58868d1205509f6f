// Streaming tlz decoder.
//
// Decoder implements `Read` over any `Read` source:
//   - Input is staged in an internal buffer; tags and meta records are
//     parsed only once fully staged, so a partial tag consumes nothing
//   - Literal payloads stream straight from staging into the caller's buffer
//   - Copy ops replay bytes from the history block
//   - Running out of staged input is an internal signal (`Step::NeedInput`)
//     that pulls more from the source and resumes in the same state

use std::io::{self, Read};

use log::{debug, trace};

use crate::window::config::DecoderOptions;
use crate::window::ring::RingWindow;
use crate::wire::meta::{self, Meta, MetaError};
use crate::wire::tag::{self, Tag, TagError};

/// Initial staging capacity.
const INITIAL_BUF_SIZE: usize = 4 * 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A malformed stream. Fatal: the decoder must be reset before reuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("reserved tag byte {0:#04x}")]
    ReservedTag(u8),
    #[error("reserved offset byte {0:#04x}")]
    ReservedOffset(u8),
    #[error("unknown meta subtag {0:#04x}")]
    UnknownMeta(u8),
    #[error("reset record carries {0} payload bytes, expected 1")]
    BadReset(usize),
    #[error("bad magic {0:?}")]
    BadMagic(Vec<u8>),
    #[error("unsupported format version {found:?}, expected {expected:?}", expected = meta::VERSION)]
    BadVersion { found: String },
    #[error("stream does not start with a tlz header")]
    MissingHeader,
    #[error("data op before block reset")]
    MissingReset,
    #[error("block size 2^{bits} exceeds limit of {limit} bytes")]
    BlockTooLarge { bits: u8, limit: usize },
    #[error("copy of {len} bytes at offset {off} is outside the window (pos {pos}, block {block})")]
    CopyOutOfWindow {
        len: u64,
        off: u64,
        pos: u64,
        block: usize,
    },
}

/// Error returned by the decoder.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Malformed input at the tag starting at `offset`.
    #[error("malformed stream at offset {offset}: {source}")]
    Format { offset: u64, source: FormatError },
    /// The source ended inside a tag or op that starts at `offset`.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: u64 },
    /// The source failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Copy of a sticky error; `Io` errors are never sticky.
    fn replay(&self) -> Option<DecodeError> {
        match self {
            Self::Format { offset, source } => Some(Self::Format {
                offset: *offset,
                source: source.clone(),
            }),
            Self::UnexpectedEof { offset } => Some(Self::UnexpectedEof { offset: *offset }),
            Self::Io(_) => None,
        }
    }
}

impl From<DecodeError> for io::Error {
    fn from(e: DecodeError) -> io::Error {
        match e {
            DecodeError::Io(e) => e,
            e @ DecodeError::Format { .. } => io::Error::new(io::ErrorKind::InvalidData, e),
            e @ DecodeError::UnexpectedEof { .. } => {
                io::Error::new(io::ErrorKind::UnexpectedEof, e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Next staged byte starts a tag.
    Idle,
    /// `remaining` literal bytes still to come from the source.
    Literal { remaining: u64 },
    /// `remaining` bytes still to replay from history position `src`.
    Copy { remaining: u64, src: u64 },
}

/// Which header record the stream owes us next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Header {
    Magic,
    Version,
    Reset,
    Done,
}

impl Header {
    /// Data ops need a complete header first.
    pub(crate) fn ready(self) -> Result<(), FormatError> {
        match self {
            Header::Done => Ok(()),
            Header::Magic | Header::Version => Err(FormatError::MissingHeader),
            Header::Reset => Err(FormatError::MissingReset),
        }
    }

    /// A magic record may restart the header at any point; version and
    /// reset must arrive in order.
    pub(crate) fn after_version(self) -> Result<Header, FormatError> {
        match self {
            Header::Version => Ok(Header::Reset),
            _ => Err(FormatError::MissingHeader),
        }
    }

    pub(crate) fn after_reset(self) -> Result<Header, FormatError> {
        match self {
            Header::Magic | Header::Version => Err(FormatError::MissingHeader),
            Header::Reset | Header::Done => Ok(Header::Done),
        }
    }
}

/// Outcome of one state-machine step.
enum Step {
    /// Produced this many output bytes (possibly 0 for control records).
    Ready(usize),
    /// Staged input is exhausted mid-tag or mid-literal.
    NeedInput,
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Streaming tlz decoder.
///
/// `read` returns `Ok(0)` only when the source ends exactly between ops.
/// Malformed or truncated input yields an `io::Error` (`InvalidData` or
/// `UnexpectedEof`) wrapping a [`DecodeError`]; those errors are sticky
/// until [`Decoder::reset`].
pub struct Decoder<R: Read> {
    source: R,
    opts: DecoderOptions,
    /// Staged input; live bytes are `buf[start..end]`.
    buf: Vec<u8>,
    start: usize,
    end: usize,
    /// Stream offset of `buf[start]`.
    consumed: u64,
    block: Option<RingWindow>,
    state: State,
    header: Header,
    /// Stream offset of the tag that opened the current op.
    op_offset: u64,
    failed: Option<DecodeError>,
    bytes_in: u64,
    bytes_out: u64,
}

impl<R: Read> Decoder<R> {
    pub fn new(source: R) -> Self {
        Self::with_options(source, DecoderOptions::default())
    }

    pub fn with_options(source: R, opts: DecoderOptions) -> Self {
        Self {
            source,
            opts,
            buf: vec![0u8; INITIAL_BUF_SIZE],
            start: 0,
            end: 0,
            consumed: 0,
            block: None,
            state: State::Idle,
            header: Header::Magic,
            op_offset: 0,
            failed: None,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Start decoding a new stream from `source`, returning the old source.
    ///
    /// Clears any sticky error. The block allocation is kept and reused if
    /// the new stream asks for the same size.
    pub fn reset(&mut self, source: R) -> R {
        self.start = 0;
        self.end = 0;
        self.consumed = 0;
        self.state = State::Idle;
        self.header = Header::Magic;
        self.op_offset = 0;
        self.failed = None;
        self.bytes_in = 0;
        self.bytes_out = 0;
        std::mem::replace(&mut self.source, source)
    }

    /// Compressed bytes pulled from the source.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Plaintext bytes produced.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Block size announced by the stream, once its header has been read.
    pub fn block_size(&self) -> Option<usize> {
        match self.header {
            Header::Done => self.block.as_ref().map(RingWindow::size),
            _ => None,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// True when the source may end here without truncating anything.
    fn at_boundary(&self) -> bool {
        self.state == State::Idle && self.start == self.end
    }

    fn fail(&mut self, e: DecodeError) -> io::Error {
        if let Some(sticky) = e.replay() {
            self.failed = Some(sticky);
        }
        e.into()
    }

    fn format_error(&self, offset: u64, source: FormatError) -> DecodeError {
        DecodeError::Format { offset, source }
    }

    fn consume(&mut self, n: usize) {
        self.start += n;
        self.consumed += n as u64;
    }

    /// Pull more input from the source. Returns the number of bytes added;
    /// 0 means the source is exhausted.
    fn fill(&mut self) -> io::Result<usize> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        if self.end == self.buf.len() {
            let grown = self.buf.len() * 2;
            debug!("tlz decoder: staging buffer grows to {grown}");
            self.buf.resize(grown, 0);
        }
        loop {
            match self.source.read(&mut self.buf[self.end..]) {
                Ok(n) => {
                    self.end += n;
                    self.bytes_in += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Advance the state machine once, writing into `out` (non-empty).
    fn step(&mut self, out: &mut [u8]) -> Result<Step, DecodeError> {
        match self.state {
            State::Idle => self.read_op(),
            State::Literal { remaining } => {
                let avail = self.end - self.start;
                if avail == 0 {
                    return Ok(Step::NeedInput);
                }
                let n = clamp_len(remaining, avail.min(out.len()));
                out[..n].copy_from_slice(&self.buf[self.start..self.start + n]);
                self.consume(n);
                let offset = self.op_offset;
                let Some(block) = self.block.as_mut() else {
                    return Err(DecodeError::Format {
                        offset,
                        source: FormatError::MissingReset,
                    });
                };
                block.extend(&out[..n]);
                let remaining = remaining - n as u64;
                self.state = if remaining == 0 {
                    State::Idle
                } else {
                    State::Literal { remaining }
                };
                Ok(Step::Ready(n))
            }
            State::Copy { remaining, src } => {
                let n = clamp_len(remaining, out.len());
                let offset = self.op_offset;
                let Some(block) = self.block.as_mut() else {
                    return Err(DecodeError::Format {
                        offset,
                        source: FormatError::MissingReset,
                    });
                };
                // The source range ends at or before `pos`, so reading it
                // before appending never sees bytes this op overwrites.
                block.copy_out(src, &mut out[..n]);
                block.extend(&out[..n]);
                let remaining = remaining - n as u64;
                self.state = if remaining == 0 {
                    State::Idle
                } else {
                    State::Copy {
                        remaining,
                        src: src + n as u64,
                    }
                };
                Ok(Step::Ready(n))
            }
        }
    }

    /// Parse the next tag (and its offset or meta body) from staging.
    fn read_op(&mut self) -> Result<Step, DecodeError> {
        let at = self.consumed;
        let data = &self.buf[self.start..self.end];

        let (tag, mut used) = match tag::read_tag(data) {
            Ok(v) => v,
            Err(TagError::Truncated { .. }) => return Ok(Step::NeedInput),
            Err(TagError::Reserved(b)) => {
                return Err(self.format_error(at, FormatError::ReservedTag(b)));
            }
        };

        match tag {
            Tag::Meta => {
                let (record, n) = match meta::read_meta(&data[used..]) {
                    Ok((record, n)) => (MetaRecord::from_meta(record), n),
                    Err(MetaError::Truncated { .. }) => return Ok(Step::NeedInput),
                    Err(MetaError::UnknownSubtag(b)) => {
                        return Err(self.format_error(at, FormatError::UnknownMeta(b)));
                    }
                    Err(MetaError::BadReset(n)) => {
                        return Err(self.format_error(at, FormatError::BadReset(n)));
                    }
                };
                used += n;
                self.apply_meta(record)
                    .map_err(|e| self.format_error(at, e))?;
            }
            Tag::Literal(len) => {
                self.check_ready().map_err(|e| self.format_error(at, e))?;
                trace!("tlz lit  at={at} len={len}");
                if len > 0 {
                    self.state = State::Literal { remaining: len };
                }
            }
            Tag::Copy(len) => {
                let (off, n) = match tag::read_offset(&data[used..]) {
                    Ok(v) => v,
                    Err(TagError::Truncated { .. }) => return Ok(Step::NeedInput),
                    Err(TagError::Reserved(b)) => {
                        return Err(self.format_error(at, FormatError::ReservedOffset(b)));
                    }
                };
                used += n;
                self.check_ready().map_err(|e| self.format_error(at, e))?;
                let src = self
                    .copy_source(len, off)
                    .map_err(|e| self.format_error(at, e))?;
                trace!("tlz copy at={at} len={len} off={off}");
                if len > 0 {
                    self.state = State::Copy { remaining: len, src };
                }
            }
        }

        self.op_offset = at;
        self.consume(used);
        Ok(Step::Ready(0))
    }

    fn check_ready(&self) -> Result<(), FormatError> {
        self.header.ready()
    }

    /// Absolute history position a Copy op reads from.
    fn copy_source(&self, len: u64, off: u64) -> Result<u64, FormatError> {
        let Some(block) = self.block.as_ref() else {
            return Err(FormatError::MissingReset);
        };
        let pos = block.pos();
        let out_of_window = || FormatError::CopyOutOfWindow {
            len,
            off,
            pos,
            block: block.size(),
        };
        let back = off.checked_add(len).ok_or_else(out_of_window)?;
        if back > block.size() as u64 || back > pos {
            return Err(out_of_window());
        }
        Ok(pos - back)
    }

    fn apply_meta(&mut self, record: MetaRecord) -> Result<(), FormatError> {
        match record {
            MetaRecord::Magic { ok: false, found } => Err(FormatError::BadMagic(found)),
            MetaRecord::Magic { ok: true, .. } => {
                debug!("tlz decoder: stream magic");
                self.header = Header::Version;
                Ok(())
            }
            MetaRecord::Version { ok, found } => {
                let next = self.header.after_version()?;
                if !ok {
                    return Err(FormatError::BadVersion { found });
                }
                debug!("tlz decoder: format version {}", meta::VERSION);
                self.header = next;
                Ok(())
            }
            MetaRecord::Reset(bits) => {
                let next = self.header.after_reset()?;
                self.reset_block(bits)?;
                self.header = next;
                Ok(())
            }
        }
    }

    fn reset_block(&mut self, bits: u8) -> Result<(), FormatError> {
        let too_large = || FormatError::BlockTooLarge {
            bits,
            limit: self.opts.max_block_size,
        };
        let size = 1usize.checked_shl(u32::from(bits)).ok_or_else(too_large)?;
        if size > self.opts.max_block_size {
            return Err(too_large());
        }
        match self.block.as_mut() {
            Some(block) if block.bits() == bits => {
                debug!("tlz decoder: reset block 2^{bits}");
                block.reset();
            }
            _ => {
                debug!("tlz decoder: allocate block 2^{bits}");
                self.block = Some(RingWindow::with_bits(bits));
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if let Some(e) = self.failed.as_ref().and_then(DecodeError::replay) {
            return Err(e.into());
        }
        if out.is_empty() {
            return Ok(0);
        }

        let mut filled = 0usize;
        while filled < out.len() {
            match self.step(&mut out[filled..]) {
                Ok(Step::Ready(n)) => filled += n,
                Ok(Step::NeedInput) => {
                    // Hand back what we have rather than block on the source.
                    if filled > 0 {
                        break;
                    }
                    if self.fill()? == 0 {
                        if self.at_boundary() {
                            break;
                        }
                        let offset = match self.state {
                            State::Idle => self.consumed,
                            _ => self.op_offset,
                        };
                        return Err(self.fail(DecodeError::UnexpectedEof { offset }));
                    }
                }
                Err(e) => {
                    let e = self.fail(e);
                    if filled > 0 {
                        break;
                    }
                    return Err(e);
                }
            }
        }

        self.bytes_out += filled as u64;
        Ok(filled)
    }
}

/// Owned summary of a meta record, so staging can be released before the
/// decoder state is updated.
enum MetaRecord {
    Magic { ok: bool, found: Vec<u8> },
    Version { ok: bool, found: String },
    Reset(u8),
}

impl MetaRecord {
    fn from_meta(m: Meta<'_>) -> Self {
        match m {
            Meta::Magic(p) => {
                let ok = p == meta::MAGIC;
                MetaRecord::Magic {
                    ok,
                    found: if ok { Vec::new() } else { p.to_vec() },
                }
            }
            Meta::Version(p) => {
                let ok = p == meta::VERSION.as_bytes();
                MetaRecord::Version {
                    ok,
                    found: if ok {
                        String::new()
                    } else {
                        String::from_utf8_lossy(p).into_owned()
                    },
                }
            }
            Meta::Reset(bits) => MetaRecord::Reset(bits),
        }
    }
}

#[inline]
fn clamp_len(remaining: u64, limit: usize) -> usize {
    usize::try_from(remaining).map_or(limit, |r| r.min(limit))
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Decompress a complete in-memory stream.
pub fn decompress_all(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut dec = Decoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        match dec.read(&mut chunk) {
            Ok(0) => return Ok(out),
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) => return Err(into_decode_error(e)),
        }
    }
}

/// Recover the `DecodeError` carried by an `io::Error` from `Decoder::read`.
pub fn into_decode_error(e: io::Error) -> DecodeError {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
            if e.get_ref().is_some_and(|inner| inner.is::<DecodeError>()) =>
        {
            match e.into_inner().map(|inner| inner.downcast::<DecodeError>()) {
                Some(Ok(inner)) => *inner,
                Some(Err(other)) => DecodeError::Io(io::Error::other(other)),
                None => DecodeError::Io(io::Error::other("decoder error")),
            }
        }
        _ => DecodeError::Io(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
