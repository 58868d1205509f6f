// Human-readable rendering of a tlz stream.
//
// Dumper parses the same tag stream as the decoder but keeps no history:
// it only tracks the plaintext position so copy sources can be printed.
// One line per op:
//
//        0  meta  magic "tlz"
//        5  meta  version "001"
//        a  meta  reset  block 2^5 (32)
//        d  lit   len 18  "prefix_1234_suffix"
//       20  copy  len 7  off 11  src 0
//
// Offsets are stream offsets in hex; `src` is the absolute plaintext
// position the copy reads from.

use std::io::{self, Write};

use crate::compress::decoder::{DecodeError, FormatError, Header};
use crate::window::config::MAX_BLOCK_SIZE;
use crate::wire::meta::{self, Meta, MetaError};
use crate::wire::tag::{self, Tag, TagError};

/// Literal bytes shown per line.
pub const LITERAL_PREVIEW: usize = 64;

/// Diagnostic sink that renders a tlz stream as text into `W`.
pub struct Dumper<W: Write> {
    sink: W,
    /// Unparsed input; `pending[0]` sits at stream offset `offset`.
    pending: Vec<u8>,
    offset: u64,
    /// Literal payload still to skip after its preview was printed.
    skip: u64,
    /// Stream offset of the op being skipped.
    op_offset: u64,
    /// Plaintext position.
    pos: u64,
    block: Option<u64>,
    /// Header record expected next, tracked as the decoder does.
    header: Header,
    ops: u64,
    failed: Option<(u64, FormatError)>,
    out: Vec<u8>,
}

impl<W: Write> Dumper<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            pending: Vec::new(),
            offset: 0,
            skip: 0,
            op_offset: 0,
            pos: 0,
            block: None,
            header: Header::Magic,
            ops: 0,
            failed: None,
            out: Vec::new(),
        }
    }

    /// Records rendered so far, meta records included.
    pub fn ops(&self) -> u64 {
        self.ops
    }

    /// Plaintext bytes described so far.
    pub fn decoded_len(&self) -> u64 {
        self.pos
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Check that the stream ended on an op boundary and return the sink.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some((offset, source)) = self.failed.take() {
            return Err(DecodeError::Format { offset, source }.into());
        }
        if self.skip > 0 {
            return Err(DecodeError::UnexpectedEof {
                offset: self.op_offset,
            }
            .into());
        }
        if !self.pending.is_empty() {
            return Err(DecodeError::UnexpectedEof {
                offset: self.offset,
            }
            .into());
        }
        self.sink.flush()?;
        Ok(self.sink)
    }

    /// Render every complete op in `pending`, returning bytes consumed.
    fn render(&mut self) -> Result<usize, (u64, FormatError)> {
        let mut at = 0usize;
        loop {
            if self.skip > 0 {
                let n = clamp(self.skip, self.pending.len() - at);
                at += n;
                self.skip -= n as u64;
                if self.skip > 0 {
                    return Ok(at);
                }
            }

            let data = &self.pending[at..];
            let here = self.offset + at as u64;
            let (tag, used) = match tag::read_tag(data) {
                Ok(v) => v,
                Err(TagError::Truncated { .. }) => return Ok(at),
                Err(TagError::Reserved(b)) => return Err((here, FormatError::ReservedTag(b))),
            };

            match tag {
                Tag::Meta => {
                    let (record, n) = match meta::read_meta(&data[used..]) {
                        Ok(v) => v,
                        Err(MetaError::Truncated { .. }) => return Ok(at),
                        Err(MetaError::UnknownSubtag(b)) => {
                            return Err((here, FormatError::UnknownMeta(b)));
                        }
                        Err(MetaError::BadReset(n)) => {
                            return Err((here, FormatError::BadReset(n)));
                        }
                    };
                    let line = match record {
                        Meta::Magic(p) if p == meta::MAGIC => {
                            self.header = Header::Version;
                            format!("{here:8x}  meta  magic \"{}\"", p.escape_ascii())
                        }
                        Meta::Magic(p) => return Err((here, FormatError::BadMagic(p.to_vec()))),
                        Meta::Version(p) => {
                            let next = self.header.after_version().map_err(|e| (here, e))?;
                            if p != meta::VERSION.as_bytes() {
                                let found = String::from_utf8_lossy(p).into_owned();
                                return Err((here, FormatError::BadVersion { found }));
                            }
                            self.header = next;
                            format!("{here:8x}  meta  version \"{}\"", p.escape_ascii())
                        }
                        Meta::Reset(bits) => {
                            let next = self.header.after_reset().map_err(|e| (here, e))?;
                            let size = 1u64
                                .checked_shl(u32::from(bits))
                                .filter(|&s| s <= MAX_BLOCK_SIZE as u64)
                                .ok_or((
                                    here,
                                    FormatError::BlockTooLarge {
                                        bits,
                                        limit: MAX_BLOCK_SIZE,
                                    },
                                ))?;
                            self.block = Some(size);
                            self.header = next;
                            self.pos = 0;
                            format!("{here:8x}  meta  reset  block 2^{bits} ({size})")
                        }
                    };
                    at += used + n;
                    self.emit(&line);
                }
                Tag::Literal(len) => {
                    self.header.ready().map_err(|e| (here, e))?;
                    let shown = clamp(len, LITERAL_PREVIEW);
                    if data.len() < used + shown {
                        return Ok(at);
                    }
                    let preview = &data[used..used + shown];
                    let more = if (shown as u64) < len { "..." } else { "" };
                    let line = format!(
                        "{here:8x}  lit   len {len}  \"{}\"{more}",
                        preview.escape_ascii()
                    );
                    at += used + shown;
                    self.pos += len;
                    self.skip = len - shown as u64;
                    self.op_offset = here;
                    self.emit(&line);
                }
                Tag::Copy(len) => {
                    let (off, n) = match tag::read_offset(&data[used..]) {
                        Ok(v) => v,
                        Err(TagError::Truncated { .. }) => return Ok(at),
                        Err(TagError::Reserved(b)) => {
                            return Err((here, FormatError::ReservedOffset(b)));
                        }
                    };
                    self.header.ready().map_err(|e| (here, e))?;
                    let Some(block) = self.block else {
                        return Err((here, FormatError::MissingReset));
                    };
                    let src = off
                        .checked_add(len)
                        .filter(|&back| back <= block && back <= self.pos)
                        .map(|back| self.pos - back)
                        .ok_or((
                            here,
                            FormatError::CopyOutOfWindow {
                                len,
                                off,
                                pos: self.pos,
                                block: block as usize,
                            },
                        ))?;
                    let line = format!("{here:8x}  copy  len {len}  off {off}  src {src:x}");
                    at += used + n;
                    self.pos += len;
                    self.emit(&line);
                }
            }
        }
    }

    fn emit(&mut self, line: &str) {
        self.out.extend_from_slice(line.as_bytes());
        self.out.push(b'\n');
        self.ops += 1;
    }
}

impl<W: Write> Write for Dumper<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some((offset, source)) = &self.failed {
            return Err(DecodeError::Format {
                offset: *offset,
                source: source.clone(),
            }
            .into());
        }

        self.pending.extend_from_slice(buf);
        let result = self.render();
        let used = match result {
            Ok(used) => used,
            Err((offset, source)) => {
                self.failed = Some((offset, source.clone()));
                // Lines rendered before the bad tag still reach the sink.
                self.sink.write_all(&self.out)?;
                self.out.clear();
                return Err(DecodeError::Format { offset, source }.into());
            }
        };
        self.pending.drain(..used);
        self.offset += used as u64;

        self.sink.write_all(&self.out)?;
        self.out.clear();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

#[inline]
fn clamp(n: u64, limit: usize) -> usize {
    usize::try_from(n).map_or(limit, |n| n.min(limit))
}

/// Render a complete in-memory stream.
pub fn dump_all(data: &[u8]) -> io::Result<String> {
    let mut d = Dumper::new(Vec::new());
    d.write_all(data)?;
    let out = d.finish()?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::decoder::{decompress_all, into_decode_error};
    use crate::compress::encoder::{Encoder, compress_all};

    fn two_chunk_stream() -> Vec<u8> {
        let mut enc = Encoder::new(Vec::new(), 32);
        enc.write_all(b"prefix_1234_suffix").unwrap();
        enc.write_all(b"prefix_567_suffix").unwrap();
        enc.into_inner()
    }

    #[test]
    fn renders_reference_stream() {
        let text = dump_all(&two_chunk_stream()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "       0  meta  magic \"tlz\"",
                "       5  meta  version \"001\"",
                "       a  meta  reset  block 2^5 (32)",
                "       d  lit   len 18  \"prefix_1234_suffix\"",
                "      20  copy  len 7  off 11  src 0",
                "      22  lit   len 3  \"567\"",
                "      26  copy  len 7  off 10  src b",
            ]
        );
    }

    #[test]
    fn byte_at_a_time_matches_bulk() {
        let stream = two_chunk_stream();
        let bulk = dump_all(&stream).unwrap();

        let mut d = Dumper::new(Vec::new());
        for b in &stream {
            d.write_all(std::slice::from_ref(b)).unwrap();
        }
        assert_eq!(d.ops(), 7);
        assert_eq!(d.decoded_len(), 35);
        let out = d.finish().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), bulk);
    }

    #[test]
    fn long_literal_is_previewed() {
        let data: Vec<u8> = (0..=199u8).collect();
        let text = dump_all(&compress_all(&data, 1024)).unwrap();
        let lit = text.lines().nth(3).unwrap();
        assert!(lit.contains("lit   len 200"));
        assert!(lit.ends_with("\"..."));
    }

    #[test]
    fn reserved_tag_reports_offset() {
        let mut stream = compress_all(b"abc", 32);
        let bad_at = stream.len() as u64;
        stream.push(0xFF);
        let mut d = Dumper::new(Vec::new());
        let err = d.write_all(&stream).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(matches!(
            into_decode_error(err),
            DecodeError::Format {
                offset,
                source: FormatError::ReservedTag(0xFF)
            } if offset == bad_at
        ));
        // Ops before the bad tag were still rendered.
        assert_eq!(d.ops(), 4);
        assert!(d.write(b"\x01a").is_err());
    }

    #[test]
    fn finish_reports_truncated_op() {
        let stream = compress_all(b"abcdefgh", 32);
        let mut d = Dumper::new(Vec::new());
        d.write_all(&stream[..stream.len() - 2]).unwrap();
        let err = d.finish().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    fn format_error(data: &[u8]) -> (u64, FormatError) {
        match into_decode_error(dump_all(data).unwrap_err()) {
            DecodeError::Format { offset, source } => (offset, source),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ops_before_header_rejected() {
        assert_eq!(format_error(b"\x03abc"), (0, FormatError::MissingHeader));
        assert_eq!(format_error(&[0x85, 0x00]), (0, FormatError::MissingHeader));
    }

    #[test]
    fn header_records_out_of_order_rejected() {
        // Version first.
        assert_eq!(
            format_error(b"\x7f\x13001\x7f\x21\x05\x03abc"),
            (0, FormatError::MissingHeader)
        );
        // Magic then reset, no version.
        assert_eq!(
            format_error(b"\x7f\x03tlz\x7f\x21\x05\x03abc"),
            (5, FormatError::MissingHeader)
        );
    }

    #[test]
    fn ops_before_reset_rejected() {
        assert_eq!(
            format_error(b"\x7f\x03tlz\x7f\x13001\x03abc"),
            (10, FormatError::MissingReset)
        );
    }

    #[test]
    fn dump_and_decoder_agree_on_header_errors() {
        for stream in [
            &b"\x03abc"[..],
            &b"\x7f\x13001\x7f\x21\x05\x03abc"[..],
            &b"\x7f\x03tlz\x7f\x21\x05\x03abc"[..],
            &b"\x7f\x03tlz\x7f\x13001\x03abc"[..],
        ] {
            let decoded = decompress_all(stream).unwrap_err();
            let DecodeError::Format { offset, source } = decoded else {
                panic!("decoder: unexpected {decoded:?}");
            };
            assert_eq!(format_error(stream), (offset, source));
        }
    }

    #[test]
    fn restarted_header_dumps_cleanly() {
        let mut stream = compress_all(b"first first", 32);
        stream.extend(compress_all(b"second", 16));
        let text = dump_all(&stream).unwrap();
        assert_eq!(text.lines().filter(|l| l.contains("meta  magic")).count(), 2);
    }
}
