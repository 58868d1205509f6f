// Tag and offset encoding for the tlz op stream.
//
// Tag byte: top bit selects the op kind (Literal=0, Copy=1), the low 7 bits
// carry the length if it is below LEN1, otherwise an escape selecting 1/2/4/8
// big-endian length bytes. 0x7F in the low bits marks a Meta record and is
// only valid on a Literal tag.
//
// Offset: one byte if below OFF1, otherwise an escape selecting 1/2/4/8
// big-endian bytes. 0xFF is reserved.

/// Kind bit for Literal ops.
pub const LITERAL: u8 = 0x00;
/// Kind bit for Copy ops.
pub const COPY: u8 = 0x80;

pub const TAG_MASK: u8 = 0x80;
pub const TAG_LEN_MASK: u8 = 0x7F;

pub const LEN1: u8 = 0x7B;
pub const LEN2: u8 = 0x7C;
pub const LEN4: u8 = 0x7D;
pub const LEN8: u8 = 0x7E;
/// Length class marking a Meta record (`LITERAL | META`).
pub const META: u8 = 0x7F;

pub const OFF1: u8 = 0xFB;
pub const OFF2: u8 = 0xFC;
pub const OFF4: u8 = 0xFD;
pub const OFF8: u8 = 0xFE;

/// Longest possible tag: header byte plus 8 length bytes.
pub const MAX_TAG_LEN: usize = 9;

/// Longest possible offset field.
pub const MAX_OFFSET_LEN: usize = 9;

/// Op kind carried in the tag's top bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Literal,
    Copy,
}

impl Kind {
    #[inline]
    fn bit(self) -> u8 {
        match self {
            Kind::Literal => LITERAL,
            Kind::Copy => COPY,
        }
    }
}

/// A decoded tag header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// `len` raw bytes follow the tag.
    Literal(u64),
    /// An offset field follows; copy `len` bytes from history.
    Copy(u64),
    /// A meta record follows (see `wire::meta`).
    Meta,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Append a tag for `kind` with length `len`, using the shortest form.
#[inline]
pub fn append_tag(out: &mut Vec<u8>, kind: Kind, len: u64) {
    append_escaped(out, kind.bit(), len, LEN1);
}

/// Append a meta tag byte (`LITERAL | META`).
#[inline]
pub fn append_meta_tag(out: &mut Vec<u8>) {
    out.push(LITERAL | META);
}

/// Append a copy offset, using the shortest form.
#[inline]
pub fn append_offset(out: &mut Vec<u8>, off: u64) {
    append_escaped(out, 0, off, OFF1);
}

/// Shared short-or-escaped scheme: `v < esc1` is embedded in the header
/// byte, otherwise `esc1 + k` selects `1 << k` big-endian bytes.
#[inline]
fn append_escaped(out: &mut Vec<u8>, head: u8, v: u64, esc1: u8) {
    if v < u64::from(esc1) {
        out.push(head | v as u8);
    } else if v <= u64::from(u8::MAX) {
        out.push(head | esc1);
        out.push(v as u8);
    } else if v <= u64::from(u16::MAX) {
        out.push(head | (esc1 + 1));
        out.extend_from_slice(&(v as u16).to_be_bytes());
    } else if v <= u64::from(u32::MAX) {
        out.push(head | (esc1 + 2));
        out.extend_from_slice(&(v as u32).to_be_bytes());
    } else {
        out.push(head | (esc1 + 3));
        out.extend_from_slice(&v.to_be_bytes());
    }
}

/// Encoded size of a tag carrying `len`.
#[inline]
pub fn sizeof_tag(len: u64) -> usize {
    sizeof_escaped(len, LEN1)
}

/// Encoded size of an offset field carrying `off`.
#[inline]
pub fn sizeof_offset(off: u64) -> usize {
    sizeof_escaped(off, OFF1)
}

#[inline]
fn sizeof_escaped(v: u64, esc1: u8) -> usize {
    if v < u64::from(esc1) {
        1
    } else if v <= u64::from(u8::MAX) {
        2
    } else if v <= u64::from(u16::MAX) {
        3
    } else if v <= u64::from(u32::MAX) {
        5
    } else {
        9
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a tag from the front of `data`.
///
/// Returns the tag and the number of bytes it occupies. A Meta tag is one
/// byte; its record body is parsed separately.
pub fn read_tag(data: &[u8]) -> Result<(Tag, usize), TagError> {
    let Some(&head) = data.first() else {
        return Err(TagError::Truncated { needed: 1 });
    };
    let low = head & TAG_LEN_MASK;
    if low == META {
        if head & TAG_MASK == COPY {
            return Err(TagError::Reserved(head));
        }
        return Ok((Tag::Meta, 1));
    }
    let (len, used) = read_escaped(data, low, LEN1)?;
    let tag = if head & TAG_MASK == COPY {
        Tag::Copy(len)
    } else {
        Tag::Literal(len)
    };
    Ok((tag, used))
}

/// Decode a copy offset from the front of `data`.
pub fn read_offset(data: &[u8]) -> Result<(u64, usize), TagError> {
    let Some(&head) = data.first() else {
        return Err(TagError::Truncated { needed: 1 });
    };
    if head > OFF8 {
        return Err(TagError::Reserved(head));
    }
    read_escaped(data, head, OFF1)
}

/// `data[0]` is the header byte whose value field is `low`.
#[inline]
fn read_escaped(data: &[u8], low: u8, esc1: u8) -> Result<(u64, usize), TagError> {
    if low < esc1 {
        return Ok((u64::from(low), 1));
    }
    let width = match low - esc1 {
        0 => 1,
        1 => 2,
        2 => 4,
        3 => 8,
        _ => return Err(TagError::Reserved(data[0])),
    };
    let needed = 1 + width;
    if data.len() < needed {
        return Err(TagError::Truncated { needed });
    }
    let v = data[1..needed]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
    Ok((v, needed))
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    /// Valid so far, but `needed` bytes are required to finish the field.
    #[error("truncated field (need {needed} bytes)")]
    Truncated { needed: usize },
    /// The header byte uses a reserved value.
    #[error("reserved header byte {0:#04x}")]
    Reserved(u8),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip_boundaries() {
        let cases: &[u64] = &[
            0,
            1,
            0x7A,
            0x7B,
            0xFF,
            0x100,
            0xFFFF,
            0x1_0000,
            u32::MAX as u64,
            u32::MAX as u64 + 1,
            u64::MAX,
        ];
        for &len in cases {
            for kind in [Kind::Literal, Kind::Copy] {
                let mut buf = Vec::new();
                append_tag(&mut buf, kind, len);
                assert_eq!(buf.len(), sizeof_tag(len), "size mismatch for {len}");
                let (tag, used) = read_tag(&buf).unwrap();
                assert_eq!(used, buf.len());
                let expected = match kind {
                    Kind::Literal => Tag::Literal(len),
                    Kind::Copy => Tag::Copy(len),
                };
                assert_eq!(tag, expected, "roundtrip failed for {len}");
            }
        }
    }

    #[test]
    fn offset_roundtrip_boundaries() {
        let cases: &[u64] = &[0, 0xFA, 0xFB, 0xFF, 0x100, 0xFFFF, 0x1_0000, u64::MAX];
        for &off in cases {
            let mut buf = Vec::new();
            append_offset(&mut buf, off);
            assert_eq!(buf.len(), sizeof_offset(off));
            assert_eq!(read_offset(&buf).unwrap(), (off, buf.len()));
        }
    }

    #[test]
    fn short_forms_are_single_bytes() {
        let mut buf = Vec::new();
        append_tag(&mut buf, Kind::Literal, 5);
        append_tag(&mut buf, Kind::Copy, 0x7A);
        append_offset(&mut buf, 0xFA);
        assert_eq!(buf, [0x05, 0xFA, 0xFA]);
    }

    #[test]
    fn escapes_are_big_endian() {
        let mut buf = Vec::new();
        append_tag(&mut buf, Kind::Copy, 0x1234);
        assert_eq!(buf, [COPY | LEN2, 0x12, 0x34]);

        buf.clear();
        append_offset(&mut buf, 0x0102_0304);
        assert_eq!(buf, [OFF4, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn meta_tag_only_on_literal() {
        assert_eq!(read_tag(&[LITERAL | META]).unwrap(), (Tag::Meta, 1));
        assert_eq!(read_tag(&[COPY | META]), Err(TagError::Reserved(0xFF)));
    }

    #[test]
    fn reserved_offset_byte() {
        assert_eq!(read_offset(&[0xFF]), Err(TagError::Reserved(0xFF)));
    }

    #[test]
    fn truncated_fields_report_needed() {
        assert_eq!(read_tag(&[]), Err(TagError::Truncated { needed: 1 }));
        assert_eq!(
            read_tag(&[LEN4, 0, 0]),
            Err(TagError::Truncated { needed: 5 })
        );
        assert_eq!(read_offset(&[OFF8, 1]), Err(TagError::Truncated { needed: 9 }));
    }
}
