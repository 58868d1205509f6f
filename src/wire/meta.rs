// Meta records and the mandatory stream header.
//
// A meta record is a `LITERAL | META` tag byte, then one meta byte whose
// high nibble is the subtag and low nibble the payload length, then the
// payload. Every stream opens with Magic, Version and Reset records.

use super::tag;

/// Magic payload.
pub const MAGIC: &[u8; 3] = b"tlz";

/// Format version payload. Decoders accept only this exact value.
pub const VERSION: &str = "001";

pub const META_MAGIC: u8 = 0x00;
pub const META_VER: u8 = 0x10;
pub const META_RESET: u8 = 0x20;

pub const META_TAG_MASK: u8 = 0xF0;
pub const META_LEN_MASK: u8 = 0x0F;

/// Largest payload a meta record can carry.
pub const MAX_META_PAYLOAD: usize = META_LEN_MASK as usize;

/// A parsed meta record body, borrowing its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meta<'a> {
    Magic(&'a [u8]),
    Version(&'a [u8]),
    /// log2 of the block size.
    Reset(u8),
}

/// Append one meta record. `payload` must fit in the low nibble.
pub fn append_meta(out: &mut Vec<u8>, subtag: u8, payload: &[u8]) {
    debug_assert!(payload.len() <= MAX_META_PAYLOAD);
    debug_assert_eq!(subtag & META_LEN_MASK, 0);
    tag::append_meta_tag(out);
    out.push(subtag | payload.len() as u8);
    out.extend_from_slice(payload);
}

/// Append the stream header: magic, version and a reset to `block_bits`.
pub fn append_header(out: &mut Vec<u8>, block_bits: u8) {
    append_meta(out, META_MAGIC, MAGIC);
    append_meta(out, META_VER, VERSION.as_bytes());
    append_meta(out, META_RESET, &[block_bits]);
}

/// Size of the stream header in bytes.
pub const fn header_len() -> usize {
    (2 + MAGIC.len()) + (2 + VERSION.len()) + (2 + 1)
}

/// Parse a meta record body. `data` starts right after the meta tag byte.
///
/// Returns the record and the number of body bytes consumed.
pub fn read_meta(data: &[u8]) -> Result<(Meta<'_>, usize), MetaError> {
    let Some(&head) = data.first() else {
        return Err(MetaError::Truncated { needed: 1 });
    };
    let len = usize::from(head & META_LEN_MASK);
    let needed = 1 + len;
    if data.len() < needed {
        return Err(MetaError::Truncated { needed });
    }
    let payload = &data[1..needed];
    let meta = match head & META_TAG_MASK {
        META_MAGIC => Meta::Magic(payload),
        META_VER => Meta::Version(payload),
        META_RESET => match payload {
            &[bits] => Meta::Reset(bits),
            _ => return Err(MetaError::BadReset(len)),
        },
        other => return Err(MetaError::UnknownSubtag(other)),
    };
    Ok((meta, needed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MetaError {
    #[error("truncated meta record (need {needed} bytes)")]
    Truncated { needed: usize },
    #[error("unknown meta subtag {0:#04x}")]
    UnknownSubtag(u8),
    #[error("reset record carries {0} payload bytes, expected 1")]
    BadReset(usize),
}
