// Integration tests for the compress module.
//
// Tests the full pipeline: Encoder -> tagged stream -> Decoder, including
// chunked writes, small reads, history wraparound, stream resets and
// malformed input surfacing through the std I/O traits.

use std::collections::BTreeSet;
use std::io::{self, Read, Write};

use tlz::compress::{
    DecodeError, Decoder, Dumper, Encoder, FormatError, compress_all, decompress_all, dump_all,
    into_decode_error,
};
use tlz::window::config::{DecoderOptions, EncoderOptions};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn encode_chunked(data: &[u8], block_size: usize, chunk: usize) -> Vec<u8> {
    let mut enc = Encoder::new(Vec::new(), block_size);
    for part in data.chunks(chunk.max(1)) {
        enc.write_all(part).unwrap();
    }
    enc.flush().unwrap();
    enc.into_inner()
}

fn decode_with_reads(packed: &[u8], read_size: usize) -> Vec<u8> {
    let mut dec = Decoder::new(packed);
    let mut out = Vec::new();
    let mut buf = vec![0u8; read_size];
    loop {
        match dec.read(&mut buf).unwrap() {
            0 => return out,
            n => out.extend_from_slice(&buf[..n]),
        }
    }
}

fn roundtrip(data: &[u8], block_size: usize, chunk: usize) -> Vec<u8> {
    let packed = encode_chunked(data, block_size, chunk);
    let decoded = decompress_all(&packed).unwrap();
    assert_eq!(
        decoded.len(),
        data.len(),
        "roundtrip length mismatch (block={block_size}, chunk={chunk}, packed={})",
        packed.len()
    );
    assert!(decoded == data, "roundtrip content mismatch");
    packed
}

fn generate_data(size: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    let mut data = Vec::with_capacity(size);
    for _ in 0..size {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        data.push((state >> 33) as u8);
    }
    data
}

fn log_lines(count: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..count {
        writeln!(
            out,
            "2024-01-01T00:00:{:02} INFO request id={} path=/api/v1/items status=200",
            i % 60,
            i * 7919 % 100_000
        )
        .unwrap();
    }
    out
}

// ---------------------------------------------------------------------------
// Reference scenario
// ---------------------------------------------------------------------------

#[test]
fn two_writes_share_history() {
    let mut enc = Encoder::new(Vec::new(), 32);
    enc.write_all(b"prefix_1234_suffix").unwrap();
    let first = enc.get_ref().len();
    enc.write_all(b"prefix_567_suffix").unwrap();
    let packed = enc.into_inner();

    assert_eq!(&packed[first..], b"\x87\x0b\x03567\x87\x0a");
    assert_eq!(
        decode_with_reads(&packed, 10),
        b"prefix_1234_suffixprefix_567_suffix"
    );
}

// ---------------------------------------------------------------------------
// Chunking and read sizes
// ---------------------------------------------------------------------------

#[test]
fn chunk_sizes_roundtrip() {
    let data = log_lines(300);
    for chunk in [1, 3, 17, 256, 4096, data.len()] {
        roundtrip(&data, 1 << 12, chunk);
    }
}

#[test]
fn read_sizes_roundtrip() {
    let data = log_lines(200);
    let packed = compress_all(&data, 1 << 14);
    for read_size in [1, 2, 7, 64, 1 << 16] {
        assert_eq!(decode_with_reads(&packed, read_size), data);
    }
}

#[test]
fn block_sizes_roundtrip() {
    let data = log_lines(500);
    for bits in 4..=20 {
        roundtrip(&data, 1 << bits, 1000);
    }
}

#[test]
fn history_wraps_many_times() {
    // 40x the block, so every copy reads through a wrapped ring.
    let data = log_lines(1000);
    let block = 1 << 10;
    assert!(data.len() > 40 * block);
    let packed = roundtrip(&data, block, 333);
    assert!(packed.len() < data.len());
}

#[test]
fn single_byte_writes() {
    let data = b"abcabcabcabcabcabcabcabcabcabc".repeat(10);
    roundtrip(&data, 64, 1);
}

// ---------------------------------------------------------------------------
// Compression effectiveness
// ---------------------------------------------------------------------------

#[test]
fn log_lines_compress_well() {
    let data = log_lines(2000);
    let packed = roundtrip(&data, 1 << 16, data.len());
    assert!(
        packed.len() * 4 < data.len(),
        "packed {} of {}",
        packed.len(),
        data.len()
    );
}

#[test]
fn random_data_barely_expands() {
    let data = generate_data(1 << 16, 7);
    let packed = roundtrip(&data, 1 << 16, data.len());
    assert!(
        packed.len() < data.len() + 256,
        "expanded to {} from {}",
        packed.len(),
        data.len()
    );
}

#[test]
fn tiny_hash_table_still_roundtrips() {
    let data = log_lines(300);
    let mut enc = Encoder::with_hash_table_size(Vec::new(), 1 << 12, 1);
    assert_eq!(enc.hash_table_size(), 16);
    enc.write_all(&data).unwrap();
    assert_eq!(decompress_all(&enc.into_inner()).unwrap(), data);
}

#[test]
fn options_constructor_normalizes() {
    let enc = Encoder::with_options(
        Vec::new(),
        EncoderOptions {
            block_size: 1000,
            hash_table_size: 100,
        },
    );
    assert_eq!(enc.block_size(), 1024);
    assert_eq!(enc.hash_table_size(), 128);
}

// ---------------------------------------------------------------------------
// Edge cases
// ---------------------------------------------------------------------------

#[test]
fn empty_input_empty_stream() {
    assert!(compress_all(b"", 64).is_empty());
    assert!(decompress_all(b"").unwrap().is_empty());
}

#[test]
fn single_byte_input() {
    roundtrip(b"x", 16, 1);
}

#[test]
fn all_zeros() {
    roundtrip(&vec![0u8; 10_000], 1 << 10, 4096);
}

#[test]
fn all_byte_values() {
    let data: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
    roundtrip(&data, 1 << 8, 100);
}

// ---------------------------------------------------------------------------
// Resets and concatenation
// ---------------------------------------------------------------------------

#[test]
fn encoder_reset_concatenates_streams() {
    let mut enc = Encoder::new(Vec::new(), 64);
    enc.write_all(b"first stream first stream").unwrap();
    let first = enc.reset(Vec::new());
    enc.write_all(b"second stream second stream").unwrap();
    let second = enc.into_inner();

    let mut joined = first.clone();
    joined.extend_from_slice(&second);
    assert_eq!(
        decompress_all(&joined).unwrap(),
        b"first stream first streamsecond stream second stream"
    );
    assert_eq!(decompress_all(&second).unwrap(), b"second stream second stream");
}

#[test]
fn decoder_reset_reads_next_stream() {
    let a = compress_all(b"alpha alpha alpha", 32);
    let b = compress_all(b"beta beta beta", 32);

    let mut dec = Decoder::new(&a[..]);
    let mut out = Vec::new();
    dec.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"alpha alpha alpha");

    let old = dec.reset(&b[..]);
    assert!(old.is_empty());
    out.clear();
    dec.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"beta beta beta");
}

// ---------------------------------------------------------------------------
// Malformed input through the std traits
// ---------------------------------------------------------------------------

/// Stream offsets where a record starts, plus the end of the stream.
fn record_boundaries(packed: &[u8]) -> BTreeSet<usize> {
    let text = dump_all(packed).unwrap();
    let mut cuts: BTreeSet<usize> = text
        .lines()
        .map(|l| usize::from_str_radix(l.split_whitespace().next().unwrap(), 16).unwrap())
        .collect();
    cuts.insert(packed.len());
    cuts
}

#[test]
fn truncation_anywhere_is_detected() {
    let data = log_lines(50);
    let packed = compress_all(&data, 1 << 10);
    let boundaries = record_boundaries(&packed);
    assert!(boundaries.len() > 4);

    for cut in 1..packed.len() {
        let mut out = Vec::new();
        let result = Decoder::new(&packed[..cut]).read_to_end(&mut out);
        assert!(data.starts_with(&out), "cut at {cut}");
        match result {
            // Only a cut between records is indistinguishable from a short stream.
            Ok(_) => assert!(boundaries.contains(&cut), "clean end mid-record at {cut}"),
            Err(e) => {
                assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof, "cut at {cut}");
                assert!(!boundaries.contains(&cut), "error at boundary {cut}");
            }
        }
    }
}

#[test]
fn io_error_downcasts_to_decode_error() {
    let mut packed = compress_all(b"hello world", 32);
    packed.push(0xFF);
    let mut out = Vec::new();
    let err = Decoder::new(&packed[..]).read_to_end(&mut out).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    let inner = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<DecodeError>())
        .unwrap();
    assert!(matches!(
        inner,
        DecodeError::Format {
            source: FormatError::ReservedTag(0xFF),
            ..
        }
    ));
}

#[test]
fn decoder_limit_rejects_large_blocks() {
    let packed = compress_all(b"payload payload", 1 << 20);
    let mut dec = Decoder::with_options(
        &packed[..],
        DecoderOptions {
            max_block_size: 1 << 16,
        },
    );
    let mut out = Vec::new();
    let err = into_decode_error(dec.read_to_end(&mut out).unwrap_err());
    assert!(matches!(
        err,
        DecodeError::Format {
            offset: 10,
            source: FormatError::BlockTooLarge { bits: 20, .. }
        }
    ));
}

#[test]
fn source_errors_are_not_sticky() {
    struct Flaky<'a> {
        data: &'a [u8],
        fail_next: bool,
    }
    impl Read for Flaky<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if std::mem::take(&mut self.fail_next) {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "not yet"));
            }
            self.fail_next = true;
            let n = buf.len().min(self.data.len()).min(5);
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    let data = log_lines(20);
    let packed = compress_all(&data, 1 << 10);
    let mut dec = Decoder::new(Flaky {
        data: &packed,
        fail_next: false,
    });
    let mut out = Vec::new();
    let mut buf = [0u8; 32];
    let mut would_block = 0;
    loop {
        match dec.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => would_block += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert!(would_block > 0);
    assert_eq!(out, data);
}

// ---------------------------------------------------------------------------
// Dumper agrees with the decoder
// ---------------------------------------------------------------------------

#[test]
fn dump_accounts_for_every_byte() {
    let data = log_lines(100);
    let packed = compress_all(&data, 1 << 12);
    let mut dumper = Dumper::new(Vec::new());
    for part in packed.chunks(13) {
        dumper.write_all(part).unwrap();
    }
    assert_eq!(dumper.decoded_len(), data.len() as u64);
    let text = String::from_utf8(dumper.finish().unwrap()).unwrap();
    assert!(text.lines().any(|l| l.contains("  copy  ")));
    assert!(text.starts_with("       0  meta  magic"));
}
