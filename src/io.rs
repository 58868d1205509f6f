// File-level I/O helpers for compression/decompression.
//
// Provides `compress_file()` / `decompress_file()` and their stream
// counterparts, which wrap the codec with buffered I/O. Optionally computes
// a streaming SHA-256 of the plaintext (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::compress::decoder::{DecodeError, Decoder, into_decode_error};
use crate::compress::encoder::Encoder;
use crate::window::config::{DecoderOptions, EncoderOptions};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `compress_file()` / `compress_stream()`.
#[derive(Debug, Clone)]
pub struct CompressStats {
    /// Plaintext bytes read.
    pub input_size: u64,
    /// Compressed bytes written.
    pub output_size: u64,
    /// Block size the stream was written with.
    pub block_size: usize,
    /// SHA-256 of the plaintext (if `file-io` feature is enabled).
    pub input_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `decompress_file()` / `decompress_stream()`.
#[derive(Debug, Clone)]
pub struct DecompressStats {
    /// Compressed bytes read.
    pub input_size: u64,
    /// Plaintext bytes written.
    pub output_size: u64,
    /// Block size announced by the stream; `None` for an empty stream.
    pub block_size: Option<usize>,
    /// SHA-256 of the plaintext (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

impl CompressStats {
    /// Compressed size as a fraction of the input.
    pub fn ratio(&self) -> f64 {
        if self.input_size == 0 {
            return 0.0;
        }
        self.output_size as f64 / self.input_size as f64
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The compressed input is malformed or truncated.
    #[error("decode error: {0}")]
    Decode(#[source] DecodeError),
}

impl From<DecodeError> for IoError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Io(e) => Self::Io(e),
            e => Self::Decode(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

pub const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Compression
// ---------------------------------------------------------------------------

/// Compress everything `input` yields into `output`.
///
/// `output` is flushed but not otherwise finalized.
pub fn compress_stream<R: Read, W: Write>(
    mut input: R,
    output: W,
    opts: EncoderOptions,
) -> Result<CompressStats, IoError> {
    let mut encoder = Encoder::with_options(output, opts);

    #[cfg(feature = "file-io")]
    let mut hasher = sha2::Sha256::new();

    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        #[cfg(feature = "file-io")]
        {
            hasher.update(&buf[..n]);
        }
        encoder.write_all(&buf[..n])?;
    }
    encoder.flush()?;

    #[cfg(feature = "file-io")]
    let input_sha256 = Some(hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let input_sha256: Option<[u8; 32]> = None;

    Ok(CompressStats {
        input_size: encoder.bytes_in(),
        output_size: encoder.bytes_out(),
        block_size: encoder.block_size(),
        input_sha256,
    })
}

/// Compress `input_path` into `output_path`.
pub fn compress_file(
    input_path: &Path,
    output_path: &Path,
    opts: EncoderOptions,
) -> Result<CompressStats, IoError> {
    let reader = BufReader::with_capacity(BUF_SIZE, File::open(input_path)?);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);
    let stats = compress_stream(reader, &mut writer, opts)?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Decompression
// ---------------------------------------------------------------------------

/// Decompress everything `input` yields into `output`.
pub fn decompress_stream<R: Read, W: Write>(
    input: R,
    mut output: W,
    opts: DecoderOptions,
) -> Result<DecompressStats, IoError> {
    let mut decoder = Decoder::with_options(input, opts);

    #[cfg(feature = "file-io")]
    let mut hasher = sha2::Sha256::new();

    {
        #[cfg(feature = "file-io")]
        let mut sink = HashingWriter {
            inner: &mut output,
            hasher: &mut hasher,
        };
        #[cfg(not(feature = "file-io"))]
        let sink = &mut output;

        let mut buf = vec![0u8; BUF_SIZE];
        loop {
            let n = match decoder.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(into_decode_error(e).into()),
            };
            sink.write_all(&buf[..n])?;
        }
        sink.flush()?;
    }

    #[cfg(feature = "file-io")]
    let output_sha256 = Some(hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = None;

    Ok(DecompressStats {
        input_size: decoder.bytes_in(),
        output_size: decoder.bytes_out(),
        block_size: decoder.block_size(),
        output_sha256,
    })
}

/// Decompress `input_path` into `output_path`.
pub fn decompress_file(
    input_path: &Path,
    output_path: &Path,
    opts: DecoderOptions,
) -> Result<DecompressStats, IoError> {
    let reader = BufReader::with_capacity(BUF_SIZE, File::open(input_path)?);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);
    let stats = decompress_stream(reader, &mut writer, opts)?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
