//! tlz: a streaming, block-windowed LZ codec.
//!
//! The crate provides:
//! - The tag/offset wire codec and stream header (`wire`)
//! - The history ring and match index (`window`)
//! - The streaming `Encoder`, `Decoder` and `Dumper` (`compress`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use std::io::{Read, Write};
//! use tlz::compress::{Decoder, Encoder};
//!
//! let mut enc = Encoder::new(Vec::new(), 1 << 16);
//! enc.write_all(b"hello hello hello hello").unwrap();
//! let packed = enc.into_inner();
//!
//! let mut out = Vec::new();
//! Decoder::new(&packed[..]).read_to_end(&mut out).unwrap();
//! assert_eq!(out, b"hello hello hello hello");
//! ```

pub mod compress;
pub mod io;
pub mod window;
pub mod wire;

#[cfg(feature = "cli")]
pub mod cli;
