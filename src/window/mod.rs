// History window and match discovery shared by the codec.
//
// This module provides:
// - The history ring addressed by absolute stream position
// - The 4-byte hash index used to find back-references
// - Block / index sizing and encoder/decoder options

pub mod config;
pub mod index;
pub mod ring;

pub use config::{DecoderOptions, EncoderOptions};
pub use index::MatchIndex;
pub use ring::RingWindow;
