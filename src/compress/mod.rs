// Streaming codec.
//
// - `encoder` Encoder: plaintext in, tagged stream out (`io::Write`)
// - `decoder` Decoder: tagged stream in, plaintext out (`io::Read`)
// - `dump`    Dumper: tagged stream in, one text line per op out

pub mod decoder;
pub mod dump;
pub mod encoder;

pub use decoder::{DecodeError, Decoder, FormatError, decompress_all, into_decode_error};
pub use dump::{Dumper, dump_all};
pub use encoder::{Encoder, compress_all};
