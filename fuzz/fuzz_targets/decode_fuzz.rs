#![no_main]
use std::io::Read;

use libfuzzer_sys::fuzz_target;
use tlz::compress::{Decoder, decompress_all};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let _ = decompress_all(data);

    // Same input behind a valid header, fed through small reads.
    let mut stream = tlz::compress::compress_all(b"seed", 64);
    stream.extend_from_slice(data);
    let mut dec = Decoder::new(&stream[..]);
    let mut buf = [0u8; 7];
    while let Ok(n) = dec.read(&mut buf) {
        if n == 0 {
            break;
        }
    }
});
