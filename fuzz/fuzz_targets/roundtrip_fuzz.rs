#![no_main]
use std::io::Write;

use libfuzzer_sys::fuzz_target;
use tlz::compress::{Encoder, decompress_all};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte picks the block size, second the write chunking.
    let block_size = 16usize << (data[0] % 12);
    let chunk = 1 + data[1] as usize;
    let payload = &data[2..];

    let mut enc = Encoder::new(Vec::new(), block_size);
    for part in payload.chunks(chunk) {
        enc.write_all(part).unwrap();
    }
    let packed = enc.into_inner();

    let decoded = decompress_all(&packed).unwrap();
    assert_eq!(decoded, payload);
});
