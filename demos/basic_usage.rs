use tlz::compress::{compress_all, decompress_all};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let input = b"ping ping ping ping pong ping ping ping ping pong".repeat(4);

    let packed = compress_all(&input, 1 << 12);
    let restored = decompress_all(&packed)?;
    assert_eq!(restored, input);

    println!(
        "input {} bytes -> packed {} bytes -> restored {} bytes",
        input.len(),
        packed.len(),
        restored.len()
    );

    Ok(())
}
