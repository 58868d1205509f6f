use std::io::{Read, Write};

use tlz::compress::{Decoder, Dumper, Encoder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A logging sink writes one line at a time; every write can reference
    // earlier lines still inside the block.
    let mut enc = Encoder::new(Vec::new(), 1 << 10);
    for i in 0..8 {
        writeln!(enc, "level=info msg=\"request served\" id={i} status=200")?;
    }
    let packed = enc.into_inner();

    let mut dumper = Dumper::new(std::io::stdout().lock());
    dumper.write_all(&packed)?;
    dumper.finish()?;

    let mut text = String::new();
    Decoder::new(&packed[..]).read_to_string(&mut text)?;
    print!("{text}");
    Ok(())
}
