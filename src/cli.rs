// Command-line front end for the tlz codec.
//
// Subcommands compress, decompress, dump and config. Input defaults to
// stdin and output to stdout; the codec itself knows nothing about files.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::compress::dump::Dumper;
use crate::io::{self as tlz_io, BUF_SIZE, IoError};
use crate::window::config::{
    DEFAULT_BLOCK_SIZE, DecoderOptions, EncoderOptions, MAX_BLOCK_SIZE, MAX_HASH_TABLE_SIZE,
    MIN_BLOCK_SIZE, MIN_HASH_TABLE_SIZE, default_hash_table_size,
};
use crate::wire::meta;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Streaming block-windowed LZ compressor.
#[derive(Parser, Debug)]
#[command(
    name = "tlz",
    version,
    about = "Streaming block-windowed LZ compressor",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compress an input stream.
    Compress(CompressArgs),
    /// Decompress a tlz stream.
    Decompress(DecompressArgs),
    /// Print one line per op of a tlz stream.
    Dump(DumpArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Input file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Input file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CompressArgs {
    /// History block size (supports K/M/G suffix, rounded up to a power of two).
    #[arg(long = "block-size", short = 'B', value_parser = parse_byte_size, default_value_t = DEFAULT_BLOCK_SIZE as u64)]
    block_size: u64,

    /// Match index buckets (default: derived from the block size).
    #[arg(long = "hash-table-size", value_parser = parse_byte_size)]
    hash_table_size: Option<u64>,

    #[command(flatten)]
    io: IoArgs,
}

#[derive(Args, Debug)]
struct DecompressArgs {
    /// Refuse streams whose block is larger than this (supports K/M/G suffix).
    #[arg(long = "max-block-size", value_parser = parse_byte_size, default_value_t = MAX_BLOCK_SIZE as u64)]
    max_block_size: u64,

    #[command(flatten)]
    io: IoArgs,
}

#[derive(Args, Debug)]
struct DumpArgs {
    #[command(flatten)]
    io: IoArgs,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Compress,
    Decompress,
    Dump,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    block_size: u64,
    hash_table_size: Option<u64>,
    max_block_size: u64,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        use_stdout: false,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        block_size: DEFAULT_BLOCK_SIZE as u64,
        hash_table_size: None,
        max_block_size: MAX_BLOCK_SIZE as u64,
        input_file: None,
        output_file: None,
    };

    let io = match cli.command {
        Cmd::Compress(args) => {
            opts.command = Command::Compress;
            opts.block_size = args.block_size;
            opts.hash_table_size = args.hash_table_size;
            Some(args.io)
        }
        Cmd::Decompress(args) => {
            opts.command = Command::Decompress;
            opts.max_block_size = args.max_block_size;
            Some(args.io)
        }
        Cmd::Dump(args) => {
            opts.command = Command::Dump;
            Some(args.io)
        }
        Cmd::Config => None,
    };

    if let Some(io) = io {
        opts.use_stdout = io.stdout;
        opts.input_file = io.input.or(io.input_pos);
        opts.output_file = io.output.or(io.output_pos);
    }
    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("tlz".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = build_encoder_options(&opts);
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("tlz version {version} (format {})", meta::VERSION);

    let file_io = cfg!(feature = "file-io") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("DEFAULT_BLOCK_SIZE={DEFAULT_BLOCK_SIZE}");
    eprintln!("MIN_BLOCK_SIZE={MIN_BLOCK_SIZE}");
    eprintln!("MAX_BLOCK_SIZE={MAX_BLOCK_SIZE}");
    eprintln!(
        "DEFAULT_HASH_TABLE_SIZE={}",
        default_hash_table_size(DEFAULT_BLOCK_SIZE)
    );
    eprintln!("MIN_HASH_TABLE_SIZE={MIN_HASH_TABLE_SIZE}");
    eprintln!("MAX_HASH_TABLE_SIZE={MAX_HASH_TABLE_SIZE}");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Build codec options from CLI options
// ---------------------------------------------------------------------------

fn build_encoder_options(opts: &Options) -> Result<EncoderOptions, String> {
    if opts.block_size > MAX_BLOCK_SIZE as u64 {
        return Err(format!(
            "block size {} exceeds max {MAX_BLOCK_SIZE}",
            opts.block_size
        ));
    }
    let block_size = opts.block_size as usize;
    let mut enc = EncoderOptions::with_block_size(block_size);
    if let Some(size) = opts.hash_table_size {
        if size > MAX_HASH_TABLE_SIZE as u64 {
            return Err(format!(
                "hash table size {size} exceeds max {MAX_HASH_TABLE_SIZE}"
            ));
        }
        enc.hash_table_size = size as usize;
    }
    Ok(enc.normalized())
}

fn build_decoder_options(opts: &Options) -> DecoderOptions {
    DecoderOptions {
        max_block_size: opts.max_block_size.min(MAX_BLOCK_SIZE as u64) as usize,
    }
}

// ---------------------------------------------------------------------------
// Input / output plumbing
// ---------------------------------------------------------------------------

fn open_input(opts: &Options) -> Result<Box<dyn Read>, i32> {
    match &opts.input_file {
        Some(path) => match File::open(path) {
            Ok(f) => Ok(Box::new(BufReader::with_capacity(BUF_SIZE, f))),
            Err(e) => {
                eprintln!("tlz: input file: {}: {e}", path.display());
                Err(1)
            }
        },
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(opts: &Options) -> Result<Box<dyn Write>, i32> {
    match (opts.use_stdout, &opts.output_file) {
        (true, _) | (_, None) => Ok(Box::new(BufWriter::with_capacity(
            BUF_SIZE,
            io::stdout().lock(),
        ))),
        (false, Some(path)) => {
            if path.exists() && !opts.force {
                eprintln!(
                    "tlz: output file exists, use -f to overwrite: {}",
                    path.display()
                );
                return Err(1);
            }
            match File::create(path) {
                Ok(f) => Ok(Box::new(BufWriter::with_capacity(BUF_SIZE, f))),
                Err(e) => {
                    eprintln!("tlz: output file: {}: {e}", path.display());
                    Err(1)
                }
            }
        }
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => eprintln!("{s}"),
        Err(e) => eprintln!("tlz: json: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Compress command
// ---------------------------------------------------------------------------

fn cmd_compress(opts: &Options) -> i32 {
    let enc_opts = match build_encoder_options(opts) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("tlz: {e}");
            return 1;
        }
    };
    let reader = match open_input(opts) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let mut writer = match open_output(opts) {
        Ok(w) => w,
        Err(code) => return code,
    };

    let stats = match tlz_io::compress_stream(reader, &mut writer, enc_opts) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("tlz: compress error: {e}");
            return 1;
        }
    };
    if let Err(e) = writer.flush() {
        eprintln!("tlz: write flush error: {e}");
        return 1;
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "tlz: compress: input size: {}, output size: {}, block size: {}, ratio: {:.3}",
            stats.input_size,
            stats.output_size,
            stats.block_size,
            stats.ratio()
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "compress",
            "input_size": stats.input_size,
            "output_size": stats.output_size,
            "block_size": stats.block_size,
            "hash_table_size": enc_opts.hash_table_size,
            "input_sha256": stats.input_sha256.map(hex::encode),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Decompress command
// ---------------------------------------------------------------------------

fn cmd_decompress(opts: &Options) -> i32 {
    let reader = match open_input(opts) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let mut writer = match open_output(opts) {
        Ok(w) => w,
        Err(code) => return code,
    };

    let stats = match tlz_io::decompress_stream(reader, &mut writer, build_decoder_options(opts))
    {
        Ok(s) => s,
        Err(IoError::Decode(e)) => {
            eprintln!("tlz: decode error: {e}");
            return 1;
        }
        Err(e) => {
            eprintln!("tlz: {e}");
            return 1;
        }
    };
    if let Err(e) = writer.flush() {
        eprintln!("tlz: write flush error: {e}");
        return 1;
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "tlz: decompress: input size: {}, output size: {}",
            stats.input_size, stats.output_size
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "decompress",
            "input_size": stats.input_size,
            "output_size": stats.output_size,
            "block_size": stats.block_size,
            "output_sha256": stats.output_sha256.map(hex::encode),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Dump command
// ---------------------------------------------------------------------------

fn cmd_dump(opts: &Options) -> i32 {
    let mut reader = match open_input(opts) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let writer = match open_output(opts) {
        Ok(w) => w,
        Err(code) => return code,
    };

    let mut dumper = Dumper::new(writer);
    if let Err(e) = io::copy(&mut reader, &mut dumper) {
        eprintln!("tlz: dump: {e}");
        let _ = dumper.flush();
        return 1;
    }
    let (ops, decoded) = (dumper.ops(), dumper.decoded_len());
    if let Err(e) = dumper.finish() {
        eprintln!("tlz: dump: {e}");
        return 1;
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!("tlz: dump: ops: {ops}, decoded size: {decoded}");
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "dump",
            "ops": ops,
            "decoded_size": decoded,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn log_filter(opts: &Options) -> &'static str {
    match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let mut opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&opts)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    // Warn if -c overrides output filename.
    if opts.use_stdout
        && !opts.quiet
        && let Some(path) = &opts.output_file
    {
        eprintln!(
            "tlz: warning: -c option overrides output filename: {}",
            path.display()
        );
    }
    if opts.use_stdout {
        opts.output_file = None;
    }

    let exit_code = match opts.command {
        Command::Compress => cmd_compress(&opts),
        Command::Decompress => cmd_decompress(&opts),
        Command::Dump => cmd_dump(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
