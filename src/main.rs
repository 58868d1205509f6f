fn main() {
    #[cfg(feature = "cli")]
    tlz::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("tlz: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
