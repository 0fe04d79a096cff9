fn main() {
    #[cfg(feature = "cli")]
    morphmatch::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("morphmatch: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
