// Command-line front end for morphmatch.
//
// Subcommands compress and decompress frames, dump the best match found at
// every position of a file, and print the build configuration.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::compress::encoder::CompressOptions;
use crate::hash::MatchFinder;
use crate::hash::config::{self, MIN_MATCH};
use crate::io::{compress_stream, decompress_stream};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DEFAULT_BLOCK_SIZE: u64 = 1 << 22; // 4 MiB
const DEFAULT_MAX_LENGTH: usize = 65_535;

const BUF_SIZE: usize = 64 * 1024;

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

/// Morphing Match Chain compressor and match finder.
#[derive(Parser, Debug)]
#[command(
    name = "morphmatch",
    version,
    about = "Morphing Match Chain compressor and match finder",
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
    /// Compress an input stream into a frame.
    Compress(CompressArgs),
    /// Decompress a frame.
    Decompress(DecompressArgs),
    /// Print the best match at every position of a file.
    Matches(MatchesArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct CompressArgs {
    /// Uncompressed bytes per block (supports K/M/G suffix).
    #[arg(long = "block-size", value_parser = parse_byte_size, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: u64,

    /// Do not append an Adler-32 content checksum.
    #[arg(long = "no-checksum")]
    no_checksum: bool,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Input file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DecompressArgs {
    /// Skip Adler-32 verification.
    #[arg(long = "no-checksum")]
    no_checksum: bool,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Input frame (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MatchesArgs {
    /// Longest match to report.
    #[arg(long = "max-length", value_parser = clap::value_parser!(u32).range(MIN_MATCH as i64..), default_value_t = DEFAULT_MAX_LENGTH as u32)]
    max_length: u32,

    /// Skip over each reported match instead of searching every position.
    #[arg(long)]
    greedy: bool,

    /// File to scan.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Compress,
    Decompress,
    Matches,
    Config,
}

struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    block_size: u64,
    no_checksum: bool,
    max_length: usize,
    greedy: bool,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    json_output: bool,
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        use_stdout: false,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        block_size: DEFAULT_BLOCK_SIZE,
        no_checksum: false,
        max_length: DEFAULT_MAX_LENGTH,
        greedy: false,
        input_file: None,
        output_file: None,
        json_output: cli.json_output,
    };

    match cli.command {
        Cmd::Compress(args) => {
            opts.command = Command::Compress;
            opts.use_stdout = args.stdout;
            opts.block_size = args.block_size;
            opts.no_checksum = args.no_checksum;
            opts.input_file = args.input;
            opts.output_file = args.output;
        }
        Cmd::Decompress(args) => {
            opts.command = Command::Decompress;
            opts.use_stdout = args.stdout;
            opts.no_checksum = args.no_checksum;
            opts.input_file = args.input;
            opts.output_file = args.output;
        }
        Cmd::Matches(args) => {
            opts.command = Command::Matches;
            opts.max_length = args.max_length as usize;
            opts.greedy = args.greedy;
            opts.input_file = Some(args.input);
        }
        Cmd::Config => {}
    }
    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("morphmatch".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Shared I/O plumbing
// ---------------------------------------------------------------------------

fn open_input(opts: &Options) -> Result<Box<dyn Read>, String> {
    match &opts.input_file {
        Some(path) => File::open(path)
            .map(|f| Box::new(BufReader::with_capacity(BUF_SIZE, f)) as Box<dyn Read>)
            .map_err(|e| format!("input file: {}: {e}", path.display())),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(opts: &Options) -> Result<Box<dyn Write>, String> {
    match (opts.use_stdout, &opts.output_file) {
        (true, _) | (_, None) => Ok(Box::new(BufWriter::with_capacity(
            BUF_SIZE,
            io::stdout().lock(),
        ))),
        (false, Some(path)) => {
            if path.exists() && !opts.force {
                return Err(format!(
                    "output file exists, use -f to overwrite: {}",
                    path.display()
                ));
            }
            File::create(path)
                .map(|f| Box::new(BufWriter::with_capacity(BUF_SIZE, f)) as Box<dyn Write>)
                .map_err(|e| format!("output file: {}: {e}", path.display()))
        }
    }
}

fn emit_json(json: serde_json::Value) {
    eprintln!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("morphmatch version {version} (Rust)");

    let window = config::DEFAULT;
    let adler32 = cfg!(feature = "adler32") as u8;
    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("WINDOW_LOG={}", window.window_log);
    eprintln!("WINDOW_SIZE={}", window.window_size);
    eprintln!("HASH_LOG={}", window.hash_log);
    eprintln!("MIN_MATCH={MIN_MATCH}");
    eprintln!("DEFAULT_BLOCK_SIZE={DEFAULT_BLOCK_SIZE}");
    eprintln!("ADLER32={adler32}");
    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Compress / decompress commands
// ---------------------------------------------------------------------------

fn cmd_compress(opts: &Options) -> i32 {
    let compress_opts = CompressOptions {
        block_size: usize::try_from(opts.block_size).unwrap_or(usize::MAX),
        checksum: !opts.no_checksum,
    };
    let (reader, writer) = match open_input(opts).and_then(|r| Ok((r, open_output(opts)?))) {
        Ok(io) => io,
        Err(msg) => {
            eprintln!("morphmatch: {msg}");
            return 1;
        }
    };

    let stats = match compress_stream(reader, writer, compress_opts) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("morphmatch: compress error: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "morphmatch: compressed {} -> {} bytes in {} blocks",
            stats.input_size, stats.output_size, stats.blocks
        );
    }
    if opts.json_output {
        emit_json(serde_json::json!({
            "command": "compress",
            "input_size": stats.input_size,
            "output_size": stats.output_size,
            "blocks": stats.blocks,
        }));
    }
    0
}

fn cmd_decompress(opts: &Options) -> i32 {
    let (reader, writer) = match open_input(opts).and_then(|r| Ok((r, open_output(opts)?))) {
        Ok(io) => io,
        Err(msg) => {
            eprintln!("morphmatch: {msg}");
            return 1;
        }
    };

    let stats = match decompress_stream(reader, writer, !opts.no_checksum) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("morphmatch: decompress error: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "morphmatch: decompressed {} -> {} bytes in {} blocks",
            stats.input_size, stats.output_size, stats.blocks
        );
    }
    if opts.json_output {
        emit_json(serde_json::json!({
            "command": "decompress",
            "input_size": stats.input_size,
            "output_size": stats.output_size,
            "blocks": stats.blocks,
        }));
    }
    0
}

// ---------------------------------------------------------------------------
// Matches command
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct MatchSummary {
    positions: u64,
    matches: u64,
    covered: u64,
}

/// Write `pos<TAB>len<TAB>match_pos` for every position with a match.
fn write_matches<W: Write>(
    data: &[u8],
    max_length: usize,
    greedy: bool,
    out: &mut W,
) -> Result<MatchSummary, String> {
    let mut finder: MatchFinder = MatchFinder::new().map_err(|e| e.to_string())?;
    let mut summary = MatchSummary::default();
    let mut pos = 0;
    while pos < data.len() {
        let found = finder
            .insert_and_find_best_match(data, pos, max_length)
            .map_err(|e| e.to_string())?;
        summary.positions += 1;
        if found.is_none() {
            pos += 1;
            continue;
        }
        writeln!(out, "{pos}\t{}\t{}", found.len, found.pos).map_err(|e| e.to_string())?;
        summary.matches += 1;
        summary.covered += found.len as u64;
        if greedy {
            finder
                .insert_many(data, pos, found.len)
                .map_err(|e| e.to_string())?;
            pos += found.len;
        } else {
            pos += 1;
        }
    }
    Ok(summary)
}

fn cmd_matches(opts: &Options) -> i32 {
    let Some(path) = &opts.input_file else {
        eprintln!("morphmatch: matches: no input file");
        return 1;
    };
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("morphmatch: input file: {}: {e}", path.display());
            return 1;
        }
    };

    let mut out = BufWriter::with_capacity(BUF_SIZE, io::stdout().lock());
    let summary = match write_matches(&data, opts.max_length, opts.greedy, &mut out)
        .and_then(|s| out.flush().map(|_| s).map_err(|e| e.to_string()))
    {
        Ok(summary) => summary,
        Err(msg) => {
            eprintln!("morphmatch: matches: {msg}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "morphmatch: {} positions searched, {} matches, {} bytes covered",
            summary.positions, summary.matches, summary.covered
        );
    }
    if opts.json_output {
        emit_json(serde_json::json!({
            "command": "matches",
            "input_size": data.len(),
            "positions": summary.positions,
            "matches": summary.matches,
            "covered": summary.covered,
            "greedy": opts.greedy,
        }));
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn default_log_filter(opts: &Options) -> &'static str {
    match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    }
}

pub fn run() -> ! {
    let cli = Cli::parse();
    let mut opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_log_filter(&opts)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    // Warn if -c overrides output filename.
    if opts.use_stdout
        && let Some(path) = opts.output_file.take()
        && !opts.quiet
    {
        eprintln!(
            "morphmatch: warning: -c option overrides output filename: {}",
            path.display()
        );
    }

    let exit_code = match opts.command {
        Command::Compress => cmd_compress(&opts),
        Command::Decompress => cmd_decompress(&opts),
        Command::Matches => cmd_matches(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("morphmatch".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    #[test]
    fn parse_byte_size_suffixes() {
        assert_eq!(parse_byte_size("1").unwrap(), 1);
        assert_eq!(parse_byte_size("2K").unwrap(), 2 * 1024);
        assert_eq!(parse_byte_size("3m").unwrap(), 3 * 1024 * 1024);
        assert_eq!(parse_byte_size("4G").unwrap(), 4 * 1024 * 1024 * 1024);
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("12Q").is_err());
    }

    #[test]
    fn compress_subcommand_maps_correctly() {
        let opts = parse_opts(&["compress", "--block-size", "64K", "--no-checksum", "in.bin", "out.mmcz"]);
        assert_eq!(opts.command, Command::Compress);
        assert_eq!(opts.block_size, 64 * 1024);
        assert!(opts.no_checksum);
        assert_eq!(opts.input_file, Some(PathBuf::from("in.bin")));
        assert_eq!(opts.output_file, Some(PathBuf::from("out.mmcz")));
    }

    #[test]
    fn decompress_subcommand_maps_correctly() {
        let opts = parse_opts(&["--quiet", "decompress", "--no-checksum", "in.mmcz"]);
        assert_eq!(opts.command, Command::Decompress);
        assert!(opts.no_checksum);
        assert!(opts.quiet);
        assert_eq!(opts.input_file, Some(PathBuf::from("in.mmcz")));
        assert_eq!(opts.output_file, None);
        assert_eq!(default_log_filter(&opts), "error");
    }

    #[test]
    fn matches_subcommand_defaults() {
        let opts = parse_opts(&["matches", "data.txt"]);
        assert_eq!(opts.command, Command::Matches);
        assert_eq!(opts.max_length, 65_535);
        assert!(!opts.greedy);

        let opts = parse_opts(&["matches", "--greedy", "--max-length", "32", "data.txt"]);
        assert!(opts.greedy);
        assert_eq!(opts.max_length, 32);
    }

    #[test]
    fn matches_rejects_tiny_max_length() {
        let argv = ["morphmatch", "matches", "--max-length", "3", "data.txt"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn global_flags() {
        let opts = parse_opts(&["--force", "--json", "compress", "--stdout", "in"]);
        assert!(opts.use_stdout);
        assert!(opts.force);
        assert!(opts.json_output);
    }

    #[test]
    fn verbose_is_capped() {
        let opts = parse_opts(&["-v", "-v", "-v", "config"]);
        assert_eq!(opts.verbose, 2);
        assert_eq!(default_log_filter(&opts), "debug");
        assert_eq!(parse_opts(&["config"]).verbose, 0);
    }

    #[test]
    fn write_matches_every_position() {
        let data = b"abcdabcdabcd";
        let mut out = Vec::new();
        let summary = write_matches(data, 65_535, false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let first = text.lines().next().unwrap();
        assert_eq!(first, "4\t8\t0");
        assert_eq!(summary.positions, data.len() as u64);
        for line in text.lines() {
            let cols: Vec<usize> = line.split('\t').map(|c| c.parse().unwrap()).collect();
            let (pos, len, from) = (cols[0], cols[1], cols[2]);
            assert!(len >= MIN_MATCH && from < pos);
            assert_eq!(data[from..from + len], data[pos..pos + len]);
        }
    }

    #[test]
    fn write_matches_greedy_skips() {
        let data = b"abcdabcdabcd";
        let mut out = Vec::new();
        let summary = write_matches(data, 65_535, true, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "4\t8\t0\n");
        assert_eq!(summary.matches, 1);
        assert_eq!(summary.covered, 8);
        assert_eq!(summary.positions, 5);
    }

    #[test]
    fn fuzz_hook_tolerates_garbage() {
        fuzz_try_parse_args(&["--bogus".to_string()]);
        fuzz_try_parse_args(&["compress".to_string(), "--block-size".to_string(), "x".to_string()]);
    }
}
