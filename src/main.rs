use bizrepack::archive::{self, PackOptions};
use bizrepack::codec::{CompressOptions, MAX_MATCH, MAX_WINDOW};
use clap::{ArgGroup, Parser, ValueEnum};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "bizrepack",
    version,
    about = "Unpack and repack MOMO, PTX, TIM2 and IPUM game containers"
)]
#[command(group(ArgGroup::new("action").args(["extract", "pack", "decompress", "compress", "info"])))]
struct Cli {
    /// File to unpack, inspect or (de)compress; unpack directory or its file to pack
    path: PathBuf,

    /// Unpack into `_<name>` next to the file (default)
    #[arg(short, long)]
    extract: bool,
    /// Rebuild the file from its unpack directory
    #[arg(short, long)]
    pack: bool,
    /// Decode one raw compressed stream
    #[arg(short, long)]
    decompress: bool,
    /// Encode a file as one block-aligned compressed stream
    #[arg(short, long)]
    compress: bool,
    /// Print the detected type and sizes
    #[arg(short, long)]
    info: bool,

    /// Output file for --decompress / --compress
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print --info as JSON
    #[arg(long)]
    json: bool,

    /// Back-reference window in 16-bit words
    #[arg(long, default_value_t = MAX_WINDOW)]
    window: usize,
    /// Match length cap in 16-bit words
    #[arg(long, default_value_t = MAX_MATCH)]
    max_match: usize,
    /// Do not copy overwritten files to `<file>.bak`
    #[arg(long)]
    no_backup: bool,
    /// Also write the uncompressed MOMO assembly to `<file>.bin`
    #[arg(long)]
    keep_uncompressed: bool,

    /// Log level
    #[arg(short, long, value_enum, default_value = "info")]
    log_level: LogLevel,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info  => Level::INFO,
            LogLevel::Warn  => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    let compression = CompressOptions::new(cli.window, cli.max_match);

    // ── Pack ─────────────────────────────────────────────────────────────────
    if cli.pack {
        let opts = PackOptions {
            compression,
            backup:            !cli.no_backup,
            keep_uncompressed: cli.keep_uncompressed,
        };
        match archive::pack(&cli.path, &opts)? {
            Some(written) => println!("Packed: {}", written.display()),
            None          => println!("{}: not a container", cli.path.display()),
        }

    // ── Raw codec ────────────────────────────────────────────────────────────
    } else if cli.decompress {
        let output = cli.output.unwrap_or_else(|| with_suffix(&cli.path, ".dec"));
        let size = archive::decompress_file(&cli.path, &output)?;
        println!("Decompressed: {} ({} bytes)", output.display(), size);
    } else if cli.compress {
        let output = cli.output.unwrap_or_else(|| with_suffix(&cli.path, ".biz"));
        let size = archive::compress_file(&cli.path, &output, &compression)?;
        println!("Compressed: {} ({} bytes)", output.display(), size);

    // ── Info ─────────────────────────────────────────────────────────────────
    } else if cli.info {
        let info = archive::inspect(&cli.path)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            println!("── {} ──", info.path.display());
            println!("  Type           {}", info.file_type);
            println!("  Layers         {}", info.layers);
            println!("  Size on disk   {} B", info.raw_size);
            println!("  Decompressed   {} B", info.size);
            if let Some(n) = info.entries {
                println!("  Entries        {n}");
            }
        }

    // ── Extract ──────────────────────────────────────────────────────────────
    } else {
        match archive::unpack_file(&cli.path)? {
            Some(dir) => println!("Unpacked to: {}", dir.display()),
            None      => println!("{}: not a container", cli.path.display()),
        }
    }

    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}
