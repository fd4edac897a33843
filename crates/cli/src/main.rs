//! # CLI - rzip container tool
//!
//! Packs raw files (savestates, memory dumps, ...) into RZIP containers and
//! back, and inspects existing containers.
//!
//! ## Commands
//!
//! ```text
//! rzip pack <input> <output>                 Compress a raw file
//! rzip unpack <input> <output>               Decompress a container
//! rzip info <input>                          Print header and record stats
//! rzip cat <input> [--skip N] [--len N]      Write a payload slice to stdout
//! rzip verify <input> [--against <raw>]      Strict decode + CRC32 check
//! ```
//!
//! ## Configuration
//!
//! Chunk size, compression level, fsync and strict mode come from the
//! environment (see the `config` crate):
//!
//! ```text
//! RZIP_CHUNK_KB   Chunk size in KiB       (default: 1024)
//! RZIP_LEVEL      zlib level 0-9          (default: 6)
//! RZIP_SYNC       fsync every write       (default: "false")
//! RZIP_STRICT     fail on damaged input   (default: "false")
//! RUST_LOG        log filter              (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ rzip pack game.state game.rzip
//! packed 16777216 bytes into 2318044 bytes (13.8%)
//! $ rzip info game.rzip
//! format:      RZIP v1
//! chunk size:  1048576
//! total size:  16777216
//! records:     16 (0 empty)
//! compressed:  2318024 bytes (13.8%)
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::RzipConfig;
use log::debug;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rzip", version, about = "Chunked zlib container tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress a raw file into a container
    Pack { input: PathBuf, output: PathBuf },

    /// Decompress a container into a raw file
    Unpack { input: PathBuf, output: PathBuf },

    /// Print header fields and record statistics
    Info { input: PathBuf },

    /// Write part of the payload to stdout
    Cat {
        input: PathBuf,

        /// Uncompressed bytes to skip first
        #[arg(long, default_value_t = 0)]
        skip: u64,

        /// Maximum bytes to write (default: to the end)
        #[arg(long)]
        len: Option<u64>,
    },

    /// Decode the whole container strictly and report its CRC32
    Verify {
        input: PathBuf,

        /// Raw file the payload must match
        #[arg(long)]
        against: Option<PathBuf>,
    },
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let cfg = RzipConfig::from_env();
    debug!("rzip config: {}", cfg.describe());

    match cli.command {
        Command::Pack { input, output } => {
            let stats = commands::pack(&cfg, &input, &output)?;
            println!(
                "packed {} bytes into {} bytes ({:.1}%)",
                stats.raw_bytes,
                stats.packed_bytes,
                percent(stats.packed_bytes, stats.raw_bytes)
            );
        }
        Command::Unpack { input, output } => {
            let written = commands::unpack(&cfg, &input, &output)?;
            println!("unpacked {} bytes", written);
        }
        Command::Info { input } => {
            let info = commands::info(&input)?;
            println!("format:      RZIP v{}", rzip::RZIP_VERSION);
            if info.header.legacy {
                println!("header:      legacy (32-bit size)");
            }
            println!("chunk size:  {}", info.header.max_chunk_size);
            println!("total size:  {}", info.header.total_size);
            println!("records:     {} ({} empty)", info.records, info.empty_records);
            println!(
                "compressed:  {} bytes ({:.1}%)",
                info.compressed_bytes,
                percent(info.compressed_bytes, info.header.total_size)
            );
            if let Some(reason) = &info.damage {
                println!("damaged:     {}", reason);
            }
        }
        Command::Cat { input, skip, len } => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            commands::cat(&cfg, &input, skip, len, &mut out)?;
            out.flush()?;
        }
        Command::Verify { input, against } => {
            let report = commands::verify(&input, against.as_deref())?;
            println!(
                "ok: {} bytes in {} chunks, crc32={:08x}",
                report.bytes, report.chunks, report.crc32
            );
            if report.header.legacy {
                println!("header: legacy (32-bit size)");
            }
        }
    }

    Ok(())
}
