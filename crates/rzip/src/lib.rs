//! # RZIP - Chunked Compressed Stream Container
//!
//! A streaming container for large binary blobs (emulator savestates and the
//! like). The payload is cut into fixed-size chunks, every chunk is
//! compressed independently with zlib and appended to the file behind a
//! length prefix. Reading decompresses one chunk at a time, so a consumer can
//! walk the stream sequentially or skip forward without ever holding more
//! than one decompressed chunk in memory.
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ HEADER (20 bytes)                                            │
//! │                                                              │
//! │ magic "#RZIPv\x01#" (8) | max_chunk_size (u32 LE)            │
//! │ total_size (u64 LE)                                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │ CHUNK RECORDS                                                │
//! │                                                              │
//! │ compressed_len (u32 LE) | zlib stream (compressed_len bytes) │
//! │                                                              │
//! │ ... repeated until EOF ...                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! `total_size` is rewritten after every write call, so a file cut short by a
//! crash still describes every chunk that was fully written. A record with
//! `compressed_len == 0` is a no-op and is skipped by readers.
//!
//! Containers produced by old 32-bit writers stored `total_size` in 4 bytes.
//! The reader detects those (non-zero upper half of the 8-byte read) and
//! re-aligns itself on the first chunk record.
//!
//! ## Two read/write contracts
//!
//! The `read` / `skip` / `write` methods are best-effort: a truncated or
//! corrupt container yields as much valid prefix as possible and the failure
//! is logged through the [`log`] facade. The `try_*` variants run the same
//! loops but return a [`RzipError`] so callers can tell a clean end of stream
//! from damage.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rzip::{OpenMode, RzipFile};
//!
//! let mut f = RzipFile::new();
//! f.open("state.rzip", OpenMode::Write).unwrap();
//! f.write(b"savestate bytes");
//! f.close();
//!
//! f.open("state.rzip", OpenMode::Read).unwrap();
//! let mut buf = vec![0u8; f.size() as usize];
//! assert_eq!(f.read(&mut buf), buf.len());
//! ```

mod codec;
mod file;
mod format;
mod reader;
mod records;
mod writer;

use std::io;

use thiserror::Error;

pub use codec::{compress_bound, ChunkCompressor, ChunkDecompressor};
pub use file::{OpenMode, RzipFile};
pub use format::{
    is_rzip, is_rzip_file, read_full, read_header, write_header, Header, DEFAULT_CHUNK_SIZE,
    HEADER_BYTES, LEGACY_HEADER_BYTES, MAX_CHUNK_SIZE, RZIP_MAGIC, RZIP_VERSION,
    TOTAL_SIZE_OFFSET,
};
pub use reader::RzipReader;
pub use records::{RecordInfo, RecordIter};
pub use writer::{RzipWriter, WriterOptions, DEFAULT_LEVEL};

/// Errors produced while opening, reading or writing a container.
#[derive(Debug, Error)]
pub enum RzipError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The first 8 bytes are not the RZIP magic.
    #[error("not an rzip container (bad magic)")]
    BadMagic,

    /// The file ended before the 20-byte header was complete.
    #[error("short header")]
    ShortHeader,

    /// The chunk size is zero or larger than [`MAX_CHUNK_SIZE`].
    #[error("invalid chunk size {0}")]
    InvalidChunkSize(u32),

    /// The file ended in the middle of a chunk record.
    #[error("truncated {what} at offset {offset}")]
    Truncated {
        /// Which part of the record was cut short.
        what: &'static str,
        /// File offset of the record.
        offset: u64,
    },

    /// A record header is structurally impossible.
    #[error("corrupt record at offset {offset}: {reason}")]
    Corrupt {
        /// File offset of the record.
        offset: u64,
        /// Human-readable reason.
        reason: String,
    },

    /// zlib rejected the data (bad stream, or output bound exceeded).
    #[error("codec error: {0}")]
    Codec(String),
}

#[cfg(test)]
mod tests;
