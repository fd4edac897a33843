//! RZIP header constants and header read/write helpers.
//!
//! ## Header (20 bytes)
//!
//! ```text
//! [magic: 8 bytes "#RZIPv\x01#"][max_chunk_size: u32 LE][total_size: u64 LE]
//! ```
//!
//! ## Legacy header (16 bytes)
//!
//! ```text
//! [magic: 8 bytes "#RZIPv\x01#"][max_chunk_size: u32 LE][total_size: u32 LE]
//! ```
//!
//! Both share the same magic. The reader always reads 8 bytes of
//! `total_size`; when the upper half is non-zero it must be the first chunk
//! record's length prefix, so the value is masked and the cursor moves back
//! 4 bytes.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::RzipError;

/// Format version embedded in the magic.
pub const RZIP_VERSION: u8 = 1;

/// Magic bytes at offset 0: `#RZIPv`, version byte, `#`.
pub const RZIP_MAGIC: [u8; 8] = [b'#', b'R', b'Z', b'I', b'P', b'v', RZIP_VERSION, b'#'];

/// Chunk size used by writers unless configured otherwise (1 MiB).
pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 1024;

/// Largest chunk size a reader will allocate a working buffer for (256 MiB).
/// Prevents OOM on corrupt headers.
pub const MAX_CHUNK_SIZE: u32 = 256 * 1024 * 1024;

/// Byte offset of the `total_size` field: magic (8) + `max_chunk_size` (4).
pub const TOTAL_SIZE_OFFSET: u64 = 8 + 4;

/// Size of the current header in bytes.
pub const HEADER_BYTES: u64 = TOTAL_SIZE_OFFSET + 8;

/// Size of the legacy 32-bit header in bytes.
pub const LEGACY_HEADER_BYTES: u64 = TOTAL_SIZE_OFFSET + 4;

/// Parsed container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Uncompressed size of every chunk except possibly the last.
    pub max_chunk_size: u32,
    /// Total uncompressed payload size.
    pub total_size: u64,
    /// `true` if the file carried a 4-byte `total_size`.
    pub legacy: bool,
}

impl Header {
    /// Size of this header on disk.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        if self.legacy {
            LEGACY_HEADER_BYTES
        } else {
            HEADER_BYTES
        }
    }
}

pub(crate) fn check_chunk_size(max_chunk_size: u32) -> Result<(), RzipError> {
    if max_chunk_size == 0 || max_chunk_size > MAX_CHUNK_SIZE {
        return Err(RzipError::InvalidChunkSize(max_chunk_size));
    }
    Ok(())
}

/// Writes a fresh header with `total_size = 0`.
///
/// The zeroed `total_size` is a placeholder, patched by the writer after
/// every write call.
pub fn write_header<W: Write>(w: &mut W, max_chunk_size: u32) -> io::Result<()> {
    w.write_all(&RZIP_MAGIC)?;
    w.write_u32::<LittleEndian>(max_chunk_size)?;
    w.write_u64::<LittleEndian>(0)?;
    Ok(())
}

/// Rewrites `total_size` in place and restores the stream position.
pub(crate) fn patch_total_size<W: Write + Seek>(w: &mut W, total_size: u64) -> io::Result<()> {
    let pos = w.stream_position()?;
    w.seek(SeekFrom::Start(TOTAL_SIZE_OFFSET))?;
    w.write_u64::<LittleEndian>(total_size)?;
    w.seek(SeekFrom::Start(pos))?;
    debug!("patched rzip total_size={} (resume at {})", total_size, pos);
    Ok(())
}

/// Reads and validates the header, leaving `r` on the first chunk record.
///
/// # Errors
///
/// - [`RzipError::ShortHeader`] if the stream ends inside the header.
/// - [`RzipError::BadMagic`] if the magic does not match.
/// - [`RzipError::InvalidChunkSize`] for a zero or oversized chunk size.
pub fn read_header<R: Read + Seek>(r: &mut R) -> Result<Header, RzipError> {
    let mut magic = [0u8; 8];
    read_header_field(r.read_exact(&mut magic))?;
    if magic != RZIP_MAGIC {
        return Err(RzipError::BadMagic);
    }
    let max_chunk_size = read_header_field(r.read_u32::<LittleEndian>())?;
    let mut total_size = read_header_field(r.read_u64::<LittleEndian>())?;

    // 32-bit writers stored a u32 total; the upper half we just read is the
    // first record's length prefix.
    let legacy = total_size >> 32 != 0;
    if legacy {
        total_size &= 0xffff_ffff;
        r.seek(SeekFrom::Current(-4))?;
    }

    check_chunk_size(max_chunk_size)?;

    Ok(Header {
        max_chunk_size,
        total_size,
        legacy,
    })
}

fn read_header_field<T>(res: io::Result<T>) -> Result<T, RzipError> {
    match res {
        Ok(v) => Ok(v),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(RzipError::ShortHeader),
        Err(e) => Err(RzipError::Io(e)),
    }
}

/// Returns `true` if `r` starts with the RZIP magic. The stream position is
/// restored before returning.
pub fn is_rzip<R: Read + Seek>(r: &mut R) -> io::Result<bool> {
    let pos = r.stream_position()?;
    r.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 8];
    let n = read_full(r, &mut magic)?;
    r.seek(SeekFrom::Start(pos))?;
    Ok(n == magic.len() && magic == RZIP_MAGIC)
}

/// Opens `path` and sniffs its magic.
pub fn is_rzip_file<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    let mut f = File::open(path)?;
    is_rzip(&mut f)
}

/// Fills as much of `buf` as the stream allows. Returns the byte count, which
/// is short only at EOF.
pub fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
