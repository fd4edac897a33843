use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, trace, warn};
use std::fs::{File, OpenOptions};
use std::io::{Seek, Write};
use std::path::Path;

use crate::codec::{compress_bound, ChunkCompressor};
use crate::format::{check_chunk_size, patch_total_size, write_header, DEFAULT_CHUNK_SIZE};
use crate::RzipError;

/// Default zlib compression level.
pub const DEFAULT_LEVEL: u32 = 6;

/// Tunables fixed for the lifetime of a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Uncompressed bytes per chunk.
    pub chunk_size: u32,
    /// zlib level, 0 (store) through 9 (best).
    pub level: u32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            level: DEFAULT_LEVEL,
        }
    }
}

/// Append-only container writer.
///
/// Each write call cuts the input into pieces of at most `max_chunk_size`
/// bytes, compresses and appends them as `[len: u32 LE][zlib stream]`
/// records, then rewrites `total_size` in the header. No data is buffered
/// between calls, so a crash loses at most the call in progress.
///
/// The underlying stream must be positioned at offset 0 when the writer is
/// created; the header is patched at an absolute offset.
pub struct RzipWriter<W: Write + Seek> {
    inner: W,
    max_chunk_size: u32,
    total_size: u64,
    compressor: ChunkCompressor,
    chunks_written: u64,
}

impl RzipWriter<File> {
    /// Creates (or truncates) `path` and writes a fresh header. Invalid
    /// options are rejected before `path` is touched.
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self, RzipError> {
        check_chunk_size(options.chunk_size)?;
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let writer = Self::new(file, options)?;
        debug!(
            "created rzip {} (chunk={}, level={})",
            path.display(),
            options.chunk_size,
            options.level
        );
        Ok(writer)
    }

    /// Forces written chunks and the patched header to disk via `sync_all()`.
    pub fn sync_to_disk(&mut self) -> Result<(), RzipError> {
        self.inner.flush()?;
        self.inner.sync_all()?;
        Ok(())
    }
}

impl<W: Write + Seek> RzipWriter<W> {
    /// Writes the header to `inner` and returns a writer with
    /// `total_size = 0`.
    ///
    /// # Errors
    ///
    /// [`RzipError::InvalidChunkSize`] for a zero or oversized chunk size,
    /// [`RzipError::Io`] if the header cannot be written.
    pub fn new(mut inner: W, options: WriterOptions) -> Result<Self, RzipError> {
        check_chunk_size(options.chunk_size)?;
        write_header(&mut inner, options.chunk_size)?;
        Ok(Self {
            inner,
            max_chunk_size: options.chunk_size,
            total_size: 0,
            compressor: ChunkCompressor::new(options.level),
            chunks_written: 0,
        })
    }

    /// Appends `data`, best-effort. Returns the uncompressed bytes stored,
    /// which is less than `data.len()` only if compression or I/O failed
    /// (the failure is logged).
    pub fn write(&mut self, data: &[u8]) -> usize {
        let mut done = 0;
        if let Err(e) = self.write_and_patch(data, &mut done) {
            warn!("rzip write stopped after {} of {} bytes: {}", done, data.len(), e);
        }
        done
    }

    /// Appends `data` and returns `data.len()` on success.
    ///
    /// The header is patched even when a chunk fails, so the file stays
    /// consistent with every record fully written before the error.
    ///
    /// # Errors
    ///
    /// The first compression or I/O error hit.
    pub fn try_write(&mut self, data: &[u8]) -> Result<usize, RzipError> {
        let mut done = 0;
        self.write_and_patch(data, &mut done)?;
        Ok(done)
    }

    fn write_and_patch(&mut self, data: &[u8], done: &mut usize) -> Result<(), RzipError> {
        let appended = self.append_chunks(data, done);
        let patched = patch_total_size(&mut self.inner, self.total_size);
        match (appended, patched) {
            (Err(e), Err(patch_err)) => {
                warn!("failed to patch rzip total_size after write error: {}", patch_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(patch_err)) => Err(patch_err.into()),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    fn append_chunks(&mut self, data: &[u8], done: &mut usize) -> Result<(), RzipError> {
        if data.is_empty() {
            return Ok(());
        }
        // Scoped to this call; only the header size field outlives it.
        let mut zipped = vec![0u8; compress_bound(self.max_chunk_size)];

        for piece in data.chunks(self.max_chunk_size as usize) {
            let zipped_len = self.compressor.compress_chunk(piece, &mut zipped)?;
            self.inner.write_u32::<LittleEndian>(zipped_len as u32)?;
            self.inner.write_all(&zipped[..zipped_len])?;

            self.total_size += piece.len() as u64;
            self.chunks_written += 1;
            *done += piece.len();
            trace!(
                "wrote rzip chunk #{} ({} -> {} bytes)",
                self.chunks_written,
                piece.len(),
                zipped_len
            );
        }
        Ok(())
    }

    /// Uncompressed bytes written so far (the value stored in the header).
    #[must_use]
    pub fn size(&self) -> u64 {
        self.total_size
    }

    /// Chunk size written to the header.
    #[must_use]
    pub fn max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Number of chunk records appended so far.
    #[must_use]
    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    /// Returns a reference to the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns a mutable reference to the underlying stream.
    ///
    /// Bytes written through it land between records; the reader only
    /// tolerates zero-length records there.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consumes the writer and returns the underlying stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
