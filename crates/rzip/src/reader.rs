use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace, warn};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use crate::codec::{compress_bound, ChunkDecompressor};
use crate::format::{read_full, read_header, Header};
use crate::RzipError;

/// Where served bytes go: copied into the caller's buffer, or dropped.
enum Sink<'a> {
    Copy(&'a mut [u8]),
    Discard(usize),
}

impl Sink<'_> {
    fn len(&self) -> usize {
        match self {
            Sink::Copy(buf) => buf.len(),
            Sink::Discard(n) => *n,
        }
    }
}

/// Sequential container reader.
///
/// Holds one working buffer of `max_chunk_size` bytes containing the current
/// decompressed chunk, and a cursor (`chunk_index` / `chunk_size`) into it.
/// When the cursor reaches the end of the valid bytes the next chunk record
/// is read and inflated.
///
/// The reader is generic over any `Read + Seek` implementor so tests can run
/// it over a `Cursor<Vec<u8>>`. Seeking is only used once, on open, to
/// re-align legacy headers.
pub struct RzipReader<R> {
    inner: R,
    header: Header,
    /// Current decompressed chunk; `len() == max_chunk_size`.
    chunk: Vec<u8>,
    chunk_index: usize,
    chunk_size: usize,
    decompressor: ChunkDecompressor,
    /// File offset of the next record to load.
    offset: u64,
    /// Uncompressed bytes served or skipped so far.
    position: u64,
    chunks_loaded: u64,
}

impl RzipReader<File> {
    /// Opens an existing container file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RzipError> {
        let path = path.as_ref();
        let reader = Self::new(File::open(path)?)?;
        debug!(
            "opened rzip {} for reading (chunk={}, total={}, legacy={})",
            path.display(),
            reader.header.max_chunk_size,
            reader.header.total_size,
            reader.header.legacy
        );
        Ok(reader)
    }
}

impl<R: Read + Seek> RzipReader<R> {
    /// Validates the header at the current position of `inner` and prepares
    /// an empty cursor, so the first read loads the first chunk.
    pub fn new(mut inner: R) -> Result<Self, RzipError> {
        let header = read_header(&mut inner)?;
        let offset = inner.stream_position()?;
        Ok(Self {
            inner,
            chunk: vec![0u8; header.max_chunk_size as usize],
            chunk_index: 0,
            chunk_size: 0,
            decompressor: ChunkDecompressor::new(),
            offset,
            position: 0,
            chunks_loaded: 0,
            header,
        })
    }
}

impl<R: Read> RzipReader<R> {
    /// Reads up to `buf.len()` bytes, best-effort.
    ///
    /// Returns fewer bytes than requested at end of stream, or when the
    /// container is truncated or corrupt. The failure is logged, not
    /// returned; use [`try_read`](Self::try_read) to tell them apart.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let wanted = buf.len();
        let mut done = 0;
        if let Err(e) = self.transfer(Sink::Copy(buf), &mut done) {
            warn!("rzip read stopped after {} of {} bytes: {}", done, wanted, e);
        }
        done
    }

    /// Skips up to `length` bytes, best-effort. Every skipped chunk is still
    /// decompressed.
    pub fn skip(&mut self, length: usize) -> usize {
        let mut done = 0;
        if let Err(e) = self.transfer(Sink::Discard(length), &mut done) {
            warn!("rzip skip stopped after {} of {} bytes: {}", done, length, e);
        }
        done
    }

    /// Reads up to `buf.len()` bytes.
    ///
    /// `Ok(n)` with `n < buf.len()` means the stream ended cleanly on a
    /// record boundary.
    ///
    /// # Errors
    ///
    /// - [`RzipError::Truncated`] if the file ends inside a record.
    /// - [`RzipError::Corrupt`] for an impossible compressed length.
    /// - [`RzipError::Codec`] if a chunk fails to inflate.
    /// - [`RzipError::Io`] on any other I/O failure.
    ///
    /// Bytes served before the failure are already in `buf` and counted in
    /// [`position`](Self::position).
    pub fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, RzipError> {
        let mut done = 0;
        self.transfer(Sink::Copy(buf), &mut done)?;
        Ok(done)
    }

    /// Skips up to `length` bytes with the same contract as
    /// [`try_read`](Self::try_read).
    pub fn try_skip(&mut self, length: usize) -> Result<usize, RzipError> {
        let mut done = 0;
        self.transfer(Sink::Discard(length), &mut done)?;
        Ok(done)
    }

    /// Shared read/skip loop. `done` counts bytes served, including when an
    /// error cuts the loop short.
    fn transfer(&mut self, mut sink: Sink<'_>, done: &mut usize) -> Result<(), RzipError> {
        let length = sink.len();
        while *done < length {
            if self.chunk_index == self.chunk_size {
                if !self.load_chunk()? {
                    break;
                }
                continue;
            }
            let n = (self.chunk_size - self.chunk_index).min(length - *done);
            if let Sink::Copy(out) = &mut sink {
                out[*done..*done + n]
                    .copy_from_slice(&self.chunk[self.chunk_index..self.chunk_index + n]);
            }
            self.chunk_index += n;
            self.position += n as u64;
            *done += n;
        }
        Ok(())
    }

    /// Loads the next non-empty record into the working buffer.
    ///
    /// Returns `Ok(false)` at a clean end of stream (EOF exactly where a
    /// length prefix would start). Zero-length records are consumed silently.
    fn load_chunk(&mut self) -> Result<bool, RzipError> {
        self.chunk_index = 0;
        self.chunk_size = 0;

        loop {
            let record_offset = self.offset;
            let mut prefix = [0u8; 4];
            match read_full(&mut self.inner, &mut prefix)? {
                0 => return Ok(false),
                4 => {}
                _ => {
                    return Err(RzipError::Truncated {
                        what: "length prefix",
                        offset: record_offset,
                    })
                }
            }
            self.offset += 4;

            let zipped_len = LittleEndian::read_u32(&prefix) as usize;
            if zipped_len == 0 {
                trace!("skipping empty rzip record at offset {}", record_offset);
                continue;
            }
            if zipped_len > compress_bound(self.header.max_chunk_size) {
                return Err(RzipError::Corrupt {
                    offset: record_offset,
                    reason: format!(
                        "compressed length {} exceeds bound for {} byte chunks",
                        zipped_len, self.header.max_chunk_size
                    ),
                });
            }

            let mut zipped = vec![0u8; zipped_len];
            if read_full(&mut self.inner, &mut zipped)? != zipped_len {
                return Err(RzipError::Truncated {
                    what: "chunk payload",
                    offset: record_offset,
                });
            }
            self.offset += zipped_len as u64;

            self.chunk_size = self
                .decompressor
                .decompress_chunk(&zipped, &mut self.chunk)?;
            self.chunks_loaded += 1;
            trace!(
                "loaded rzip chunk #{} at offset {} ({} -> {} bytes)",
                self.chunks_loaded,
                record_offset,
                zipped_len,
                self.chunk_size
            );
            return Ok(true);
        }
    }

    /// Total uncompressed size recorded in the header.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.header.total_size
    }

    /// Chunk size recorded in the header.
    #[must_use]
    pub fn max_chunk_size(&self) -> u32 {
        self.header.max_chunk_size
    }

    /// The parsed header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Uncompressed bytes read or skipped so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of non-empty chunk records inflated so far.
    #[must_use]
    pub fn chunks_loaded(&self) -> u64 {
        self.chunks_loaded
    }

    /// Returns a reference to the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consumes the reader and returns the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}
