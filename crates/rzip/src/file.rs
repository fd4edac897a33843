use log::{debug, warn};
use std::fs::File;
use std::path::Path;

use crate::reader::RzipReader;
use crate::writer::{RzipWriter, WriterOptions};
use crate::RzipError;

/// Direction a [`RzipFile`] is opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Decode an existing container.
    Read,
    /// Create (or truncate) a container and append to it.
    Write,
}

/// State of an open handle. Only the read side owns a working buffer.
enum Mode {
    Read(RzipReader<File>),
    Write(RzipWriter<File>),
}

/// Reusable container handle bound to one file at a time.
///
/// A handle is either closed or open in exactly one [`OpenMode`]. Opening an
/// already open handle, or calling `read`/`skip`/`write` in the wrong mode
/// or while closed, is a programming error and panics. Closing releases the
/// file and the working buffer together; dropping the handle does the same.
#[derive(Default)]
pub struct RzipFile {
    state: Option<Mode>,
    options: WriterOptions,
    /// If `true`, every write call is followed by `fsync`.
    sync: bool,
}

impl std::fmt::Debug for RzipFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.state {
            None => "closed",
            Some(Mode::Read(_)) => "read",
            Some(Mode::Write(_)) => "write",
        };
        f.debug_struct("RzipFile")
            .field("mode", &mode)
            .field("size", &self.size())
            .field("options", &self.options)
            .field("sync", &self.sync)
            .finish()
    }
}

impl RzipFile {
    /// Creates a closed handle with default writer options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a closed handle whose write-mode opens use `options`, and
    /// optionally fsync after every write call.
    #[must_use]
    pub fn with_options(options: WriterOptions, sync: bool) -> Self {
        Self {
            state: None,
            options,
            sync,
        }
    }

    /// Opens `path` in `mode`.
    ///
    /// # Panics
    ///
    /// Panics if the handle is already open.
    ///
    /// # Errors
    ///
    /// Any error from [`RzipReader::open`] or [`RzipWriter::create`]; the
    /// handle stays closed. Invalid writer options leave `path` untouched.
    pub fn open<P: AsRef<Path>>(&mut self, path: P, mode: OpenMode) -> Result<(), RzipError> {
        assert!(self.state.is_none(), "rzip handle is already open");
        let path = path.as_ref();
        let state = match mode {
            OpenMode::Read => Mode::Read(RzipReader::open(path)?),
            OpenMode::Write => Mode::Write(RzipWriter::create(path, self.options)?),
        };
        self.state = Some(state);
        debug!("opened rzip {} ({:?})", path.display(), mode);
        Ok(())
    }

    /// Opens over an already opened `file`, which must be positioned at the
    /// start of the container. In write mode the file should be empty.
    ///
    /// # Panics
    ///
    /// Panics if the handle is already open.
    pub fn open_file(&mut self, file: File, mode: OpenMode) -> Result<(), RzipError> {
        assert!(self.state.is_none(), "rzip handle is already open");
        let state = match mode {
            OpenMode::Read => Mode::Read(RzipReader::new(file)?),
            OpenMode::Write => Mode::Write(RzipWriter::new(file, self.options)?),
        };
        self.state = Some(state);
        Ok(())
    }

    /// Releases the file and working buffer. No-op if already closed.
    pub fn close(&mut self) {
        if self.state.take().is_some() {
            debug!("closed rzip handle");
        }
    }

    /// Returns `true` while a file is attached.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Returns `true` if the handle is open in write mode.
    #[must_use]
    pub fn is_writing(&self) -> bool {
        matches!(self.state, Some(Mode::Write(_)))
    }

    /// Uncompressed payload size: the header value in read mode, the bytes
    /// written so far in write mode, 0 when closed.
    #[must_use]
    pub fn size(&self) -> u64 {
        match &self.state {
            Some(Mode::Read(r)) => r.size(),
            Some(Mode::Write(w)) => w.size(),
            None => 0,
        }
    }

    /// Chunk size of the open container.
    #[must_use]
    pub fn max_chunk_size(&self) -> Option<u32> {
        match &self.state {
            Some(Mode::Read(r)) => Some(r.max_chunk_size()),
            Some(Mode::Write(w)) => Some(w.max_chunk_size()),
            None => None,
        }
    }

    /// Uncompressed bytes consumed (read mode) or stored (write mode).
    #[must_use]
    pub fn position(&self) -> u64 {
        match &self.state {
            Some(Mode::Read(r)) => r.position(),
            Some(Mode::Write(w)) => w.size(),
            None => 0,
        }
    }

    /// The underlying file, if open.
    #[must_use]
    pub fn raw_file(&self) -> Option<&File> {
        match &self.state {
            Some(Mode::Read(r)) => Some(r.get_ref()),
            Some(Mode::Write(w)) => Some(w.get_ref()),
            None => None,
        }
    }

    /// Best-effort read, see [`RzipReader::read`].
    ///
    /// # Panics
    ///
    /// Panics unless the handle is open for reading.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.reader_mut().read(buf)
    }

    /// Best-effort skip, see [`RzipReader::skip`].
    ///
    /// # Panics
    ///
    /// Panics unless the handle is open for reading.
    pub fn skip(&mut self, length: usize) -> usize {
        self.reader_mut().skip(length)
    }

    /// See [`RzipReader::try_read`].
    ///
    /// # Panics
    ///
    /// Panics unless the handle is open for reading.
    pub fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, RzipError> {
        self.reader_mut().try_read(buf)
    }

    /// See [`RzipReader::try_skip`].
    ///
    /// # Panics
    ///
    /// Panics unless the handle is open for reading.
    pub fn try_skip(&mut self, length: usize) -> Result<usize, RzipError> {
        self.reader_mut().try_skip(length)
    }

    /// Best-effort write, see [`RzipWriter::write`]. With `sync` enabled a
    /// failed fsync is logged.
    ///
    /// # Panics
    ///
    /// Panics unless the handle is open for writing.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let sync = self.sync;
        let w = self.writer_mut();
        let n = w.write(data);
        if sync {
            if let Err(e) = w.sync_to_disk() {
                warn!("rzip fsync failed: {}", e);
            }
        }
        n
    }

    /// See [`RzipWriter::try_write`]. With `sync` enabled the file is
    /// fsynced after a successful write.
    ///
    /// # Panics
    ///
    /// Panics unless the handle is open for writing.
    pub fn try_write(&mut self, data: &[u8]) -> Result<usize, RzipError> {
        let sync = self.sync;
        let w = self.writer_mut();
        let n = w.try_write(data)?;
        if sync {
            w.sync_to_disk()?;
        }
        Ok(n)
    }

    fn reader_mut(&mut self) -> &mut RzipReader<File> {
        match &mut self.state {
            Some(Mode::Read(r)) => r,
            Some(Mode::Write(_)) => panic!("rzip handle is open for writing"),
            None => panic!("rzip handle is not open"),
        }
    }

    fn writer_mut(&mut self) -> &mut RzipWriter<File> {
        match &mut self.state {
            Some(Mode::Write(w)) => w,
            Some(Mode::Read(_)) => panic!("rzip handle is open for reading"),
            None => panic!("rzip handle is not open"),
        }
    }
}
