//! zlib chunk codec.
//!
//! Every chunk is a complete, independent zlib stream (header + deflate +
//! adler32), byte-compatible with zlib's `compress()` / `uncompress()`.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::RzipError;

/// Worst-case compressed size of `chunk_size` input bytes: 0.1% larger plus
/// 12 bytes.
#[must_use]
pub fn compress_bound(chunk_size: u32) -> usize {
    let n = chunk_size as usize;
    n + n / 1000 + 12
}

/// Compresses one chunk at a time, reusing the deflate state between chunks.
pub struct ChunkCompressor {
    inner: Compress,
}

impl ChunkCompressor {
    /// Creates a compressor for zlib `level` (0-9).
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self {
            inner: Compress::new(Compression::new(level), true),
        }
    }

    /// Compresses `input` into `output` as one zlib stream and returns the
    /// compressed length.
    ///
    /// # Errors
    ///
    /// [`RzipError::Codec`] if deflate fails or the stream does not fit in
    /// `output`.
    pub fn compress_chunk(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, RzipError> {
        self.inner.reset();
        let status = self
            .inner
            .compress(input, output, FlushCompress::Finish)
            .map_err(|e| RzipError::Codec(format!("compress: {}", e)))?;
        match status {
            Status::StreamEnd => Ok(self.inner.total_out() as usize),
            _ => Err(RzipError::Codec(format!(
                "compressed chunk of {} bytes exceeds {} byte bound",
                input.len(),
                output.len()
            ))),
        }
    }
}

/// Decompresses one chunk at a time into a caller-owned buffer.
pub struct ChunkDecompressor {
    inner: Decompress,
}

impl Default for ChunkDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkDecompressor {
    /// Creates a zlib decompressor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(true),
        }
    }

    /// Inflates the complete zlib stream in `input` into `output` and returns
    /// the decompressed length.
    ///
    /// # Errors
    ///
    /// [`RzipError::Codec`] if the stream is corrupt, incomplete, or inflates
    /// to more than `output.len()` bytes.
    pub fn decompress_chunk(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, RzipError> {
        self.inner.reset(true);
        let status = self
            .inner
            .decompress(input, output, FlushDecompress::Finish)
            .map_err(|e| RzipError::Codec(format!("decompress: {}", e)))?;
        let produced = self.inner.total_out() as usize;
        match status {
            Status::StreamEnd => Ok(produced),
            _ if produced == output.len() => Err(RzipError::Codec(format!(
                "zlib stream did not end within {} output bytes",
                output.len()
            ))),
            _ => Err(RzipError::Codec(format!(
                "incomplete zlib stream ({} of {} input bytes consumed)",
                self.inner.total_in(),
                input.len()
            ))),
        }
    }
}
