//! Record walking without decompression.

use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Seek, SeekFrom};

use crate::format::{read_full, read_header, Header};
use crate::RzipError;

/// Location of one chunk record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordInfo {
    /// File offset of the length prefix.
    pub offset: u64,
    /// Length of the compressed payload (0 for a no-op record).
    pub compressed_len: u32,
}

/// Iterates over the chunk records of a container by following length
/// prefixes. Payloads are seeked over, never read.
///
/// Yields `Err(RzipError::Truncated)` once and then stops if the file ends
/// inside a record.
pub struct RecordIter<R> {
    inner: R,
    offset: u64,
    file_len: u64,
    done: bool,
}

impl<R: Read + Seek> RecordIter<R> {
    /// Reads the header and positions the iterator on the first record.
    pub fn new(mut inner: R) -> Result<(Header, Self), RzipError> {
        let header = read_header(&mut inner)?;
        let offset = inner.stream_position()?;
        let file_len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(offset))?;
        Ok((
            header,
            Self {
                inner,
                offset,
                file_len,
                done: false,
            },
        ))
    }

    fn next_record(&mut self) -> Result<Option<RecordInfo>, RzipError> {
        let offset = self.offset;
        let mut prefix = [0u8; 4];
        match read_full(&mut self.inner, &mut prefix)? {
            0 => return Ok(None),
            4 => {}
            _ => {
                return Err(RzipError::Truncated {
                    what: "length prefix",
                    offset,
                })
            }
        }
        let compressed_len = LittleEndian::read_u32(&prefix);
        let end = offset + 4 + u64::from(compressed_len);
        if end > self.file_len {
            return Err(RzipError::Truncated {
                what: "chunk payload",
                offset,
            });
        }
        self.inner.seek(SeekFrom::Start(end))?;
        self.offset = end;
        Ok(Some(RecordInfo {
            offset,
            compressed_len,
        }))
    }
}

impl<R: Read + Seek> Iterator for RecordIter<R> {
    type Item = Result<RecordInfo, RzipError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(rec)) => Some(Ok(rec)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
