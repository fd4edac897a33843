mod writer_tests;

use crate::*;
use std::io::Cursor;

// -------------------- Helpers --------------------

/// Deterministic, poorly compressible bytes (xorshift).
pub(crate) fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut x = seed | 1;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            (x >> 24) as u8
        })
        .collect()
}

/// Highly compressible bytes with some structure.
pub(crate) fn text(len: usize) -> Vec<u8> {
    b"the quick brown fox jumps over the lazy dog. "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

pub(crate) fn small_options(chunk_size: u32) -> WriterOptions {
    WriterOptions {
        chunk_size,
        ..WriterOptions::default()
    }
}

/// Writes each element of `calls` with one write call into an in-memory
/// container and returns its bytes.
pub(crate) fn container(chunk_size: u32, calls: &[&[u8]]) -> Vec<u8> {
    let mut w = RzipWriter::new(Cursor::new(Vec::new()), small_options(chunk_size)).unwrap();
    for data in calls {
        assert_eq!(w.try_write(data).unwrap(), data.len());
    }
    w.into_inner().into_inner()
}

pub(crate) fn reader(bytes: Vec<u8>) -> RzipReader<Cursor<Vec<u8>>> {
    RzipReader::new(Cursor::new(bytes)).unwrap()
}

pub(crate) fn records(bytes: &[u8]) -> Vec<RecordInfo> {
    let (_, iter) = RecordIter::new(Cursor::new(bytes)).unwrap();
    iter.collect::<Result<Vec<_>, _>>().unwrap()
}
