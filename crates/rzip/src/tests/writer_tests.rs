use super::*;
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use tempfile::tempdir;

fn inflate_record(bytes: &[u8], rec: RecordInfo, capacity: usize) -> Vec<u8> {
    let start = rec.offset as usize + 4;
    let end = start + rec.compressed_len as usize;
    let mut out = vec![0u8; capacity];
    let n = ChunkDecompressor::new()
        .decompress_chunk(&bytes[start..end], &mut out)
        .unwrap();
    out.truncate(n);
    out
}

// -------------------- Chunking boundaries --------------------

#[test]
fn exactly_one_chunk_produces_one_record() {
    let bytes = container(128, &[&noise(128, 1)]);
    let recs = records(&bytes);
    assert_eq!(recs.len(), 1);
    assert_eq!(inflate_record(&bytes, recs[0], 128).len(), 128);
}

#[test]
fn one_byte_over_produces_second_record_of_one_byte() {
    let payload = noise(129, 2);
    let bytes = container(128, &[&payload]);
    let recs = records(&bytes);
    assert_eq!(recs.len(), 2);
    assert_eq!(inflate_record(&bytes, recs[0], 128), &payload[..128]);
    assert_eq!(inflate_record(&bytes, recs[1], 128), &payload[128..]);
}

#[test]
fn chunks_do_not_span_write_calls() {
    // Each call flushes its own tail chunk.
    let bytes = container(100, &[&text(150), &text(30)]);
    let sizes: Vec<usize> = records(&bytes)
        .into_iter()
        .map(|rec| inflate_record(&bytes, rec, 100).len())
        .collect();
    assert_eq!(sizes, vec![100, 50, 30]);
}

#[test]
fn empty_write_appends_nothing() {
    let mut w = RzipWriter::new(Cursor::new(Vec::new()), small_options(64)).unwrap();
    assert_eq!(w.try_write(&[]).unwrap(), 0);
    assert_eq!(w.chunks_written(), 0);
    let bytes = w.into_inner().into_inner();
    assert_eq!(bytes.len() as u64, HEADER_BYTES);
    assert!(records(&bytes).is_empty());
}

// -------------------- Header patching --------------------

#[test]
fn total_size_is_patched_after_every_call() {
    let mut w = RzipWriter::new(Cursor::new(Vec::new()), small_options(64)).unwrap();
    let mut expected = 0u64;
    for len in [10usize, 64, 200, 0, 1] {
        expected += w.write(&text(len)) as u64;
        assert_eq!(w.size(), expected);
        let snapshot = w.get_ref().get_ref().clone();
        let header = read_header(&mut Cursor::new(snapshot)).unwrap();
        assert_eq!(header.total_size, expected);
        // Appending resumes at the end, not at the header.
        assert_eq!(w.get_ref().position(), w.get_ref().get_ref().len() as u64);
    }
}

#[test]
fn total_size_survives_reopen_after_each_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.rzip");
    let payload = noise(1000, 4);

    let mut w = RzipWriter::create(&path, small_options(128)).unwrap();
    let mut written = 0usize;
    for piece in payload.chunks(300) {
        assert_eq!(w.try_write(piece).unwrap(), piece.len());
        written += piece.len();

        // Simulate a crash right after this call: the writer is never
        // closed, a fresh reader sees a consistent prefix.
        let mut r = RzipReader::open(&path).unwrap();
        assert_eq!(r.size(), written as u64);
        let mut buf = vec![0u8; written];
        assert_eq!(r.try_read(&mut buf).unwrap(), written);
        assert_eq!(buf, &payload[..written]);
    }
}

#[test]
fn create_truncates_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.rzip");
    fs::write(&path, vec![0xaa; 4096]).unwrap();

    let w = RzipWriter::create(&path, small_options(64)).unwrap();
    drop(w);
    assert_eq!(fs::metadata(&path).unwrap().len(), HEADER_BYTES);
    assert_eq!(RzipReader::open(&path).unwrap().size(), 0);
}

#[test]
fn sync_to_disk_keeps_writer_usable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.rzip");
    let mut w = RzipWriter::create(&path, WriterOptions::default()).unwrap();
    w.write(b"abc");
    w.sync_to_disk().unwrap();
    w.write(b"def");
    drop(w);

    let mut r = RzipReader::open(&path).unwrap();
    let mut buf = [0u8; 6];
    assert_eq!(r.read(&mut buf), 6);
    assert_eq!(&buf, b"abcdef");
}

// -------------------- Options & failures --------------------

#[test]
fn invalid_chunk_size_is_rejected() {
    assert!(matches!(
        RzipWriter::new(Cursor::new(Vec::new()), small_options(0)),
        Err(RzipError::InvalidChunkSize(0))
    ));
    assert!(matches!(
        RzipWriter::new(Cursor::new(Vec::new()), small_options(MAX_CHUNK_SIZE + 1)),
        Err(RzipError::InvalidChunkSize(_))
    ));
}

#[test]
fn store_level_round_trips() {
    let payload = text(1000);
    let mut w = RzipWriter::new(
        Cursor::new(Vec::new()),
        WriterOptions {
            chunk_size: 256,
            level: 0,
        },
    )
    .unwrap();
    assert_eq!(w.write(&payload), 1000);
    let bytes = w.into_inner().into_inner();
    // Stored blocks never shrink the data.
    assert!(records(&bytes).iter().all(|rec| rec.compressed_len >= 232));

    let mut r = reader(bytes);
    let mut buf = vec![0u8; 1000];
    assert_eq!(r.read(&mut buf), 1000);
    assert_eq!(buf, payload);
}

#[test]
fn header_write_failure_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ro.rzip");
    fs::write(&path, b"").unwrap();
    let read_only = File::open(&path).unwrap();
    assert!(matches!(
        RzipWriter::new(read_only, WriterOptions::default()),
        Err(RzipError::Io(_))
    ));
}

/// In-memory stream that refuses to grow past `cap` bytes.
struct CappedCursor {
    inner: Cursor<Vec<u8>>,
    cap: u64,
}

impl Write for CappedCursor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.inner.position() + buf.len() as u64 > self.cap {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for CappedCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[test]
fn failed_append_returns_partial_count_and_patches_header() {
    let payload = noise(300, 6);
    let first_len = records(&container(100, &[&payload[..100]]))[0].compressed_len as u64;
    // Room for the header, the first record and the second length prefix.
    let cap = HEADER_BYTES + 4 + first_len + 4 + 3;

    let sink = CappedCursor {
        inner: Cursor::new(Vec::new()),
        cap,
    };
    let mut w = RzipWriter::new(sink, small_options(100)).unwrap();
    assert_eq!(w.write(&payload), 100);
    assert_eq!(w.size(), 100);
    assert_eq!(w.chunks_written(), 1);
    assert!(matches!(w.try_write(&payload), Err(RzipError::Io(_))));

    let bytes = w.into_inner().inner.into_inner();
    let mut r = reader(bytes);
    assert_eq!(r.size(), 100);
    let mut buf = vec![0u8; 300];
    assert_eq!(r.read(&mut buf), 100);
    assert_eq!(&buf[..100], &payload[..100]);
}
