use anyhow::{bail, Context, Result};
use config::RzipConfig;
use crc32fast::Hasher as Crc32;
use log::{info, warn};
use rzip::{read_full, Header, OpenMode, RecordIter, RzipFile, RzipReader};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Copy buffer for decoding; independent of the container's chunk size.
const IO_BUFFER_SIZE: usize = 64 * 1024;

pub struct PackStats {
    pub raw_bytes: u64,
    pub packed_bytes: u64,
}

pub struct ContainerInfo {
    pub header: Header,
    pub records: u64,
    pub empty_records: u64,
    pub compressed_bytes: u64,
    /// Set when the record walk hit a truncated or impossible record.
    pub damage: Option<String>,
}

pub struct VerifyReport {
    pub header: Header,
    pub bytes: u64,
    pub chunks: u64,
    pub crc32: u32,
}

/// Streams `input` into a new container at `output`, one chunk per write
/// call so the header is patched as the file grows.
pub fn pack(cfg: &RzipConfig, input: &Path, output: &Path) -> Result<PackStats> {
    let options = cfg.writer_options()?;
    let mut src =
        File::open(input).with_context(|| format!("opening {}", input.display()))?;

    let mut dst = RzipFile::with_options(options, cfg.sync);
    dst.open(output, OpenMode::Write)
        .with_context(|| format!("creating {}", output.display()))?;

    let mut buf = vec![0u8; options.chunk_size as usize];
    loop {
        let n = read_full(&mut src, &mut buf)?;
        if n == 0 {
            break;
        }
        dst.try_write(&buf[..n])
            .with_context(|| format!("writing {}", output.display()))?;
        if n < buf.len() {
            break;
        }
    }
    let raw_bytes = dst.size();
    dst.close();

    let packed_bytes = std::fs::metadata(output)?.len();
    info!(
        "packed {} -> {} ({} -> {} bytes)",
        input.display(),
        output.display(),
        raw_bytes,
        packed_bytes
    );
    Ok(PackStats {
        raw_bytes,
        packed_bytes,
    })
}

/// Copies up to `limit` payload bytes from `src` to `dst`. Best-effort
/// unless `cfg.strict` is set.
fn copy_payload<W: Write>(
    cfg: &RzipConfig,
    src: &mut RzipFile,
    dst: &mut W,
    limit: u64,
) -> Result<u64> {
    let mut buf = vec![0u8; IO_BUFFER_SIZE];
    let mut copied = 0u64;
    while copied < limit {
        let want = (limit - copied).min(buf.len() as u64) as usize;
        let n = if cfg.strict {
            src.try_read(&mut buf[..want])?
        } else {
            src.read(&mut buf[..want])
        };
        dst.write_all(&buf[..n])?;
        copied += n as u64;
        if n < want {
            break;
        }
    }
    Ok(copied)
}

/// Decodes `input` into `output`. A damaged container still produces its
/// valid prefix unless strict mode is on.
pub fn unpack(cfg: &RzipConfig, input: &Path, output: &Path) -> Result<u64> {
    let mut src = RzipFile::new();
    src.open(input, OpenMode::Read)
        .with_context(|| format!("opening {}", input.display()))?;
    let expected = src.size();

    let mut dst = BufWriter::new(
        File::create(output).with_context(|| format!("creating {}", output.display()))?,
    );
    let written = copy_payload(cfg, &mut src, &mut dst, u64::MAX)
        .with_context(|| format!("decoding {}", input.display()))?;
    dst.flush()?;

    if written != expected {
        if cfg.strict {
            bail!(
                "{}: payload has {} bytes, header says {}",
                input.display(),
                written,
                expected
            );
        }
        warn!(
            "{}: recovered {} of {} bytes",
            input.display(),
            written,
            expected
        );
    }
    Ok(written)
}

/// Walks the records of `input` without decompressing them.
pub fn info(input: &Path) -> Result<ContainerInfo> {
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let (header, records) = RecordIter::new(BufReader::new(file))
        .with_context(|| format!("reading header of {}", input.display()))?;

    let mut info = ContainerInfo {
        header,
        records: 0,
        empty_records: 0,
        compressed_bytes: 0,
        damage: None,
    };
    for rec in records {
        match rec {
            Ok(rec) => {
                info.records += 1;
                if rec.compressed_len == 0 {
                    info.empty_records += 1;
                }
                info.compressed_bytes += u64::from(rec.compressed_len);
            }
            Err(e) => info.damage = Some(e.to_string()),
        }
    }
    Ok(info)
}

/// Writes `len` bytes (or the rest of the payload) starting at `skip`.
pub fn cat<W: Write>(
    cfg: &RzipConfig,
    input: &Path,
    skip: u64,
    len: Option<u64>,
    out: &mut W,
) -> Result<u64> {
    let mut src = RzipFile::new();
    src.open(input, OpenMode::Read)
        .with_context(|| format!("opening {}", input.display()))?;

    let mut skipped = 0u64;
    while skipped < skip {
        let want = (skip - skipped).min(usize::MAX as u64) as usize;
        let n = if cfg.strict {
            src.try_skip(want)?
        } else {
            src.skip(want)
        };
        skipped += n as u64;
        if n < want {
            bail!(
                "cannot skip to offset {}: payload ends at {}",
                skip,
                skipped
            );
        }
    }
    copy_payload(cfg, &mut src, out, len.unwrap_or(u64::MAX))
}

/// Strictly decodes `input`, checks the payload length against the header
/// and, optionally, its CRC32 against a raw file.
pub fn verify(input: &Path, against: Option<&Path>) -> Result<VerifyReport> {
    let mut reader =
        RzipReader::open(input).with_context(|| format!("opening {}", input.display()))?;
    let header = *reader.header();

    let mut hasher = Crc32::new();
    let mut buf = vec![0u8; IO_BUFFER_SIZE];
    let mut bytes = 0u64;
    loop {
        let n = reader
            .try_read(&mut buf)
            .with_context(|| format!("{}: damaged after {} bytes", input.display(), bytes))?;
        hasher.update(&buf[..n]);
        bytes += n as u64;
        if n < buf.len() {
            break;
        }
    }
    if bytes != header.total_size {
        bail!(
            "{}: payload has {} bytes, header says {}",
            input.display(),
            bytes,
            header.total_size
        );
    }
    let crc32 = hasher.finalize();

    if let Some(raw) = against {
        let mut f = File::open(raw).with_context(|| format!("opening {}", raw.display()))?;
        let mut raw_hasher = Crc32::new();
        let mut raw_bytes = 0u64;
        loop {
            let n = read_full(&mut f, &mut buf)?;
            raw_hasher.update(&buf[..n]);
            raw_bytes += n as u64;
            if n < buf.len() {
                break;
            }
        }
        let raw_crc = raw_hasher.finalize();
        if raw_bytes != bytes || raw_crc != crc32 {
            bail!(
                "payload differs from {}: {} bytes crc32={:08x}, expected {} bytes crc32={:08x}",
                raw.display(),
                bytes,
                crc32,
                raw_bytes,
                raw_crc
            );
        }
    }

    Ok(VerifyReport {
        header,
        bytes,
        chunks: reader.chunks_loaded(),
        crc32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn small_chunks() -> RzipConfig {
        RzipConfig {
            chunk_size: 1024,
            ..RzipConfig::default()
        }
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn pack_then_unpack_restores_file() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw.bin");
        let packed = dir.path().join("raw.rzip");
        let restored = dir.path().join("restored.bin");
        fs::write(&raw, sample(10_000)).unwrap();

        let stats = pack(&small_chunks(), &raw, &packed).unwrap();
        assert_eq!(stats.raw_bytes, 10_000);
        assert!(stats.packed_bytes > 0);

        assert_eq!(unpack(&small_chunks(), &packed, &restored).unwrap(), 10_000);
        assert_eq!(fs::read(&restored).unwrap(), fs::read(&raw).unwrap());
    }

    #[test]
    fn info_counts_records() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw.bin");
        let packed = dir.path().join("raw.rzip");
        fs::write(&raw, sample(2500)).unwrap();
        pack(&small_chunks(), &raw, &packed).unwrap();

        let info = info(&packed).unwrap();
        assert_eq!(info.header.max_chunk_size, 1024);
        assert_eq!(info.header.total_size, 2500);
        assert_eq!(info.records, 3);
        assert_eq!(info.empty_records, 0);
        assert!(info.damage.is_none());
    }

    #[test]
    fn cat_writes_requested_slice() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw.bin");
        let packed = dir.path().join("raw.rzip");
        let data = sample(5000);
        fs::write(&raw, &data).unwrap();
        pack(&small_chunks(), &raw, &packed).unwrap();

        let mut out = Vec::new();
        assert_eq!(
            cat(&small_chunks(), &packed, 1500, Some(2000), &mut out).unwrap(),
            2000
        );
        assert_eq!(out, &data[1500..3500]);

        assert!(cat(&small_chunks(), &packed, 6000, None, &mut Vec::new()).is_err());
    }

    #[test]
    fn verify_detects_truncation_and_mismatch() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw.bin");
        let other = dir.path().join("other.bin");
        let packed = dir.path().join("raw.rzip");
        fs::write(&raw, sample(3000)).unwrap();
        fs::write(&other, sample(2999)).unwrap();
        pack(&small_chunks(), &raw, &packed).unwrap();

        let report = verify(&packed, Some(&raw)).unwrap();
        assert_eq!(report.header.max_chunk_size, 1024);
        assert!(!report.header.legacy);
        assert_eq!(report.bytes, 3000);
        assert_eq!(report.chunks, 3);
        assert!(verify(&packed, Some(&other)).is_err());

        let mut bytes = fs::read(&packed).unwrap();
        bytes.truncate(bytes.len() - 10);
        fs::write(&packed, &bytes).unwrap();
        assert!(verify(&packed, None).is_err());
    }

    #[test]
    fn verify_reports_legacy_header() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw.bin");
        let packed = dir.path().join("raw.rzip");
        let legacy = dir.path().join("legacy.rzip");
        fs::write(&raw, sample(1500)).unwrap();
        pack(&small_chunks(), &raw, &packed).unwrap();

        // Drop the upper half of the 64-bit total to get the 16-byte header.
        let modern = fs::read(&packed).unwrap();
        let mut bytes = modern[..16].to_vec();
        bytes.extend_from_slice(&modern[20..]);
        fs::write(&legacy, &bytes).unwrap();

        let report = verify(&legacy, Some(&raw)).unwrap();
        assert!(report.header.legacy);
        assert_eq!(report.header.total_size, 1500);
        assert_eq!(report.bytes, 1500);
    }

    #[test]
    fn unpack_recovers_prefix_unless_strict() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw.bin");
        let packed = dir.path().join("raw.rzip");
        let out = dir.path().join("out.bin");
        fs::write(&raw, sample(3000)).unwrap();
        pack(&small_chunks(), &raw, &packed).unwrap();

        let mut bytes = fs::read(&packed).unwrap();
        bytes.truncate(bytes.len() - 10);
        fs::write(&packed, &bytes).unwrap();

        assert_eq!(unpack(&small_chunks(), &packed, &out).unwrap(), 2048);
        assert_eq!(fs::read(&out).unwrap(), &sample(3000)[..2048]);

        let strict = RzipConfig {
            strict: true,
            ..small_chunks()
        };
        assert!(unpack(&strict, &packed, &out).is_err());
    }
}
