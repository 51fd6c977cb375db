//! On-disk k-mer database: a `<prefix>.pre` metadata file and a
//! `<prefix>.suf` record file.
//!
//! Records are fixed width (`ceil(k/4)` bytes), 2-bit packed, big-endian at
//! the byte level with the first base in the most-significant bits and zero
//! padding in the low bits of the final byte. The reader hands out whole
//! records in slabs; parsing into the packed little-endian k-mer layout is
//! [`Kmer::from_packed_record`]'s job.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::kmer::Kmer;

/// Magic bytes of the `.pre` metadata file.
const PRE_MAGIC: &[u8; 8] = b"UTKDB01\0";

/// File-name suffix of the metadata file.
pub const PRE_EXT: &str = "pre";
/// File-name suffix of the record file.
pub const SUF_EXT: &str = "suf";

fn pre_path(prefix: &Path) -> PathBuf {
    prefix.with_extension(PRE_EXT)
}

fn suf_path(prefix: &Path) -> PathBuf {
    prefix.with_extension(SUF_EXT)
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Sequential reader over a k-mer database with path prefix `<prefix>`.
pub struct KmerDbReader<const K: usize> {
    suf: File,
    kmer_count: u64,
    records_read: u64,
}

impl<const K: usize> KmerDbReader<K> {
    /// Open the database, validating the metadata against `K`.
    pub fn open(prefix: &Path) -> Result<Self> {
        let pre = pre_path(prefix);
        let mut meta = File::open(&pre)
            .with_context(|| format!("failed to open k-mer database {}", pre.display()))?;

        let mut header = [0u8; 18];
        meta.read_exact(&mut header)
            .with_context(|| format!("truncated database header in {}", pre.display()))?;
        if &header[..8] != PRE_MAGIC {
            bail!("{} is not a k-mer database (bad magic)", pre.display());
        }
        let k = u16::from_le_bytes([header[8], header[9]]) as usize;
        if k != K {
            bail!("database {} holds {}-mers, expected {}-mers", pre.display(), k, K);
        }
        let kmer_count = u64::from_le_bytes(header[10..18].try_into().unwrap());

        let suf = suf_path(prefix);
        let suf_file = File::open(&suf)
            .with_context(|| format!("failed to open k-mer database {}", suf.display()))?;
        let expected = kmer_count * Kmer::<K>::RECORD_BYTES as u64;
        let actual = suf_file
            .metadata()
            .with_context(|| format!("failed to stat {}", suf.display()))?
            .len();
        if actual != expected {
            bail!(
                "record file {} is {} bytes, expected {} ({} records of {} bytes)",
                suf.display(),
                actual,
                expected,
                kmer_count,
                Kmer::<K>::RECORD_BYTES
            );
        }

        Ok(Self {
            suf: suf_file,
            kmer_count,
            records_read: 0,
        })
    }

    /// Number of k-mers in the database.
    pub fn kmer_count(&self) -> u64 {
        self.kmer_count
    }

    /// Bytes per record.
    pub fn record_len(&self) -> usize {
        Kmer::<K>::RECORD_BYTES
    }

    /// Fill `buf` with up to `max_bytes` worth of whole records; returns
    /// the number of records read (0 at end of database).
    pub fn read_slab(&mut self, buf: &mut Vec<u8>, max_bytes: usize) -> Result<usize> {
        let record_len = self.record_len();
        let remaining = (self.kmer_count - self.records_read) as usize;
        let records = remaining.min((max_bytes / record_len).max(1));
        if records == 0 {
            buf.clear();
            return Ok(0);
        }

        buf.resize(records * record_len, 0);
        self.suf
            .read_exact(buf)
            .context("failed to read k-mer records")?;
        self.records_read += records as u64;
        Ok(records)
    }

    /// Read the whole database into memory as parsed k-mers.
    pub fn read_all(mut self) -> Result<Vec<Kmer<K>>> {
        let record_len = self.record_len();
        let mut kmers = Vec::with_capacity(self.kmer_count as usize);
        let mut buf = Vec::new();
        loop {
            let records = self.read_slab(&mut buf, 1 << 20)?;
            if records == 0 {
                break;
            }
            for rec in buf.chunks_exact(record_len).take(records) {
                kmers.push(Kmer::from_packed_record(rec));
            }
        }
        Ok(kmers)
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Write a k-mer set as a database at path prefix `<prefix>`.
pub fn write_database<const K: usize>(
    prefix: &Path,
    kmers: impl ExactSizeIterator<Item = Kmer<K>>,
) -> Result<()> {
    if let Some(parent) = prefix.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    let pre = pre_path(prefix);
    let mut meta = BufWriter::new(
        File::create(&pre).with_context(|| format!("failed to create {}", pre.display()))?,
    );
    meta.write_all(PRE_MAGIC)?;
    meta.write_all(&(K as u16).to_le_bytes())?;
    meta.write_all(&(kmers.len() as u64).to_le_bytes())?;
    meta.flush()
        .with_context(|| format!("failed to write {}", pre.display()))?;

    let suf = suf_path(prefix);
    let mut out = BufWriter::new(
        File::create(&suf).with_context(|| format!("failed to create {}", suf.display()))?,
    );
    let mut rec = Vec::with_capacity(Kmer::<K>::RECORD_BYTES);
    for kmer in kmers {
        rec.clear();
        kmer.append_packed_record(&mut rec);
        out.write_all(&rec)?;
    }
    out.flush()
        .with_context(|| format!("failed to write {}", suf.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
