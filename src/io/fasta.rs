//! FASTA record emission: the shared sink, and the per-worker character
//! buffer that batches records before taking the sink's lock.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};

/// Soft capacity of a worker's output buffer before it flushes: 100 KB.
pub const BUFFER_CAPACITY: usize = 100 * 1024;

// ---------------------------------------------------------------------------
// RecordWriter / FastaSink
// ---------------------------------------------------------------------------

/// A sink for whole sequence records. Implementations serialise concurrent
/// writes; the content of one `write_record` call never interleaves with
/// another.
pub trait RecordWriter: Sync {
    fn write_record(&self, bytes: &[u8]) -> io::Result<()>;
}

/// File-backed sink behind a mutex.
pub struct FastaSink {
    out: Mutex<BufWriter<File>>,
}

impl FastaSink {
    /// Create (truncate) the output file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create output file {}", path.display()))?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Flush and close the sink.
    pub fn finish(self) -> Result<()> {
        let mut out = self.out.into_inner().unwrap();
        out.flush().context("failed to flush output file")?;
        Ok(())
    }
}

impl RecordWriter for FastaSink {
    fn write_record(&self, bytes: &[u8]) -> io::Result<()> {
        let mut out = self.out.lock().unwrap();
        out.write_all(bytes)
    }
}

// ---------------------------------------------------------------------------
// CharacterBuffer
// ---------------------------------------------------------------------------

/// A worker-local byte buffer that flushes to the shared sink when it would
/// overflow its soft capacity. A record larger than the capacity itself
/// forces a flush and then grows the buffer to fit.
pub struct CharacterBuffer<'a, S: RecordWriter + ?Sized> {
    buf: Vec<u8>,
    sink: &'a S,
}

impl<'a, S: RecordWriter + ?Sized> CharacterBuffer<'a, S> {
    pub fn new(sink: &'a S) -> Self {
        Self {
            buf: Vec::with_capacity(BUFFER_CAPACITY),
            sink,
        }
    }

    /// Make room for `append_size` more bytes, flushing first if needed.
    fn ensure_space(&mut self, append_size: usize) -> io::Result<()> {
        if self.buf.len() + append_size >= BUFFER_CAPACITY {
            self.flush()?;
            if append_size >= BUFFER_CAPACITY {
                self.buf.reserve(append_size);
            }
        }
        Ok(())
    }

    /// Append a linear FASTA record: `>id`, then `seq`, then the suffix of
    /// `glue` past its first `overlap` bytes.
    ///
    /// The two sequence pieces overlap in `overlap` bases at the join; a
    /// maximal unitig is stitched from its two constituent walks this way,
    /// with the seed vertex written once.
    pub fn append_fasta(
        &mut self,
        id: u64,
        seq: &[u8],
        glue: &[u8],
        overlap: usize,
    ) -> io::Result<()> {
        let body_len = seq.len() + glue.len() - overlap;
        self.ensure_space(header_len(id) + 1 + body_len + 1)?;

        self.append_header(id);
        self.buf.extend_from_slice(seq);
        self.buf.extend_from_slice(&glue[overlap..]);
        self.buf.push(b'\n');
        Ok(())
    }

    /// Append a cyclic FASTA record, right-rotating `seq` so the character
    /// at index `pivot` lands at index 0.
    ///
    /// `seq` is the literal walk of a cycle of `seq.len() - (k - 1)`
    /// vertices: its final `k - 1` characters wrap around to its first
    /// ones, so the rotation re-reads the wrap region instead of splitting
    /// mid-vertex.
    pub fn append_fasta_cycle(
        &mut self,
        id: u64,
        seq: &[u8],
        k: usize,
        pivot: usize,
    ) -> io::Result<()> {
        debug_assert!(pivot + k <= seq.len() + 1);
        self.ensure_space(header_len(id) + 1 + seq.len() + 1)?;

        self.append_header(id);
        self.buf.extend_from_slice(&seq[pivot..]);
        self.buf.extend_from_slice(&seq[k - 1..pivot + k - 1]);
        self.buf.push(b'\n');
        Ok(())
    }

    fn append_header(&mut self, id: u64) {
        self.buf.push(b'>');
        let mut tmp = [0u8; 20];
        let mut n = id;
        let mut i = tmp.len();
        loop {
            i -= 1;
            tmp[i] = b'0' + (n % 10) as u8;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        self.buf.extend_from_slice(&tmp[i..]);
        self.buf.push(b'\n');
    }

    /// Flush the buffered records to the sink.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.sink.write_record(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl<S: RecordWriter + ?Sized> Drop for CharacterBuffer<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!("failed to flush output buffer: {e}");
        }
    }
}

fn header_len(id: u64) -> usize {
    // '>' plus the decimal digit count.
    let digits = if id == 0 { 1 } else { (id.ilog10() + 1) as usize };
    1 + digits
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory sink for tests.
    #[derive(Default)]
    struct VecSink {
        data: Mutex<Vec<u8>>,
    }

    impl VecSink {
        fn contents(&self) -> Vec<u8> {
            self.data.lock().unwrap().clone()
        }
    }

    impl RecordWriter for VecSink {
        fn write_record(&self, bytes: &[u8]) -> io::Result<()> {
            self.data.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }
    }

    #[test]
    fn test_linear_record_with_glue() {
        let sink = VecSink::default();
        let mut buf = CharacterBuffer::new(&sink);
        // Two pieces overlapping in 3 bases.
        buf.append_fasta(7, b"TACG", b"ACGTT", 3).unwrap();
        buf.flush().unwrap();
        assert_eq!(sink.contents(), b">7\nTACGTT\n");
    }

    #[test]
    fn test_cycle_rotation() {
        let sink = VecSink::default();
        let mut buf = CharacterBuffer::new(&sink);
        // A 3-vertex cycle at k=3: label ACGAC, rotated to vertex 1 (CGA).
        buf.append_fasta_cycle(1, b"ACGAC", 3, 1).unwrap();
        buf.flush().unwrap();
        assert_eq!(sink.contents(), b">1\nCGACG\n");
    }

    #[test]
    fn test_cycle_rotation_identity_pivot() {
        let sink = VecSink::default();
        let mut buf = CharacterBuffer::new(&sink);
        buf.append_fasta_cycle(2, b"ACGAC", 3, 0).unwrap();
        buf.flush().unwrap();
        assert_eq!(sink.contents(), b">2\nACGAC\n");
    }

    #[test]
    fn test_flushes_at_capacity() {
        let sink = VecSink::default();
        let mut buf = CharacterBuffer::new(&sink);
        let seq = vec![b'A'; BUFFER_CAPACITY / 2];
        buf.append_fasta(1, &seq, b"", 0).unwrap();
        assert!(sink.contents().is_empty());
        // The second record would overflow, forcing the first one out.
        buf.append_fasta(2, &seq, b"", 0).unwrap();
        assert!(!sink.contents().is_empty());
    }

    #[test]
    fn test_oversized_record_is_kept_whole() {
        let sink = VecSink::default();
        let mut buf = CharacterBuffer::new(&sink);
        let seq = vec![b'C'; BUFFER_CAPACITY * 2];
        buf.append_fasta(9, &seq, b"", 0).unwrap();
        buf.flush().unwrap();
        let contents = sink.contents();
        assert_eq!(contents.len(), 3 + seq.len() + 1);
        assert!(contents.starts_with(b">9\n"));
    }

    #[test]
    fn test_drop_flushes() {
        let sink = VecSink::default();
        {
            let mut buf = CharacterBuffer::new(&sink);
            buf.append_fasta(3, b"ACG", b"", 0).unwrap();
        }
        assert_eq!(sink.contents(), b">3\nACG\n");
    }
}
