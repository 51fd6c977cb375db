//! The per-vertex state table.
//!
//! A dense array of 6-bit entries indexed by MPHF bucket, packed over
//! 64-bit atomic words (an entry may straddle a word boundary), plus a
//! sparse spin-lock array providing entry-level read-modify-write
//! atomicity. Word-level updates are CAS loops so that two entries sharing
//! a word but guarded by different locks never corrupt each other.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, bail};

use super::state::State;
use crate::sync::SparseLock;

/// Bits per table entry.
const BITS_PER_ENTRY: usize = 6;
/// Number of sparse locks over the bucket range.
const LOCK_COUNT: usize = 1 << 16;

/// Concurrent, bit-packed table of one [`State`] per canonical vertex.
pub struct StateTable {
    len: usize,
    words: Vec<AtomicU64>,
    locks: SparseLock,
}

impl StateTable {
    /// A table of `len` entries, all initialised to the empty state.
    pub fn new(len: usize) -> Self {
        let mut words = vec![0u64; word_count(len)];
        for bucket in 0..len {
            set_in_words(&mut words, bucket, State::empty().code());
        }
        Self {
            len,
            words: words.into_iter().map(AtomicU64::new).collect(),
            locks: SparseLock::new(len.max(1), LOCK_COUNT),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw 6-bit entry load; callers needing read-modify-write atomicity
    /// must hold the bucket's lock.
    #[inline]
    fn get_raw(&self, bucket: usize) -> u8 {
        debug_assert!(bucket < self.len);
        let bit = bucket * BITS_PER_ENTRY;
        let (w, off) = (bit >> 6, bit & 63);
        let lo = self.words[w].load(Ordering::Acquire);
        if off <= 64 - BITS_PER_ENTRY {
            ((lo >> off) & 0x3F) as u8
        } else {
            let hi = self.words[w + 1].load(Ordering::Acquire);
            (((lo >> off) | (hi << (64 - off))) & 0x3F) as u8
        }
    }

    /// Raw 6-bit entry store, CASing each affected word so neighbouring
    /// entries under other locks stay intact.
    #[inline]
    fn set_raw(&self, bucket: usize, code: u8) {
        debug_assert!(bucket < self.len);
        let bit = bucket * BITS_PER_ENTRY;
        let (w, off) = (bit >> 6, bit & 63);
        if off <= 64 - BITS_PER_ENTRY {
            let mask = 0x3Fu64 << off;
            let val = (code as u64) << off;
            let _ = self.words[w].fetch_update(Ordering::AcqRel, Ordering::Acquire, |x| {
                Some((x & !mask) | val)
            });
        } else {
            let lo_bits = 64 - off;
            let lo_mask = u64::MAX << off;
            let lo_val = (code as u64) << off;
            let _ = self.words[w].fetch_update(Ordering::AcqRel, Ordering::Acquire, |x| {
                Some((x & !lo_mask) | lo_val)
            });
            let hi_mask = (1u64 << (BITS_PER_ENTRY - lo_bits)) - 1;
            let hi_val = (code as u64) >> lo_bits;
            let _ = self.words[w + 1].fetch_update(Ordering::AcqRel, Ordering::Acquire, |x| {
                Some((x & !hi_mask) | hi_val)
            });
        }
    }

    /// A snapshot of the state at `bucket`.
    pub fn read(&self, bucket: usize) -> State {
        let _guard = self.locks.guard(bucket);
        State::from_code(self.get_raw(bucket))
    }

    /// Write `new` at `bucket` iff the current state equals `expected`.
    /// This is the only mutator the edge consumer uses.
    pub fn try_update(&self, bucket: usize, expected: State, new: State) -> bool {
        let _guard = self.locks.guard(bucket);
        if self.get_raw(bucket) != expected.code() {
            return false;
        }
        self.set_raw(bucket, new.code());
        true
    }

    /// Unconditionally write `state` at `bucket`.
    pub fn update_unchecked(&self, bucket: usize, state: State) {
        let _guard = self.locks.guard(bucket);
        self.set_raw(bucket, state.code());
    }

    /// Transform the state at `bucket` through `f`.
    pub fn update_with(&self, bucket: usize, f: impl FnOnce(State) -> State) {
        let _guard = self.locks.guard(bucket);
        let cur = State::from_code(self.get_raw(bucket));
        self.set_raw(bucket, f(cur).code());
    }

    /// Output-mark the state at `bucket` iff it has not been marked yet.
    /// Returns whether this call won the claim.
    pub fn mark_if_unmarked(&self, bucket: usize) -> bool {
        let _guard = self.locks.guard(bucket);
        let cur = State::from_code(self.get_raw(bucket));
        if cur.is_outputted() {
            return false;
        }
        self.set_raw(bucket, cur.mark_outputted().code());
        true
    }

    /// Tied two-bucket update: both writes happen iff both expectations
    /// hold. Locks are taken in ascending lock order (and only once when
    /// the two buckets share a lock).
    pub fn try_update_pair(
        &self,
        b1: usize,
        expected1: State,
        new1: State,
        b2: usize,
        expected2: State,
        new2: State,
    ) -> bool {
        debug_assert_ne!(b1, b2);
        let _guards = self.locks.guard_pair(b1, b2);
        if self.get_raw(b1) != expected1.code() || self.get_raw(b2) != expected2.code() {
            return false;
        }
        self.set_raw(b1, new1.code());
        self.set_raw(b2, new2.code());
        true
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Serialise the packed entries: an 8-byte little-endian entry count,
    /// then `ceil(len * 6 / 8)` bytes of the packed bit stream.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create state file {}", path.display()))?;
        let mut out = BufWriter::new(file);
        out.write_all(&(self.len as u64).to_le_bytes())?;

        let mut remaining = blob_bytes(self.len);
        for word in &self.words {
            let bytes = word.load(Ordering::Acquire).to_le_bytes();
            let take = remaining.min(8);
            out.write_all(&bytes[..take])?;
            remaining -= take;
            if remaining == 0 {
                break;
            }
        }
        out.flush()
            .with_context(|| format!("failed to write state file {}", path.display()))?;
        Ok(())
    }

    /// Load a table previously written with [`StateTable::save`].
    pub fn load(path: &Path, expected_len: usize) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open state file {}", path.display()))?;
        let mut input = BufReader::new(file);

        let mut header = [0u8; 8];
        input.read_exact(&mut header).context("truncated state file header")?;
        let len = u64::from_le_bytes(header) as usize;
        if len != expected_len {
            bail!(
                "state file {} holds {} entries, expected {}",
                path.display(),
                len,
                expected_len
            );
        }

        let mut blob = vec![0u8; blob_bytes(len)];
        input
            .read_exact(&mut blob)
            .with_context(|| format!("truncated state blob in {}", path.display()))?;

        let mut words = vec![0u64; word_count(len)];
        for (i, chunk) in blob.chunks(8).enumerate() {
            let mut bytes = [0u8; 8];
            bytes[..chunk.len()].copy_from_slice(chunk);
            words[i] = u64::from_le_bytes(bytes);
        }

        Ok(Self {
            len,
            words: words.into_iter().map(AtomicU64::new).collect(),
            locks: SparseLock::new(len.max(1), LOCK_COUNT),
        })
    }
}

fn word_count(len: usize) -> usize {
    (len * BITS_PER_ENTRY).div_ceil(64).max(1)
}

fn blob_bytes(len: usize) -> usize {
    (len * BITS_PER_ENTRY).div_ceil(8)
}

fn set_in_words(words: &mut [u64], bucket: usize, code: u8) {
    let bit = bucket * BITS_PER_ENTRY;
    let (w, off) = (bit >> 6, bit & 63);
    if off <= 64 - BITS_PER_ENTRY {
        words[w] = (words[w] & !(0x3Fu64 << off)) | ((code as u64) << off);
    } else {
        let lo_bits = 64 - off;
        words[w] = (words[w] & !(u64::MAX << off)) | ((code as u64) << off);
        let hi_mask = (1u64 << (BITS_PER_ENTRY - lo_bits)) - 1;
        words[w + 1] = (words[w + 1] & !hi_mask) | ((code as u64) >> lo_bits);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
