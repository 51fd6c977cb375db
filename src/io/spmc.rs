//! Single-producer, multi-consumer streaming of database record slabs.
//!
//! One producer thread reads raw record slabs off disk and deals them into
//! per-consumer slots; each slot carries an atomic status word cycling
//! `pending -> available -> pending`, flipped to `no_more` once the
//! database is drained. Both sides busy-wait with bounded spin; slab
//! hand-off swaps buffers so no allocation happens in steady state.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use anyhow::Result;

use super::kmer_db::KmerDbReader;
use crate::kmer::Kmer;

/// Slab capacity handed to each consumer per refill: 16 MB.
pub const SLAB_BYTES: usize = 1 << 24;

/// Consumer-slot status.
const PENDING: u8 = 0;
const AVAILABLE: u8 = 1;
const NO_MORE: u8 = 2;

/// A slab of raw database records.
#[derive(Default)]
pub struct Slab {
    data: Vec<u8>,
    records: usize,
}

impl Slab {
    /// Iterate the raw records of the slab.
    pub fn records(&self, record_len: usize) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(record_len).take(self.records)
    }

    /// Number of records in the slab.
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

struct Slot {
    status: AtomicU8,
    slab: Mutex<Slab>,
}

/// The producer/consumer exchange for one streaming phase.
pub struct SlabExchange {
    slots: Vec<Slot>,
    record_len: usize,
}

impl SlabExchange {
    /// An exchange serving `consumers` worker threads.
    pub fn new(consumers: usize, record_len: usize) -> Self {
        assert!(consumers > 0);
        let slots = (0..consumers)
            .map(|_| Slot {
                status: AtomicU8::new(PENDING),
                slab: Mutex::new(Slab::default()),
            })
            .collect();
        Self { slots, record_len }
    }

    /// Bytes per record in the streamed slabs.
    pub fn record_len(&self) -> usize {
        self.record_len
    }

    /// Producer loop: reads the database to exhaustion, then signals every
    /// consumer that no more slabs will come. Consumers are released even
    /// when the read fails mid-stream.
    pub fn produce<const K: usize>(&self, reader: &mut KmerDbReader<K>) -> Result<()> {
        let result = self.fill_loop(reader);
        self.close();
        result
    }

    fn fill_loop<const K: usize>(&self, reader: &mut KmerDbReader<K>) -> Result<()> {
        let mut staging = Slab::default();
        let mut next = 0usize;
        loop {
            let records = reader.read_slab(&mut staging.data, SLAB_BYTES)?;
            if records == 0 {
                return Ok(());
            }
            staging.records = records;

            // Deal the slab to the next pending consumer, round-robin.
            let slot = loop {
                let id = next;
                next = (next + 1) % self.slots.len();
                if self.slots[id].status.load(Ordering::Acquire) == PENDING {
                    break &self.slots[id];
                }
                std::hint::spin_loop();
            };

            {
                let mut slab = slot.slab.lock().unwrap();
                std::mem::swap(&mut *slab, &mut staging);
            }
            slot.status.store(AVAILABLE, Ordering::Release);
        }
    }

    /// Wait for every consumer to drain its slab, then mark end-of-stream.
    fn close(&self) {
        for slot in &self.slots {
            while slot.status.load(Ordering::Acquire) != PENDING {
                std::hint::spin_loop();
            }
            slot.status.store(NO_MORE, Ordering::Release);
        }
    }

    /// Consumer side: block (spinning) until a slab is available for
    /// consumer `id`, swapping it into `out`. Returns `false` once the
    /// stream is exhausted.
    pub fn take(&self, id: usize, out: &mut Slab) -> bool {
        let slot = &self.slots[id];
        loop {
            match slot.status.load(Ordering::Acquire) {
                AVAILABLE => {
                    {
                        let mut slab = slot.slab.lock().unwrap();
                        std::mem::swap(&mut *slab, out);
                    }
                    slot.status.store(PENDING, Ordering::Release);
                    return true;
                }
                NO_MORE => return false,
                _ => std::hint::spin_loop(),
            }
        }
    }

    /// Parse the records of a slab as k-mers.
    pub fn parse<'a, const K: usize>(
        &self,
        slab: &'a Slab,
    ) -> impl Iterator<Item = Kmer<K>> + 'a {
        debug_assert_eq!(self.record_len, Kmer::<K>::RECORD_BYTES);
        slab.records(self.record_len).map(Kmer::from_packed_record)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
