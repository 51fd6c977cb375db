//! Statistics over the extracted maximal unitigs.

use tracing::info;

use super::unitig::MaximalUnitigScratch;

/// Per-worker (then aggregated) meta-information over extracted maximal
/// unitigs and DCCs.
#[derive(Clone, Debug)]
pub struct UnipathsMetaInfo {
    unipath_count: u64,
    kmer_count: u64,
    max_len: usize,
    min_len: usize,
    sum_len: u64,
    dcc_count: u64,
    dcc_kmer_count: u64,
    dcc_sum_len: u64,
}

impl UnipathsMetaInfo {
    pub fn new() -> Self {
        Self {
            unipath_count: 0,
            kmer_count: 0,
            max_len: 0,
            min_len: usize::MAX,
            sum_len: 0,
            dcc_count: 0,
            dcc_kmer_count: 0,
            dcc_sum_len: 0,
        }
    }

    /// Account one extracted maximal unitig.
    pub fn add_maximal_unitig<const K: usize>(&mut self, unitig: &MaximalUnitigScratch<K>) {
        let vertex_count = unitig.size();
        let len = unitig.base_len();

        self.unipath_count += 1;
        self.kmer_count += vertex_count as u64;
        self.max_len = self.max_len.max(len);
        self.min_len = self.min_len.min(len);
        self.sum_len += len as u64;

        if unitig.is_cycle() {
            self.dcc_count += 1;
            self.dcc_kmer_count += vertex_count as u64;
            self.dcc_sum_len += len as u64;
        }
    }

    /// Fold another tracker into this one.
    pub fn aggregate(&mut self, other: &Self) {
        self.unipath_count += other.unipath_count;
        self.kmer_count += other.kmer_count;
        self.max_len = self.max_len.max(other.max_len);
        self.min_len = self.min_len.min(other.min_len);
        self.sum_len += other.sum_len;
        self.dcc_count += other.dcc_count;
        self.dcc_kmer_count += other.dcc_kmer_count;
        self.dcc_sum_len += other.dcc_sum_len;
    }

    pub fn unipath_count(&self) -> u64 {
        self.unipath_count
    }

    pub fn kmer_count(&self) -> u64 {
        self.kmer_count
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Shortest unitig length; 0 when nothing was extracted.
    pub fn min_len(&self) -> usize {
        if self.min_len == usize::MAX { 0 } else { self.min_len }
    }

    pub fn sum_len(&self) -> u64 {
        self.sum_len
    }

    pub fn avg_len(&self) -> u64 {
        if self.unipath_count == 0 {
            0
        } else {
            self.sum_len / self.unipath_count
        }
    }

    pub fn dcc_count(&self) -> u64 {
        self.dcc_count
    }

    pub fn dcc_kmer_count(&self) -> u64 {
        self.dcc_kmer_count
    }

    pub fn dcc_sum_len(&self) -> u64 {
        self.dcc_sum_len
    }

    /// Log the tracked statistics.
    pub fn log(&self) {
        info!("Maximal unitigs: {}", self.unipath_count);
        info!("  k-mers in unitigs: {}", self.kmer_count);
        info!(
            "  length (bases): min {}, max {}, avg {}, total {}",
            self.min_len(),
            self.max_len,
            self.avg_len(),
            self.sum_len
        );
        if self.dcc_count > 0 {
            info!(
                "Detached chordless cycles: {} ({} k-mers, {} bases)",
                self.dcc_count, self.dcc_kmer_count, self.dcc_sum_len
            );
        }
    }
}

impl Default for UnipathsMetaInfo {
    fn default() -> Self {
        Self::new()
    }
}
