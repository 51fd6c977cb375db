//! The vertex index (minimal perfect hash over canonical k-mers) and the
//! directed-vertex view used during edge processing and unitig walking.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use boomphf::Mphf;
use tracing::info;

use crate::kmer::{Base, Kmer, Side};

/// BBHash gamma: trades MPHF size for construction/query speed.
const MPHF_GAMMA: f64 = 2.0;

// ---------------------------------------------------------------------------
// VertexIndex
// ---------------------------------------------------------------------------

/// Read-only minimal perfect hash over the distinct canonical vertices,
/// mapping each to a bucket in `[0, N)`.
pub struct VertexIndex<const K: usize> {
    mphf: Mphf<Kmer<K>>,
    len: usize,
}

impl<const K: usize> VertexIndex<K> {
    /// Build the index over the full canonical vertex set.
    pub fn build(keys: &[Kmer<K>], threads: usize) -> Self {
        info!("Building the MPHF over {} vertices", keys.len());
        let mphf = if threads > 1 {
            Mphf::new_parallel(MPHF_GAMMA, keys, None)
        } else {
            Mphf::new(MPHF_GAMMA, keys)
        };
        Self {
            mphf,
            len: keys.len(),
        }
    }

    /// The bucket of a canonical k-mer.
    ///
    /// Must only be queried with k-mers the index was built over; the graph
    /// guarantees this, since every edge endpoint is a vertex.
    #[inline]
    pub fn bucket(&self, kmer: &Kmer<K>) -> usize {
        self.mphf.hash(kmer) as usize
    }

    /// Number of indexed vertices.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Persist the hash function.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create MPHF file {}", path.display()))?;
        bincode::serialize_into(BufWriter::new(file), &self.mphf)
            .with_context(|| format!("failed to serialise MPHF to {}", path.display()))?;
        Ok(())
    }

    /// Load a hash function previously written with [`VertexIndex::save`].
    pub fn load(path: &Path, len: usize) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open MPHF file {}", path.display()))?;
        let mphf = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("failed to deserialise MPHF from {}", path.display()))?;
        Ok(Self { mphf, len })
    }
}

// ---------------------------------------------------------------------------
// DirectedVertex
// ---------------------------------------------------------------------------

/// A vertex instance observed in a particular orientation.
///
/// A vertex has one canonical k-mer but can be seen in two forms, the
/// canonical one and its reverse complement; the tag records which form was
/// observed. The bucket of the canonical form is carried along so repeated
/// hash lookups are avoided.
#[derive(Clone, Copy, Debug)]
pub struct DirectedVertex<const K: usize> {
    kmer: Kmer<K>,
    rev_compl: Kmer<K>,
    canonical_is_fwd: bool,
    bucket: usize,
}

impl<const K: usize> DirectedVertex<K> {
    /// A placeholder instance for pre-allocating scratch space; overwritten
    /// before any use.
    pub(crate) fn placeholder() -> Self {
        let kmer = Kmer::zero();
        Self {
            kmer,
            rev_compl: kmer.reverse_complement(),
            canonical_is_fwd: true,
            bucket: 0,
        }
    }

    /// The vertex observed as `kmer`.
    pub fn new(kmer: Kmer<K>, index: &VertexIndex<K>) -> Self {
        let rev_compl = kmer.reverse_complement();
        let canonical_is_fwd = kmer <= rev_compl;
        let bucket = index.bucket(if canonical_is_fwd { &kmer } else { &rev_compl });
        Self {
            kmer,
            rev_compl,
            canonical_is_fwd,
            bucket,
        }
    }

    /// The observed k-mer form.
    #[inline]
    pub fn kmer(&self) -> &Kmer<K> {
        &self.kmer
    }

    /// The reverse complement of the observed form.
    #[inline]
    pub fn kmer_bar(&self) -> &Kmer<K> {
        &self.rev_compl
    }

    /// The canonical form of the vertex.
    #[inline]
    pub fn canonical(&self) -> &Kmer<K> {
        if self.canonical_is_fwd {
            &self.kmer
        } else {
            &self.rev_compl
        }
    }

    /// Whether the observed form is the canonical one.
    #[inline]
    pub fn in_canonical_form(&self) -> bool {
        self.canonical_is_fwd
    }

    /// The state-table bucket of the vertex.
    #[inline]
    pub fn bucket(&self) -> usize {
        self.bucket
    }

    /// Roll the observed form one base forward (append `b` on the right),
    /// moving this instance to the successor vertex.
    pub fn roll_forward(&mut self, b: Base, index: &VertexIndex<K>) {
        self.kmer.roll_to_next_kmer(b, &mut self.rev_compl);
        self.canonical_is_fwd = self.kmer <= self.rev_compl;
        self.bucket = index.bucket(self.canonical());
    }

    /// The incidence side if this instance were the source (prefix) of an
    /// edge: `Back` iff observed canonically.
    #[inline]
    pub fn exit_side(&self) -> Side {
        if self.canonical_is_fwd {
            Side::Back
        } else {
            Side::Front
        }
    }

    /// The incidence side if this instance were the sink (suffix) of an
    /// edge: `Front` iff observed canonically.
    #[inline]
    pub fn entrance_side(&self) -> Side {
        if self.canonical_is_fwd {
            Side::Front
        } else {
            Side::Back
        }
    }

    /// Whether the two instances denote the same vertex, directionality
    /// aside.
    #[inline]
    pub fn is_same_vertex(&self, other: &Self) -> bool {
        self.bucket == other.bucket
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
