//! Convenience enumeration of a graph's vertex and edge sets from FASTA
//! input, written straight into the on-disk database format.
//!
//! This stands in for a full k-mer counting stage: every distinct
//! canonical k-mer and (k+1)-mer of the input becomes a database record.
//! Windows touching a non-ACGT character are skipped, so placeholder runs
//! break the rolling k-mers exactly like sequence ends do.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use ahash::AHashSet;
use anyhow::{Context, Result};
use tracing::info;

use super::kmer_db::write_database;
use crate::kmer::{Base, Kmer};

/// Sizes of the enumerated sets.
#[derive(Debug, Clone, Copy)]
pub struct GraphCounts {
    pub vertices: u64,
    pub edges: u64,
}

// ---------------------------------------------------------------------------
// Rolling enumeration
// ---------------------------------------------------------------------------

/// Rolls a k-mer and a (k+1)-mer window over incoming sequence chunks,
/// inserting canonical forms into the two sets.
struct RollingEnumerator<const K: usize, const KP1: usize> {
    vkmer: Kmer<K>,
    ekmer: Kmer<KP1>,
    run: usize,
    vertices: AHashSet<Kmer<K>>,
    edges: AHashSet<Kmer<KP1>>,
}

impl<const K: usize, const KP1: usize> RollingEnumerator<K, KP1> {
    fn new() -> Self {
        Self {
            vkmer: Kmer::zero(),
            ekmer: Kmer::zero(),
            run: 0,
            vertices: AHashSet::new(),
            edges: AHashSet::new(),
        }
    }

    /// Start a new sequence: in-flight windows are discarded.
    fn reset(&mut self) {
        self.run = 0;
    }

    /// Feed a chunk of sequence characters.
    fn consume(&mut self, chunk: &[u8]) {
        for &ch in chunk {
            let Some(base) = Base::from_ascii(ch) else {
                self.run = 0;
                continue;
            };
            self.vkmer.roll_forward(base);
            self.ekmer.roll_forward(base);
            self.run += 1;
            if self.run >= K {
                self.vertices.insert(self.vkmer.canonical());
            }
            if self.run >= KP1 {
                self.edges.insert(self.ekmer.canonical());
            }
        }
    }

    /// Finish: the sorted vertex and edge sets.
    fn into_sorted_sets(self) -> (Vec<Kmer<K>>, Vec<Kmer<KP1>>) {
        let mut vertices: Vec<_> = self.vertices.into_iter().collect();
        let mut edges: Vec<_> = self.edges.into_iter().collect();
        vertices.sort_unstable();
        edges.sort_unstable();
        (vertices, edges)
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Enumerate the distinct canonical k-mers and (k+1)-mers of in-memory
/// sequences and write both databases.
pub fn build_databases_from_sequences<const K: usize, const KP1: usize>(
    sequences: &[&[u8]],
    vertex_prefix: &Path,
    edge_prefix: &Path,
) -> Result<GraphCounts> {
    debug_assert_eq!(KP1, K + 1);
    let mut roller = RollingEnumerator::<K, KP1>::new();
    for seq in sequences {
        roller.reset();
        roller.consume(seq);
    }
    write_sets(roller, vertex_prefix, edge_prefix)
}

/// Enumerate from FASTA files and write both databases.
pub fn build_databases_from_fasta<const K: usize, const KP1: usize>(
    inputs: &[PathBuf],
    vertex_prefix: &Path,
    edge_prefix: &Path,
) -> Result<GraphCounts> {
    debug_assert_eq!(KP1, K + 1);
    let mut roller = RollingEnumerator::<K, KP1>::new();

    for path in inputs {
        let file = File::open(path)
            .with_context(|| format!("failed to open input file {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut records = 0u64;

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if n == 0 {
                break;
            }
            let trimmed = trim_line_ending(&line);
            if trimmed.first() == Some(&b'>') {
                roller.reset();
                records += 1;
            } else {
                roller.consume(trimmed);
            }
        }
        info!("Enumerated {} records from {}", records, path.display());
    }

    write_sets(roller, vertex_prefix, edge_prefix)
}

fn write_sets<const K: usize, const KP1: usize>(
    roller: RollingEnumerator<K, KP1>,
    vertex_prefix: &Path,
    edge_prefix: &Path,
) -> Result<GraphCounts> {
    let (vertices, edges) = roller.into_sorted_sets();
    let counts = GraphCounts {
        vertices: vertices.len() as u64,
        edges: edges.len() as u64,
    };
    write_database(vertex_prefix, vertices.into_iter())?;
    write_database(edge_prefix, edges.into_iter())?;
    Ok(counts)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    &line[..end]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
