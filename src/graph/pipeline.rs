//! The compaction pipeline — builds the vertex index, folds the edge
//! stream into the state table, then extracts and emits the maximal
//! unitigs.
//!
//! Two strictly ordered streaming phases over the on-disk databases; no
//! vertex-phase worker starts before every edge has been applied. The
//! state table (and the MPHF beside it) can be persisted after the edge
//! phase and found again by a later run, which then skips straight to
//! extraction.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, ensure};
use serde::Serialize;
use tracing::info;

use crate::io::fasta::FastaSink;
use crate::io::kmer_db::KmerDbReader;
use crate::io::spmc::SlabExchange;
use crate::progress::{chunk_threshold, ProgressTracker};

use super::builder::CdbgBuilder;
use super::extractor::UnitigExtractor;
use super::table::StateTable;
use super::vertex::VertexIndex;

// ---------------------------------------------------------------------------
// Configuration / summary
// ---------------------------------------------------------------------------

/// Configuration of one compaction run.
pub struct CompactionConfig {
    /// Path prefix of the (k+1)-mer database.
    pub edge_db: PathBuf,
    /// Path prefix of the canonical k-mer database.
    pub vertex_db: PathBuf,
    /// FASTA output path.
    pub output: PathBuf,
    /// Worker-thread count, each phase.
    pub threads: usize,
    /// Extract a maximal path cover instead of the maximal unitigs.
    pub path_cover: bool,
    /// If set, load/save the state table and MPHF at this path prefix.
    pub state_prefix: Option<PathBuf>,
}

/// Statistics of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct CompactionSummary {
    pub k: usize,
    pub vertex_count: u64,
    pub edge_count: u64,
    pub unitig_count: u64,
    pub unitig_kmer_count: u64,
    pub min_unitig_len: usize,
    pub max_unitig_len: usize,
    pub avg_unitig_len: u64,
    pub sum_unitig_len: u64,
    pub dcc_count: u64,
    pub dcc_kmer_count: u64,
    pub dcc_sum_len: u64,
}

fn state_path(prefix: &Path) -> PathBuf {
    prefix.with_extension("st")
}

fn mphf_path(prefix: &Path) -> PathBuf {
    prefix.with_extension("mph")
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the whole compaction: vertex index, edge phase, extraction.
pub fn run_compaction<const K: usize, const KP1: usize>(
    config: &CompactionConfig,
) -> Result<CompactionSummary> {
    debug_assert_eq!(KP1, K + 1);
    ensure!(config.threads >= 1, "at least one worker thread is required");

    let vertex_count = KmerDbReader::<K>::open(&config.vertex_db)?.kmer_count();
    let mut edge_reader = KmerDbReader::<KP1>::open(&config.edge_db)?;
    let edge_count = edge_reader.kmer_count();
    info!("Graph: {vertex_count} distinct vertices, {edge_count} distinct edges");

    // A persisted run provides both the hash function and the fully
    // computed states; the edge phase is skipped entirely then.
    let persisted = config
        .state_prefix
        .as_deref()
        .filter(|p| state_path(p).is_file() && mphf_path(p).is_file());

    let (index, states) = match persisted {
        Some(prefix) => {
            info!("Loading persisted state from prefix {}", prefix.display());
            let index =
                VertexIndex::<K>::load(&mphf_path(prefix), vertex_count as usize)?;
            let states = StateTable::load(&state_path(prefix), vertex_count as usize)?;
            (index, states)
        }
        None => {
            let keys = KmerDbReader::<K>::open(&config.vertex_db)?
                .read_all()
                .context("failed to read the vertex database")?;
            let index = VertexIndex::build(&keys, config.threads);
            drop(keys);

            let states = StateTable::new(vertex_count as usize);
            compute_states::<K, KP1>(config, &index, &states, &mut edge_reader, edge_count)?;

            if let Some(prefix) = config.state_prefix.as_deref() {
                states.save(&state_path(prefix))?;
                index.save(&mphf_path(prefix))?;
                info!("Saved state table and MPHF at prefix {}", prefix.display());
            }
            (index, states)
        }
    };

    let meta = extract_unitigs::<K>(config, &index, &states, vertex_count)?;
    meta.log();

    Ok(CompactionSummary {
        k: K,
        vertex_count,
        edge_count,
        unitig_count: meta.unipath_count(),
        unitig_kmer_count: meta.kmer_count(),
        min_unitig_len: meta.min_len(),
        max_unitig_len: meta.max_len(),
        avg_unitig_len: meta.avg_len(),
        sum_unitig_len: meta.sum_len(),
        dcc_count: meta.dcc_count(),
        dcc_kmer_count: meta.dcc_kmer_count(),
        dcc_sum_len: meta.dcc_sum_len(),
    })
}

/// Edge phase: stream the (k+1)-mer database through the worker pool,
/// folding every edge into the state table.
fn compute_states<const K: usize, const KP1: usize>(
    config: &CompactionConfig,
    index: &VertexIndex<K>,
    states: &StateTable,
    edge_reader: &mut KmerDbReader<KP1>,
    edge_count: u64,
) -> Result<()> {
    info!("Computing the automaton states");
    let progress = ProgressTracker::new(
        edge_count,
        chunk_threshold(edge_count, config.threads),
        "computing states",
    );
    let exchange = SlabExchange::new(config.threads, edge_reader.record_len());
    let builder = CdbgBuilder::new(index, states, config.path_cover, &progress);

    crossbeam::scope(|s| -> Result<()> {
        let mut workers = Vec::with_capacity(config.threads);
        for id in 0..config.threads {
            let builder = &builder;
            let exchange = &exchange;
            workers.push(s.spawn(move |_| builder.process_edges::<KP1>(exchange, id)));
        }

        let producer = s.spawn(|_| exchange.produce(edge_reader));

        for worker in workers {
            worker
                .join()
                .map_err(|e| anyhow!("edge worker panicked: {e:?}"))?;
        }
        producer
            .join()
            .map_err(|e| anyhow!("edge producer panicked: {e:?}"))?
            .context("failed to stream the edge database")
    })
    .map_err(|e| anyhow!("edge phase panicked: {e:?}"))??;

    info!("Processed {} edge instances", builder.edges_processed());
    Ok(())
}

/// Vertex phase: stream the vertex database, extracting every maximal
/// unitig exactly once into the output sink.
fn extract_unitigs<const K: usize>(
    config: &CompactionConfig,
    index: &VertexIndex<K>,
    states: &StateTable,
    vertex_count: u64,
) -> Result<super::meta::UnipathsMetaInfo> {
    info!(
        "Extracting {}",
        if config.path_cover {
            "the maximal path cover"
        } else {
            "the maximal unitigs"
        }
    );

    let mut vertex_reader = KmerDbReader::<K>::open(&config.vertex_db)?;
    // Each vertex costs one scan unit plus one unit inside its unitig.
    let total_work = vertex_count * 2;
    let progress = ProgressTracker::new(
        total_work,
        chunk_threshold(total_work, config.threads),
        "extracting unitigs",
    );
    let exchange = SlabExchange::new(config.threads, vertex_reader.record_len());
    let sink = FastaSink::create(&config.output)?;
    let extractor = UnitigExtractor::new(index, states, &progress);

    crossbeam::scope(|s| -> Result<()> {
        let mut workers = Vec::with_capacity(config.threads);
        for id in 0..config.threads {
            let extractor = &extractor;
            let exchange = &exchange;
            let sink = &sink;
            workers.push(s.spawn(move |_| extractor.process_vertices(exchange, id, sink)));
        }

        let producer = s.spawn(|_| exchange.produce(&mut vertex_reader));

        for worker in workers {
            worker
                .join()
                .map_err(|e| anyhow!("extraction worker panicked: {e:?}"))?
                .context("failed to write unitig records")?;
        }
        producer
            .join()
            .map_err(|e| anyhow!("vertex producer panicked: {e:?}"))?
            .context("failed to stream the vertex database")
    })
    .map_err(|e| anyhow!("vertex phase panicked: {e:?}"))??;

    info!("Scanned {} vertices", extractor.vertices_scanned());
    sink.finish()?;
    Ok(extractor.meta())
}
