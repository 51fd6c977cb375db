//! The `build` subcommand: run the compaction pipeline.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::Args;
use tracing::info;

use crate::dispatch_odd_k;
use crate::graph::{run_compaction, CompactionConfig};
use crate::kmer::{valid_k, MAX_K};

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// K-mer length (odd, at most 63).
    #[arg(short)]
    k: usize,

    /// Path prefix of the (k+1)-mer (edge) database.
    #[arg(long, value_name = "PREFIX")]
    edge_db: PathBuf,

    /// Path prefix of the canonical k-mer (vertex) database.
    #[arg(long, value_name = "PREFIX")]
    vertex_db: PathBuf,

    /// Output FASTA path.
    #[arg(short, long)]
    output: PathBuf,

    /// Number of worker threads per phase.
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Extract a maximal path cover instead of the maximal unitigs.
    #[arg(long)]
    path_cover: bool,

    /// Load/save the computed state table and MPHF at this path prefix.
    #[arg(long, value_name = "PREFIX")]
    state_prefix: Option<PathBuf>,

    /// Write a JSON run summary to this path.
    #[arg(long)]
    summary: Option<PathBuf>,
}

pub fn run(args: BuildArgs) -> Result<()> {
    ensure!(
        valid_k(args.k),
        "k must be odd and in [1, {MAX_K}]; got {}",
        args.k
    );
    ensure!(args.threads >= 1, "at least one thread is required");

    let config = CompactionConfig {
        edge_db: args.edge_db,
        vertex_db: args.vertex_db,
        output: args.output,
        threads: args.threads,
        path_cover: args.path_cover,
        state_prefix: args.state_prefix,
    };

    let summary = dispatch_odd_k!(args.k, run_compaction(&config))?;
    info!(
        "Wrote {} records ({} bases) to {}",
        summary.unitig_count,
        summary.sum_unitig_len,
        config.output.display()
    );

    if let Some(path) = args.summary {
        let file = File::create(&path)
            .with_context(|| format!("failed to create summary file {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        info!("Run summary written to {}", path.display());
    }

    Ok(())
}
