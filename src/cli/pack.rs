//! The `pack` subcommand: enumerate FASTA input into the vertex and edge
//! databases the compactor consumes.

use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};
use clap::Args;
use tracing::info;

use crate::dispatch_odd_k;
use crate::io::enumerate::build_databases_from_fasta;
use crate::kmer::{valid_k, MAX_K};

#[derive(Args, Debug)]
pub struct PackArgs {
    /// K-mer length (odd, at most 63).
    #[arg(short)]
    k: usize,

    /// Input FASTA file(s).
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Output path prefix; writes `<prefix>-vertices.{pre,suf}` and
    /// `<prefix>-edges.{pre,suf}`.
    #[arg(short, long)]
    output: PathBuf,
}

/// The vertex-database prefix derived from the output prefix.
pub fn vertex_prefix(output: &Path) -> PathBuf {
    with_suffix(output, "-vertices")
}

/// The edge-database prefix derived from the output prefix.
pub fn edge_prefix(output: &Path) -> PathBuf {
    with_suffix(output, "-edges")
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    prefix.with_file_name(name)
}

pub fn run(args: PackArgs) -> Result<()> {
    ensure!(
        valid_k(args.k),
        "k must be odd and in [1, {MAX_K}]; got {}",
        args.k
    );

    let vertices = vertex_prefix(&args.output);
    let edges = edge_prefix(&args.output);
    let counts = dispatch_odd_k!(
        args.k,
        build_databases_from_fasta(&args.input, &vertices, &edges)
    )?;

    info!(
        "Packed {} vertices into prefix {} and {} edges into prefix {}",
        counts.vertices,
        vertices.display(),
        counts.edges,
        edges.display()
    );
    Ok(())
}
