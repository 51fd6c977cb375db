mod build;
mod pack;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "unitiger")]
#[command(version, about = "Compacts de Bruijn graphs into maximal unitigs")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract the maximal unitigs (and DCCs) of a k-mer graph.
    Build(build::BuildArgs),
    /// Enumerate a FASTA corpus into the vertex and edge databases.
    Pack(pack::PackArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Build(args) => build::run(args),
        Commands::Pack(args) => pack::run(args),
    }
}
