//! On-disk formats and streaming: the k-mer databases, the SPMC slab
//! exchange, FASTA output, and the convenience enumerator.

pub mod enumerate;
pub mod fasta;
pub mod kmer_db;
pub mod spmc;
