//! End-to-end compaction tests.
//!
//! Each scenario enumerates a small corpus into real on-disk databases,
//! runs the full pipeline, and checks the emitted FASTA records against
//! the expected unitig set (sequences are compared in canonical form; IDs
//! are run-dependent and ignored).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use unitiger::graph::{run_compaction, CompactionConfig, CompactionSummary};
use unitiger::io::enumerate::build_databases_from_sequences;
use unitiger::kmer::Kmer;

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Workspace {
    _dir: TempDir,
    vertex_db: PathBuf,
    edge_db: PathBuf,
    output: PathBuf,
    root: PathBuf,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    Workspace {
        vertex_db: root.join("graph-vertices"),
        edge_db: root.join("graph-edges"),
        output: root.join("unitigs.fa"),
        root,
        _dir: dir,
    }
}

fn compact<const K: usize, const KP1: usize>(
    seqs: &[&[u8]],
    threads: usize,
    path_cover: bool,
    state_prefix: Option<PathBuf>,
) -> (Workspace, CompactionSummary) {
    let ws = workspace();
    build_databases_from_sequences::<K, KP1>(seqs, &ws.vertex_db, &ws.edge_db).unwrap();

    let config = CompactionConfig {
        edge_db: ws.edge_db.clone(),
        vertex_db: ws.vertex_db.clone(),
        output: ws.output.clone(),
        threads,
        path_cover,
        state_prefix,
    };
    let summary = run_compaction::<K, KP1>(&config).unwrap();
    (ws, summary)
}

fn read_records(path: &Path) -> Vec<String> {
    let text = std::fs::read_to_string(path).unwrap();
    let mut records = Vec::new();
    for line in text.lines() {
        if line.starts_with('>') {
            assert!(line[1..].parse::<u64>().is_ok(), "non-numeric id: {line}");
        } else {
            assert!(line.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')));
            records.push(line.to_owned());
        }
    }
    records
}

fn record_set(path: &Path) -> BTreeSet<String> {
    read_records(path).into_iter().collect()
}

/// Assert the records cover every canonical vertex of the sequences
/// exactly once, and return the vertex count.
fn assert_exact_cover<const K: usize>(records: &[String], seqs: &[&[u8]]) -> usize {
    let mut expected = BTreeSet::new();
    for seq in seqs {
        for win in seq.windows(K) {
            if win.iter().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')) {
                expected.insert(Kmer::<K>::from_ascii(win).canonical());
            }
        }
    }

    let mut covered = BTreeSet::new();
    for rec in records {
        assert!(rec.len() >= K, "record shorter than k: {rec}");
        for win in rec.as_bytes().windows(K) {
            let v = Kmer::<K>::from_ascii(win).canonical();
            assert!(covered.insert(v), "vertex covered twice: {v}");
        }
    }
    assert_eq!(covered, expected);

    let total: usize = records.iter().map(|r| r.len() - (K - 1)).sum();
    assert_eq!(total, expected.len());
    expected.len()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn single_path_is_one_unitig() {
    let seqs: &[&[u8]] = &[b"AACCC"];
    let (ws, summary) = compact::<3, 4>(seqs, 1, false, None);

    assert_eq!(record_set(&ws.output), BTreeSet::from(["AACCC".to_owned()]));
    assert_eq!(summary.vertex_count, 3);
    assert_eq!(summary.edge_count, 2);
    assert_eq!(summary.unitig_count, 1);
    assert_eq!(summary.min_unitig_len, 5);
    assert_eq!(summary.max_unitig_len, 5);
    assert_eq!(summary.dcc_count, 0);
}

#[test]
fn branch_splits_into_three_unitigs() {
    // The two reads share AACC and then diverge: ACC branches at its back.
    let seqs: &[&[u8]] = &[b"AACCA", b"AACCG"];
    let (ws, summary) = compact::<3, 4>(seqs, 1, false, None);

    assert_eq!(
        record_set(&ws.output),
        BTreeSet::from(["AACC".to_owned(), "CCA".to_owned(), "CCG".to_owned()])
    );
    assert_eq!(summary.unitig_count, 3);
    assert_eq!(summary.unitig_kmer_count, summary.vertex_count);
}

#[test]
fn perfect_cycle_is_one_dcc() {
    // The circular sequence ACGACG (period 3) closes the cycle
    // ACG -> CGA -> GAC; the linearised input covers all its edges.
    let seqs: &[&[u8]] = &[b"ACGACG"];
    let (ws, summary) = compact::<3, 4>(seqs, 1, false, None);

    assert_eq!(record_set(&ws.output), BTreeSet::from(["ACGAC".to_owned()]));
    assert_eq!(summary.unitig_count, 1);
    assert_eq!(summary.dcc_count, 1);
    assert_eq!(summary.dcc_kmer_count, 3);
    assert_eq!(summary.dcc_sum_len, 5);
}

#[test]
fn reverse_complement_read_emits_once() {
    // The second read is the reverse complement of the first: same graph,
    // one emission.
    let seqs: &[&[u8]] = &[b"AAACTT", b"AAGTTT"];
    let (ws, summary) = compact::<3, 4>(seqs, 1, false, None);

    let records = read_records(&ws.output);
    assert_eq!(records.len(), summary.unitig_count as usize);
    assert_exact_cover::<3>(&records, &[b"AAACTT"]);
}

#[test]
fn isolated_vertex_is_trivial_unitig() {
    // A read of exactly k bases has a vertex but no edge.
    let seqs: &[&[u8]] = &[b"ACT"];
    let (ws, summary) = compact::<3, 4>(seqs, 1, false, None);

    assert_eq!(record_set(&ws.output), BTreeSet::from(["ACT".to_owned()]));
    assert_eq!(summary.edge_count, 0);
    assert_eq!(summary.unitig_count, 1);
    assert_eq!(summary.min_unitig_len, 3);
}

#[test]
fn k1_single_base_loops_branch_both_sides() {
    // At k = 1 the edge AA loops the vertex A onto itself crossing sides,
    // so A is flanked on both sides and emitted alone.
    let seqs: &[&[u8]] = &[b"AA"];
    let (ws, summary) = compact::<1, 2>(seqs, 1, false, None);

    assert_eq!(record_set(&ws.output), BTreeSet::from(["A".to_owned()]));
    assert_eq!(summary.vertex_count, 1);
    assert_eq!(summary.unitig_count, 1);
    assert_eq!(summary.min_unitig_len, 1);
}

#[test]
fn long_random_corpus_covers_every_vertex_once() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let seqs_owned: Vec<Vec<u8>> = (0..6)
        .map(|_| {
            (0..300)
                .map(|_| b"ACGT"[rng.gen_range(0..4)])
                .collect::<Vec<u8>>()
        })
        .collect();
    let seqs: Vec<&[u8]> = seqs_owned.iter().map(|s| s.as_slice()).collect();

    let (ws, summary) = compact::<7, 8>(&seqs, 4, false, None);

    let records = read_records(&ws.output);
    let n = assert_exact_cover::<7>(&records, &seqs);
    assert_eq!(summary.vertex_count as usize, n);
    assert_eq!(summary.unitig_kmer_count as usize, n);
    assert_eq!(records.len(), summary.unitig_count as usize);
}

#[test]
fn multithreaded_run_matches_single_threaded() {
    let mut rng = StdRng::seed_from_u64(42);
    let seq: Vec<u8> = (0..500).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
    let seqs: &[&[u8]] = &[&seq];

    let (ws1, s1) = compact::<5, 6>(seqs, 1, false, None);
    let (ws4, s4) = compact::<5, 6>(seqs, 4, false, None);

    assert_eq!(record_set(&ws1.output), record_set(&ws4.output));
    assert_eq!(s1.unitig_count, s4.unitig_count);
    assert_eq!(s1.sum_unitig_len, s4.sum_unitig_len);
    assert_eq!(s1.dcc_count, s4.dcc_count);
}

#[test]
fn persisted_state_reproduces_the_output() {
    let seqs: &[&[u8]] = &[b"AACCAGTTACGGATTTACA"];

    let (ws, first) = {
        let ws = workspace();
        build_databases_from_sequences::<5, 6>(seqs, &ws.vertex_db, &ws.edge_db).unwrap();
        let config = CompactionConfig {
            edge_db: ws.edge_db.clone(),
            vertex_db: ws.vertex_db.clone(),
            output: ws.output.clone(),
            threads: 2,
            path_cover: false,
            state_prefix: Some(ws.root.join("persist")),
        };
        let summary = run_compaction::<5, 6>(&config).unwrap();
        (ws, summary)
    };

    assert!(ws.root.join("persist.st").is_file());
    assert!(ws.root.join("persist.mph").is_file());
    let first_records = record_set(&ws.output);

    // Second run loads the persisted state and skips the edge phase.
    let second_out = ws.root.join("unitigs2.fa");
    let config = CompactionConfig {
        edge_db: ws.edge_db.clone(),
        vertex_db: ws.vertex_db.clone(),
        output: second_out.clone(),
        threads: 2,
        path_cover: false,
        state_prefix: Some(ws.root.join("persist")),
    };
    let second = run_compaction::<5, 6>(&config).unwrap();

    assert_eq!(record_set(&second_out), first_records);
    assert_eq!(second.unitig_count, first.unitig_count);
    assert_eq!(second.sum_unitig_len, first.sum_unitig_len);
}

#[test]
fn path_cover_partitions_the_vertex_set() {
    // Path cover drops loops and takes at most one edge per side; the
    // records still cover every vertex exactly once.
    let seqs: &[&[u8]] = &[b"AACCAGT", b"AACCGTT", b"CCAGTAC"];
    let (ws, summary) = compact::<3, 4>(seqs, 2, true, None);

    let records = read_records(&ws.output);
    let n = assert_exact_cover::<3>(&records, seqs);
    assert_eq!(summary.vertex_count as usize, n);
    assert_eq!(records.len(), summary.unitig_count as usize);
}
