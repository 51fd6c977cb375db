//! Vertex phase: walking and emitting maximal unitigs.
//!
//! Every canonical vertex seeds an extraction attempt. The attempt walks
//! both sides of the containing maximal unitig, claims ownership with a
//! single output mark at the signature vertex, marks the remaining
//! constituents, and writes the canonical FASTA record. Races resolve
//! through the state table alone: a walker that runs into an output mark
//! placed by another worker either just crossed a finished flanking vertex
//! (`OutBranching`) or is inside a unitig someone else owns
//! (`OutNonBranching`) and stands down.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::io::fasta::{CharacterBuffer, RecordWriter};
use crate::io::spmc::{Slab, SlabExchange};
use crate::kmer::{EdgeEncoding, Kmer, Side};
use crate::progress::ProgressTracker;

use super::meta::UnipathsMetaInfo;
use super::state::State;
use super::table::StateTable;
use super::unitig::{MaximalUnitigScratch, UnitigScratch};
use super::vertex::{DirectedVertex, VertexIndex};

/// Extracts maximal unitigs from the frozen state table.
pub struct UnitigExtractor<'a, const K: usize> {
    index: &'a VertexIndex<K>,
    states: &'a StateTable,
    progress: &'a ProgressTracker,
    meta: Mutex<UnipathsMetaInfo>,
    vertices_scanned: AtomicU64,
}

impl<'a, const K: usize> UnitigExtractor<'a, K> {
    pub fn new(
        index: &'a VertexIndex<K>,
        states: &'a StateTable,
        progress: &'a ProgressTracker,
    ) -> Self {
        Self {
            index,
            states,
            progress,
            meta: Mutex::new(UnipathsMetaInfo::new()),
            vertices_scanned: AtomicU64::new(0),
        }
    }

    /// Total vertices scanned across workers.
    pub fn vertices_scanned(&self) -> u64 {
        self.vertices_scanned.load(Ordering::Relaxed)
    }

    /// The aggregated unitig statistics.
    pub fn meta(&self) -> UnipathsMetaInfo {
        self.meta.lock().unwrap().clone()
    }

    /// Worker loop: drain vertex slabs for consumer `worker_id`, extracting
    /// the containing maximal unitig of each seed at most once globally.
    pub fn process_vertices<S: RecordWriter + ?Sized>(
        &self,
        exchange: &SlabExchange,
        worker_id: usize,
        sink: &S,
    ) -> io::Result<()> {
        let mut slab = Slab::default();
        let result = self.extraction_loop(exchange, worker_id, sink, &mut slab);
        if result.is_err() {
            // The producer only finishes once every consumer drains; keep
            // consuming (and discarding) so a failed worker does not wedge
            // the phase.
            while exchange.take(worker_id, &mut slab) {}
        }
        result
    }

    fn extraction_loop<S: RecordWriter + ?Sized>(
        &self,
        exchange: &SlabExchange,
        worker_id: usize,
        sink: &S,
        slab: &mut Slab,
    ) -> io::Result<()> {
        let mut scratch = MaximalUnitigScratch::<K>::new();
        let mut buffer = CharacterBuffer::new(sink);
        let mut local_meta = UnipathsMetaInfo::new();
        let mut scanned = 0u64;
        let mut progress = 0u64;

        while exchange.take(worker_id, slab) {
            for rec in slab.records(exchange.record_len()) {
                let v_hat = Kmer::<K>::from_packed_record(rec);
                if self.extract_maximal_unitig(&v_hat, &mut scratch) {
                    self.mark_maximal_unitig(&scratch);
                    local_meta.add_maximal_unitig(&scratch);
                    scratch.append_record(&mut buffer)?;

                    progress += scratch.size() as u64;
                    if self.progress.track_work(progress) {
                        progress = 0;
                    }
                }

                scanned += 1;
                progress += 1;
                if self.progress.track_work(progress) {
                    progress = 0;
                }
            }
        }

        buffer.flush()?;
        self.vertices_scanned.fetch_add(scanned, Ordering::Relaxed);
        self.meta.lock().unwrap().aggregate(&local_meta);
        Ok(())
    }

    /// Extract the maximal unitig containing `v_hat` into `scratch`.
    /// Returns `true` iff this worker claimed the unitig first.
    pub fn extract_maximal_unitig(
        &self,
        v_hat: &Kmer<K>,
        scratch: &mut MaximalUnitigScratch<K>,
    ) -> bool {
        let state = self.states.read(self.index.bucket(v_hat));
        if state.is_outputted() {
            return false;
        }

        scratch.mark_linear();
        if !self.walk_unitig(v_hat, state, Side::Back, scratch.unitig_mut(Side::Back)) {
            return false;
        }
        if scratch.unitig(Side::Back).is_cycle() {
            scratch.mark_cycle(Side::Back);
        } else if !self.walk_unitig(v_hat, state, Side::Front, scratch.unitig_mut(Side::Front)) {
            return false;
        }

        // The single linearisation point: whoever marks the signature
        // vertex owns the unitig.
        if !self.states.mark_if_unmarked(scratch.sign_vertex().bucket()) {
            return false;
        }

        scratch.finalize();
        true
    }

    /// Walk the unitig outward from `v_hat` through its side `s_v_hat`,
    /// given `v_hat`'s pre-read state `st_v`. Returns `true` iff the walk
    /// reached the unitig's endpoint in this direction; `false` means some
    /// other worker already output the containing unitig.
    fn walk_unitig(
        &self,
        v_hat: &Kmer<K>,
        st_v: State,
        s_v_hat: Side,
        unitig: &mut UnitigScratch<K>,
    ) -> bool {
        let mut s_v = s_v_hat;
        // Orient the walk so the label always grows rightward: exiting the
        // back keeps the canonical form, exiting the front walks the
        // reverse complement.
        let mut v = DirectedVertex::new(
            if s_v == Side::Back {
                *v_hat
            } else {
                v_hat.reverse_complement()
            },
            self.index,
        );
        let mut state = st_v;
        unitig.init(&v);

        loop {
            let b = match state.edge_at(s_v) {
                EdgeEncoding::Base(b) => b,
                // Empty or branching: this vertex is the endpoint.
                _ => break,
            };
            // The stored encoding is canonical-side-relative; the observed
            // form is reversed exactly when exiting through the front.
            let b_ext = if s_v == Side::Back { b } else { b.complement() };
            v.roll_forward(b_ext, self.index);
            state = self.states.read(v.bucket());
            s_v = v.entrance_side();

            match state.edge_at(s_v) {
                // Crossed into an already-output branching endpoint: the
                // walk is complete, the neighbour belongs elsewhere.
                EdgeEncoding::OutBranching => return true,
                // Walked into the middle of a unitig someone else owns.
                EdgeEncoding::OutNonBranching => return false,
                // Crossed an endpoint into a different unitig.
                EdgeEncoding::Branching => break,
                _ => {}
            }

            if !unitig.extend(&v, b_ext.to_ascii()) {
                break; // Closed a detached chordless cycle.
            }
            s_v = s_v.opposite();
        }

        true
    }

    /// Output-mark every constituent vertex of the claimed unitig.
    /// Idempotent and monotone, so re-marking the signature vertex (or
    /// racing walkers observing partial marks) is harmless.
    fn mark_maximal_unitig(&self, scratch: &MaximalUnitigScratch<K>) {
        let (a, b) = scratch.bucket_lists();
        for &bucket in a.iter().chain(b) {
            self.states.update_with(bucket, State::mark_outputted);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::CdbgBuilder;
    use crate::graph::edge::Edge;
    use std::collections::BTreeSet;

    #[derive(Default)]
    struct VecSink(Mutex<Vec<u8>>);

    impl RecordWriter for VecSink {
        fn write_record(&self, bytes: &[u8]) -> io::Result<()> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }
    }

    /// Build index + states from edge labels, extract from every vertex,
    /// and return the set of emitted record bodies.
    fn compact(vertices: &[&str], edges: &[&str]) -> BTreeSet<String> {
        let keys: Vec<Kmer<3>> = vertices
            .iter()
            .map(|l| Kmer::from_ascii(l.as_bytes()).canonical())
            .collect();
        let index = VertexIndex::build(&keys, 1);
        let states = StateTable::new(keys.len());
        let progress = ProgressTracker::new(1, 0, "test");

        let builder = CdbgBuilder::new(&index, &states, false, &progress);
        for e in edges {
            let km = Kmer::<4>::from_ascii(e.as_bytes());
            builder.add_cdbg_edge(&Edge::<3, 4>::new(&km, &index));
        }

        let extractor = UnitigExtractor::new(&index, &states, &progress);
        let sink = VecSink::default();
        let mut scratch = MaximalUnitigScratch::new();
        {
            let mut buffer = CharacterBuffer::new(&sink);
            for key in &keys {
                if extractor.extract_maximal_unitig(key, &mut scratch) {
                    extractor.mark_maximal_unitig(&scratch);
                    scratch.append_record(&mut buffer).unwrap();
                }
            }
        }

        let out = String::from_utf8(sink.0.into_inner().unwrap()).unwrap();
        out.lines()
            .filter(|l| !l.starts_with('>'))
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_single_path() {
        let records = compact(&["AAC", "ACC", "CCC"], &["AACC", "ACCC"]);
        assert_eq!(records, BTreeSet::from(["AACCC".to_owned()]));
    }

    #[test]
    fn test_branch_splits_unitigs() {
        let records = compact(
            &["AAC", "ACC", "CCA", "CCG"],
            &["AACC", "ACCA", "ACCG"],
        );
        // ACC branches on its back side: AAC-ACC is one unitig, CCA and CCG
        // are trivial ones.
        assert_eq!(
            records,
            BTreeSet::from(["AACC".to_owned(), "CCA".to_owned(), "CCG".to_owned()])
        );
    }

    #[test]
    fn test_isolated_vertex_is_trivial_unitig() {
        let records = compact(&["AAC"], &[]);
        assert_eq!(records, BTreeSet::from(["AAC".to_owned()]));
    }

    #[test]
    fn test_one_sided_loop_truncates() {
        // ACGT is a loop on ACG's back; the only unitig is the vertex
        // itself, in canonical form.
        let records = compact(&["ACG"], &["ACGT"]);
        assert_eq!(records, BTreeSet::from(["ACG".to_owned()]));
    }

    #[test]
    fn test_perfect_cycle_is_one_dcc() {
        // ACG -> CGA -> GAC -> ACG, all canonical, one edge per side.
        let records = compact(&["ACG", "CGA", "GAC"], &["ACGA", "CGAC", "GACG"]);
        // One DCC of 3 vertices, rotated so lex-min vertex ACG leads.
        assert_eq!(records, BTreeSet::from(["ACGAC".to_owned()]));
    }

    #[test]
    fn test_rc_duplicate_path_emitted_once() {
        // AAAC and its reverse complement GTTT describe the same edge.
        let records = compact(&["AAA", "AAC"], &["AAAC", "GTTT"]);
        assert_eq!(records, BTreeSet::from(["AAAC".to_owned()]));
    }

    #[test]
    fn test_every_vertex_covered_exactly_once() {
        let vertices = ["AAC", "ACC", "CCA", "CCG", "CAT"];
        let edges = ["AACC", "ACCA", "ACCG", "CCAT"];
        let records = compact(&vertices, &edges);

        // Each record's k-windows are distinct canonical vertices; the
        // union over records is the whole vertex set, without repeats.
        let mut seen = BTreeSet::new();
        for rec in &records {
            for win in rec.as_bytes().windows(3) {
                let v = Kmer::<3>::from_ascii(win).canonical().label();
                assert!(seen.insert(v), "vertex covered twice: {win:?}");
            }
        }
        let expected: BTreeSet<String> = vertices
            .iter()
            .map(|l| Kmer::<3>::from_ascii(l.as_bytes()).canonical().label())
            .collect();
        assert_eq!(seen, expected);
    }
}
