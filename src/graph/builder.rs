//! Edge phase: folding the (k+1)-mer stream into the state table.
//!
//! Each edge instance makes an independent monotone transition on each of
//! its two endpoints. Because a side only ever moves forward through
//! `Empty -> base -> Branching`, concurrent applications commute: whichever
//! CAS wins first, the loser's re-read lands on a state that either already
//! subsumes its intent or still accepts it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::io::spmc::{Slab, SlabExchange};
use crate::kmer::{EdgeEncoding, Kmer, Side};
use crate::progress::ProgressTracker;

use super::edge::{Edge, Endpoint};
use super::table::StateTable;
use super::vertex::VertexIndex;

/// Applies the edge stream to the state table.
pub struct CdbgBuilder<'a, const K: usize> {
    index: &'a VertexIndex<K>,
    states: &'a StateTable,
    path_cover: bool,
    progress: &'a ProgressTracker,
    edges_processed: AtomicU64,
}

impl<'a, const K: usize> CdbgBuilder<'a, K> {
    pub fn new(
        index: &'a VertexIndex<K>,
        states: &'a StateTable,
        path_cover: bool,
        progress: &'a ProgressTracker,
    ) -> Self {
        Self {
            index,
            states,
            path_cover,
            progress,
            edges_processed: AtomicU64::new(0),
        }
    }

    /// Total number of edge instances applied across all workers.
    pub fn edges_processed(&self) -> u64 {
        self.edges_processed.load(Ordering::Relaxed)
    }

    /// Worker loop: drain slabs for consumer `worker_id`, applying every
    /// edge exactly once.
    pub fn process_edges<const KP1: usize>(&self, exchange: &SlabExchange, worker_id: usize) {
        let mut slab = Slab::default();
        let mut edge_count = 0u64;
        let mut progress = 0u64;

        while exchange.take(worker_id, &mut slab) {
            for rec in slab.records(exchange.record_len()) {
                let e = Kmer::<KP1>::from_packed_record(rec);
                let edge = Edge::<K, KP1>::new(&e, self.index);

                if self.path_cover {
                    self.add_path_cover_edge(&edge);
                } else {
                    self.add_cdbg_edge(&edge);
                }

                edge_count += 1;
                progress += 1;
                if self.progress.track_work(progress) {
                    progress = 0;
                }
            }
        }

        self.edges_processed.fetch_add(edge_count, Ordering::Relaxed);
    }

    /// Apply one edge under the maximal-unitig transition rules.
    pub fn add_cdbg_edge<const KP1: usize>(&self, edge: &Edge<K, KP1>) {
        if edge.is_loop() {
            if edge.u().side() != edge.v().side() {
                while !self.add_crossing_loop(edge.u()) {}
            } else {
                while !self.add_one_sided_loop(edge.u()) {}
            }
        } else {
            while !self.add_incident_edge(edge.u()) {}
            while !self.add_incident_edge(edge.v()) {}
        }
    }

    /// One attempt at recording the incidence of an edge at `endpoint`.
    /// Returns `false` on a CAS miss, after which the caller re-reads and
    /// retries.
    fn add_incident_edge(&self, endpoint: &Endpoint<K>) -> bool {
        let bucket = endpoint.bucket();
        let cur = self.states.read(bucket);

        match cur.edge_at(endpoint.side()) {
            // The side is known to branch; nothing can change it.
            EdgeEncoding::Branching => true,
            EdgeEncoding::Empty => {
                let new = cur.with_edge(endpoint.side(), endpoint.edge());
                self.states.try_update(bucket, cur, new)
            }
            enc if enc == endpoint.edge() => true,
            // A different edge was seen before: the side branches, and
            // which base was seen first no longer matters.
            _ => {
                let new = cur.with_edge(endpoint.side(), EdgeEncoding::Branching);
                self.states.try_update(bucket, cur, new)
            }
        }
    }

    /// One attempt at recording a loop joining the two sides of a vertex;
    /// both sides become branching.
    fn add_crossing_loop(&self, endpoint: &Endpoint<K>) -> bool {
        let bucket = endpoint.bucket();
        let cur = self.states.read(bucket);

        let mut new = cur;
        for side in [Side::Front, Side::Back] {
            if new.edge_at(side) != EdgeEncoding::Branching {
                new = new.with_edge(side, EdgeEncoding::Branching);
            }
        }
        if new == cur {
            return true;
        }
        self.states.try_update(bucket, cur, new)
    }

    /// One attempt at recording a loop joining a side of a vertex to
    /// itself; that side becomes branching.
    fn add_one_sided_loop(&self, endpoint: &Endpoint<K>) -> bool {
        let bucket = endpoint.bucket();
        let cur = self.states.read(bucket);

        if cur.edge_at(endpoint.side()) == EdgeEncoding::Branching {
            return true;
        }
        let new = cur.with_edge(endpoint.side(), EdgeEncoding::Branching);
        self.states.try_update(bucket, cur, new)
    }

    /// Path-cover transition: add the edge to both endpoints tiedly iff
    /// both incident sides are still empty, so no vertex ever joins two
    /// paths. Loop edges are never added. A pure CAS miss retries; an
    /// occupied side abandons the edge.
    pub fn add_path_cover_edge<const KP1: usize>(&self, edge: &Edge<K, KP1>) -> bool {
        if edge.is_loop() {
            return false;
        }

        loop {
            let (bu, bv) = (edge.u().bucket(), edge.v().bucket());
            let st_u = self.states.read(bu);
            if st_u.edge_at(edge.u().side()) != EdgeEncoding::Empty {
                return false;
            }
            let st_v = self.states.read(bv);
            if st_v.edge_at(edge.v().side()) != EdgeEncoding::Empty {
                return false;
            }

            let new_u = st_u.with_edge(edge.u().side(), edge.u().edge());
            let new_v = st_v.with_edge(edge.v().side(), edge.v().edge());
            if self.states.try_update_pair(bu, st_u, new_u, bv, st_v, new_v) {
                return true;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
