//! Bidirected edge instances and their endpoints.
//!
//! A (k+1)-mer `e` and its reverse complement denote the same bidirected
//! edge; each parsed (k+1)-mer is one *instance* of it. The instance is the
//! tuple `(u, side_u, v, side_v)`: the prefix k-mer `u` exits the edge
//! through `side_u`, the suffix k-mer `v` enters it through `side_v`, both
//! sides defined on the canonical orientation of the vertex.

use crate::kmer::{Base, EdgeEncoding, Kmer, Side};

use super::vertex::{DirectedVertex, VertexIndex};

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// One endpoint of a bidirected edge instance: the vertex, the incidence
/// side, and the edge's extended-base encoding at that side.
#[derive(Clone, Copy, Debug)]
pub struct Endpoint<const K: usize> {
    vertex: DirectedVertex<K>,
    side: Side,
    edge: EdgeEncoding,
}

impl<const K: usize> Endpoint<K> {
    /// The source endpoint: the prefix k-mer of the edge `e`.
    pub fn from_prefix<const KP1: usize>(e: &Kmer<KP1>, index: &VertexIndex<K>) -> Self {
        let vertex = DirectedVertex::new(e.prefix_kmer::<K>(), index);
        let side = vertex.exit_side();
        let base = match side {
            Side::Back => e.back(),
            Side::Front => e.back().complement(),
        };
        Self {
            vertex,
            side,
            edge: EdgeEncoding::Base(base),
        }
    }

    /// The sink endpoint: the suffix k-mer of the edge `e`.
    pub fn from_suffix<const KP1: usize>(e: &Kmer<KP1>, index: &VertexIndex<K>) -> Self {
        let vertex = DirectedVertex::new(e.suffix_kmer::<K>(), index);
        let side = vertex.entrance_side();
        let base = match side {
            Side::Front => e.front(),
            Side::Back => e.front().complement(),
        };
        Self {
            vertex,
            side,
            edge: EdgeEncoding::Base(base),
        }
    }

    /// The endpoint vertex.
    #[inline]
    pub fn vertex(&self) -> &DirectedVertex<K> {
        &self.vertex
    }

    /// The incidence side at the vertex.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// The edge's encoding at this endpoint.
    #[inline]
    pub fn edge(&self) -> EdgeEncoding {
        self.edge
    }

    /// The outgoing base of the edge at this endpoint.
    #[inline]
    pub fn edge_base(&self) -> Base {
        match self.edge {
            EdgeEncoding::Base(b) => b,
            _ => unreachable!("endpoint encodings are always concrete bases"),
        }
    }

    /// The state-table bucket of the endpoint vertex.
    #[inline]
    pub fn bucket(&self) -> usize {
        self.vertex.bucket()
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// A fully configured edge instance.
pub struct Edge<const K: usize, const KP1: usize> {
    u: Endpoint<K>,
    v: Endpoint<K>,
}

impl<const K: usize, const KP1: usize> Edge<K, KP1> {
    /// Derive both endpoints of the parsed (k+1)-mer `e`.
    pub fn new(e: &Kmer<KP1>, index: &VertexIndex<K>) -> Self {
        Self {
            u: Endpoint::from_prefix(e, index),
            v: Endpoint::from_suffix(e, index),
        }
    }

    /// The source endpoint.
    #[inline]
    pub fn u(&self) -> &Endpoint<K> {
        &self.u
    }

    /// The sink endpoint.
    #[inline]
    pub fn v(&self) -> &Endpoint<K> {
        &self.v
    }

    /// Whether both endpoints are the same vertex.
    #[inline]
    pub fn is_loop(&self) -> bool {
        self.u.vertex().is_same_vertex(self.v.vertex())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
