//! Shared stream types
//!
//! Vertex identifiers and the edge record that flows from the router to the
//! sampling workers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vertex Identifier type (u64)
pub type VertexId = u64;

/// Index of a slot inside a reservoir
pub type SlotId = usize;

/// A streamed, undirected edge.
///
/// `do_store` is set by the router: when true the receiving worker must admit
/// the edge (it may still be evicted later), when false the worker decides
/// admission by sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub src: VertexId,
    pub dst: VertexId,
    pub do_store: bool,
}

impl Edge {
    /// Create an edge that the receiving worker samples
    pub fn new(src: VertexId, dst: VertexId) -> Self {
        Edge { src, dst, do_store: false }
    }

    /// Create an edge that the receiving worker must store
    pub fn stored(src: VertexId, dst: VertexId) -> Self {
        Edge { src, dst, do_store: true }
    }

    pub fn is_self_loop(&self) -> bool {
        self.src == self.dst
    }

    /// Endpoints ordered as (min, max), used to identify undirected duplicates
    pub fn endpoints(&self) -> (VertexId, VertexId) {
        if self.src <= self.dst {
            (self.src, self.dst)
        } else {
            (self.dst, self.src)
        }
    }

    /// The larger endpoint id
    pub fn max_vertex(&self) -> VertexId {
        self.src.max(self.dst)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.src, self.dst)?;
        if self.do_store {
            write!(f, "*")?;
        }
        Ok(())
    }
}

impl From<(VertexId, VertexId)> for Edge {
    fn from((src, dst): (VertexId, VertexId)) -> Self {
        Edge::new(src, dst)
    }
}
