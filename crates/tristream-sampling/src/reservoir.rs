//! Bounded edge reservoir
//!
//! Holds at most `capacity` edges in fixed slots together with two derived
//! indexes: the adjacency of the sampled graph and, per vertex, the slots whose
//! edge touches it. Both indexes are updated on every insert and removal so they
//! always describe exactly the stored edges.

use super::common::{Edge, SlotId, VertexId};
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;

/// Fixed-capacity edge store with adjacency and slot-location indexes
#[derive(Debug, Clone)]
pub struct Reservoir {
    capacity: usize,
    slots: Vec<Option<Edge>>,
    free: Vec<SlotId>,
    len: usize,
    adjacency: FxHashMap<VertexId, FxHashSet<VertexId>>,
    edge_location: FxHashMap<VertexId, BTreeSet<SlotId>>,
    /// Undirected endpoints -> slot
    present: FxHashMap<(VertexId, VertexId), SlotId>,
}

impl Reservoir {
    pub fn new(capacity: usize) -> Self {
        Reservoir {
            capacity,
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
            adjacency: FxHashMap::default(),
            edge_location: FxHashMap::default(),
            present: FxHashMap::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    /// Whether an edge with the same (undirected) endpoints is stored
    pub fn contains(&self, edge: &Edge) -> bool {
        self.present.contains_key(&edge.endpoints())
    }

    /// Slot holding the edge between `u` and `v`, in either orientation
    pub fn slot_of(&self, u: VertexId, v: VertexId) -> Option<SlotId> {
        let key = if u <= v { (u, v) } else { (v, u) };
        self.present.get(&key).copied()
    }

    /// Neighbors of `v` in the sampled graph
    pub fn neighbors(&self, v: VertexId) -> Option<&FxHashSet<VertexId>> {
        self.adjacency.get(&v)
    }

    pub fn degree(&self, v: VertexId) -> usize {
        self.adjacency.get(&v).map_or(0, |n| n.len())
    }

    /// Vertices adjacent to both `u` and `v` in the sampled graph.
    ///
    /// Iterates the smaller neighbor set and looks each up in the larger one.
    pub fn common_neighbors(&self, u: VertexId, v: VertexId) -> Vec<VertexId> {
        let (Some(nu), Some(nv)) = (self.adjacency.get(&u), self.adjacency.get(&v)) else {
            return Vec::new();
        };
        let (small, large) = if nu.len() <= nv.len() { (nu, nv) } else { (nv, nu) };
        small
            .iter()
            .filter(|w| **w != u && **w != v && large.contains(w))
            .copied()
            .collect()
    }

    /// Slots holding edges incident to `v`
    pub fn slots_of(&self, v: VertexId) -> Option<&BTreeSet<SlotId>> {
        self.edge_location.get(&v)
    }

    pub fn get(&self, slot: SlotId) -> Option<&Edge> {
        self.slots.get(slot).and_then(|e| e.as_ref())
    }

    /// Iterate over the stored edges
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.slots.iter().filter_map(|e| e.as_ref())
    }

    /// Store `edge` in a free slot.
    ///
    /// Returns `None` when the reservoir is full, or when the edge is a self-loop
    /// or already stored (the adjacency index is a set, so duplicates would not
    /// survive a later removal of one copy).
    pub fn insert(&mut self, edge: Edge) -> Option<SlotId> {
        if self.is_full() || edge.is_self_loop() || self.contains(&edge) {
            return None;
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };

        self.slots[slot] = Some(edge);
        self.len += 1;
        self.present.insert(edge.endpoints(), slot);

        self.adjacency.entry(edge.src).or_default().insert(edge.dst);
        self.adjacency.entry(edge.dst).or_default().insert(edge.src);
        self.edge_location.entry(edge.src).or_default().insert(slot);
        self.edge_location.entry(edge.dst).or_default().insert(slot);

        Some(slot)
    }

    /// Remove the edge stored in `slot`, dropping any index entry that becomes empty
    pub fn remove_slot(&mut self, slot: SlotId) -> Option<Edge> {
        let edge = self.slots.get_mut(slot)?.take()?;
        self.len -= 1;
        self.free.push(slot);
        self.present.remove(&edge.endpoints());

        for (a, b) in [(edge.src, edge.dst), (edge.dst, edge.src)] {
            if let Some(neighbors) = self.adjacency.get_mut(&a) {
                neighbors.remove(&b);
                if neighbors.is_empty() {
                    self.adjacency.remove(&a);
                }
            }
            if let Some(locations) = self.edge_location.get_mut(&a) {
                locations.remove(&slot);
                if locations.is_empty() {
                    self.edge_location.remove(&a);
                }
            }
        }

        Some(edge)
    }

    /// Pick a stored edge uniformly at random
    pub fn select_victim<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<SlotId> {
        if self.is_empty() {
            return None;
        }
        // Rejection sampling over slots; free slots are rare once the
        // reservoir has filled, which is the only time eviction happens.
        loop {
            let slot = rng.gen_range(0..self.slots.len());
            if self.slots[slot].is_some() {
                return Some(slot);
            }
        }
    }

    /// Rebuild both indexes from the slots and compare them to the live ones
    pub fn check_consistency(&self) -> bool {
        let mut adjacency: FxHashMap<VertexId, FxHashSet<VertexId>> = FxHashMap::default();
        let mut edge_location: FxHashMap<VertexId, BTreeSet<SlotId>> = FxHashMap::default();
        let mut count = 0;

        for (slot, edge) in self.slots.iter().enumerate() {
            if let Some(edge) = edge {
                count += 1;
                if self.present.get(&edge.endpoints()) != Some(&slot) {
                    return false;
                }
                adjacency.entry(edge.src).or_default().insert(edge.dst);
                adjacency.entry(edge.dst).or_default().insert(edge.src);
                edge_location.entry(edge.src).or_default().insert(slot);
                edge_location.entry(edge.dst).or_default().insert(slot);
            }
        }

        count == self.len
            && count <= self.capacity
            && count == self.present.len()
            && adjacency == self.adjacency
            && edge_location == self.edge_location
    }
}
