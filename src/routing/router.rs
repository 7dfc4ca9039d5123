//! Edge Router for vertex-partitioned triangle counting
//!
//! Every vertex is owned by one worker. An edge whose endpoints share an owner
//! is unicast to that worker; otherwise it is broadcast to both owners so that
//! each of them can close triangles through it. Under the naive method the
//! whole stream is replicated to every worker instead.
//!
//! Ownership is a keyed hash of the vertex id, keyed by the run seed, so
//! owners behave as uniform draws that change from run to run. A triangle
//! spread over three owners reaches no single worker; the aggregator
//! compensates for the probability of that.

use crate::config::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use tristream_sampling::{Edge, VertexId};

/// Worker identifier, in `[0, worker_num)`
pub type WorkerId = usize;

/// Result of a routing decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Edge goes to exactly one worker
    Unicast(WorkerId),
    /// Edge goes to two distinct workers
    Pair(WorkerId, WorkerId),
    /// Edge goes to every worker
    All,
}

impl Route {
    pub fn is_broadcast(&self) -> bool {
        !matches!(self, Route::Unicast(_))
    }

    /// Expand the route into concrete destinations
    pub fn destinations(&self, worker_num: usize) -> Vec<WorkerId> {
        match *self {
            Route::Unicast(w) => vec![w],
            Route::Pair(a, b) => vec![a, b],
            Route::All => (0..worker_num).collect(),
        }
    }
}

/// Routing counters for one stream pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterStats {
    pub routed: u64,
    pub unicast: u64,
    pub pair: u64,
    pub replicated: u64,
    pub self_loops: u64,
    /// Edges marked `do_store`
    pub mandatory: u64,
    /// Edges delivered per worker
    pub per_worker: Vec<u64>,
}

/// Router state lives for one pass over the stream
#[derive(Debug, Clone)]
pub struct EdgeRouter {
    worker_num: usize,
    method: Method,
    tolerance: f64,
    /// Ownership hash key
    salt: u64,
    max_vid: VertexId,
    /// Mandatory stores assigned per worker
    mandatory_load: Vec<u64>,
    mandatory_total: u64,
    stats: RouterStats,
}

impl EdgeRouter {
    /// Create a new router. `worker_num` must be at least 1.
    pub fn new(worker_num: usize, method: Method, tolerance: f64, seed: u64) -> Self {
        let worker_num = worker_num.max(1);
        debug!(worker_num, %method, tolerance, seed, "Creating edge router");
        Self {
            worker_num,
            method,
            tolerance,
            salt: mix(seed),
            max_vid: 0,
            mandatory_load: vec![0; worker_num],
            mandatory_total: 0,
            stats: RouterStats {
                per_worker: vec![0; worker_num],
                ..Default::default()
            },
        }
    }

    pub fn worker_num(&self) -> usize {
        self.worker_num
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Worker owning vertex `v`
    pub fn owner(&self, v: VertexId) -> WorkerId {
        if self.worker_num == 1 {
            return 0;
        }
        let mixed = mix(v ^ self.salt) >> 32;
        (mixed % self.worker_num as u64) as WorkerId
    }

    /// Decide where `edge` goes and set its `do_store` flag.
    ///
    /// Self-loops produce no destination.
    pub fn route(&mut self, edge: &mut Edge) -> Option<Route> {
        if edge.is_self_loop() {
            self.stats.self_loops += 1;
            return None;
        }
        self.max_vid = self.max_vid.max(edge.max_vertex());

        let route = match self.method {
            Method::Naive => {
                edge.do_store = false;
                Route::All
            }
            Method::Partition => {
                let (a, b) = (self.owner(edge.src), self.owner(edge.dst));
                if a == b {
                    edge.do_store = true;
                    Route::Unicast(a)
                } else {
                    edge.do_store = self.within_tolerance(a) && self.within_tolerance(b);
                    Route::Pair(a, b)
                }
            }
        };

        self.record(&route, edge.do_store);
        trace!(edge = %edge, ?route, "Routed edge");
        Some(route)
    }

    /// Whether worker `w` can take another mandatory store without exceeding
    /// `(1 + tolerance)` times the mean mandatory load
    fn within_tolerance(&self, w: WorkerId) -> bool {
        let mean = self.mandatory_total as f64 / self.worker_num as f64;
        let limit = (1.0 + self.tolerance) * mean.max(1.0);
        (self.mandatory_load[w] as f64) < limit
    }

    fn record(&mut self, route: &Route, mandatory: bool) {
        self.stats.routed += 1;
        match route {
            Route::Unicast(_) => self.stats.unicast += 1,
            Route::Pair(..) => self.stats.pair += 1,
            Route::All => self.stats.replicated += 1,
        }
        let destinations = route.destinations(self.worker_num);
        for &w in &destinations {
            self.stats.per_worker[w] += 1;
        }
        if mandatory {
            self.stats.mandatory += 1;
            for &w in &destinations {
                self.mandatory_load[w] += 1;
                self.mandatory_total += 1;
            }
        }
    }

    /// Largest vertex id seen so far
    pub fn max_vid(&self) -> VertexId {
        self.max_vid
    }

    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }
}

/// splitmix64 finalizer
fn mix(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Find a vertex owned by `w`
    fn vertex_owned_by(router: &EdgeRouter, w: WorkerId, skip: VertexId) -> VertexId {
        (0..10_000)
            .find(|&v| v != skip && router.owner(v) == w)
            .expect("no vertex for worker")
    }

    #[test]
    fn test_same_owner_is_unicast() {
        let mut router = EdgeRouter::new(4, Method::Partition, 0.2, 0);
        let u = vertex_owned_by(&router, 2, u64::MAX);
        let v = vertex_owned_by(&router, 2, u);

        let mut edge = Edge::new(u, v);
        assert_eq!(router.route(&mut edge), Some(Route::Unicast(2)));
        assert!(edge.do_store);
    }

    #[test]
    fn test_different_owners_broadcast_to_both() {
        let mut router = EdgeRouter::new(4, Method::Partition, 0.2, 0);
        let u = vertex_owned_by(&router, 1, u64::MAX);
        let v = vertex_owned_by(&router, 3, u);

        match router.route(&mut Edge::new(u, v)) {
            Some(Route::Pair(a, b)) => {
                assert_ne!(a, b);
                assert_eq!((a, b), (1, 3));
            }
            other => panic!("Should broadcast, got {:?}", other),
        }
    }

    #[test]
    fn test_self_loop_has_no_destination() {
        let mut router = EdgeRouter::new(3, Method::Partition, 0.2, 0);
        assert!(router.route(&mut Edge::new(5, 5)).is_none());
        assert_eq!(router.stats().self_loops, 1);
        assert_eq!(router.stats().routed, 0);
        assert_eq!(router.max_vid(), 0);
    }

    #[test]
    fn test_naive_replicates_without_store() {
        let mut router = EdgeRouter::new(3, Method::Naive, 0.2, 0);
        let mut edge = Edge::stored(1, 2);
        assert_eq!(router.route(&mut edge), Some(Route::All));
        assert!(!edge.do_store);
        assert_eq!(router.stats().per_worker, vec![1, 1, 1]);
    }

    #[test]
    fn test_max_vid_tracks_both_endpoints() {
        let mut router = EdgeRouter::new(2, Method::Partition, 0.2, 0);
        router.route(&mut Edge::new(3, 40));
        router.route(&mut Edge::new(17, 2));
        assert_eq!(router.max_vid(), 40);
    }

    #[test]
    fn test_overloaded_worker_gets_sampled_edges() {
        let mut router = EdgeRouter::new(2, Method::Partition, 0.0, 0);
        let a0 = vertex_owned_by(&router, 0, u64::MAX);
        let a1 = vertex_owned_by(&router, 0, a0);

        // load worker 0 with mandatory unicast edges
        for _ in 0..10 {
            router.route(&mut Edge::new(a0, a1));
        }

        let b = vertex_owned_by(&router, 1, u64::MAX);
        let mut edge = Edge::new(a0, b);
        assert_eq!(router.route(&mut edge), Some(Route::Pair(0, 1)));
        assert!(!edge.do_store);
    }

    #[test]
    fn test_ownership_depends_on_seed() {
        let a = EdgeRouter::new(8, Method::Partition, 0.2, 1);
        let b = EdgeRouter::new(8, Method::Partition, 0.2, 2);
        let same = (0..1_000u64).filter(|&v| a.owner(v) == b.owner(v)).count();
        // independent owners agree on about 1 in 8 vertices
        assert!(same > 60 && same < 200, "{} of 1000 owners agree", same);

        let again = EdgeRouter::new(8, Method::Partition, 0.2, 1);
        assert!((0..1_000u64).all(|v| a.owner(v) == again.owner(v)));
    }

    #[test]
    fn test_owners_spread_evenly() {
        let router = EdgeRouter::new(4, Method::Partition, 0.2, 9);
        let mut load = [0usize; 4];
        for v in 0..4_000u64 {
            load[router.owner(v)] += 1;
        }
        assert!(load.iter().all(|&n| n > 850 && n < 1150), "{:?}", load);
    }

    #[test]
    fn test_single_worker_is_always_unicast() {
        let mut router = EdgeRouter::new(1, Method::Partition, 0.2, 0);
        for (u, v) in [(1, 2), (2, 3), (1, 3)] {
            assert_eq!(router.route(&mut Edge::new(u, v)), Some(Route::Unicast(0)));
        }
    }
}
