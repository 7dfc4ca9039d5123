//! Per-worker triangle counting engine
//!
//! Consumes the edges routed to one worker, maintains a bounded [`Reservoir`]
//! and keeps running global and per-vertex triangle estimates.
//!
//! Every incoming edge is first counted against the current sample (the
//! triangles it closes with two stored edges), then offered to the reservoir.
//! A triangle found this way is weighted by the inverse probability that both
//! of its stored wedge edges are in the sample, which keeps the estimate
//! unbiased under uniform eviction.
//!
//! # Admission schedule
//!
//! * `n` counts offers to the reservoir and is capped at `n_max = ceil(k / rate)`,
//!   so the admission probability `k / n` never drops below `rate`.
//! * The stream is split into rounds of `n_max` seen edges. Within a round the
//!   expected number of sampled replacements is held to `per_k`: the admission
//!   probability is lowered to the budget left per offer left in the round. It
//!   depends only on counters, never on earlier draws, and stays positive.
//! * Mandatory edges (`do_store`) bypass the probability test and the round
//!   budget but still evict when the reservoir is full.
//!
//! # Inclusion probabilities
//!
//! Each offer `j` evicts with some probability `e_j` (0 while the reservoir has
//! room). A full reservoir evicts uniformly, so a stored edge survives offer `j`
//! with probability `1 - e_j / k` and a stored pair with `1 - 2 e_j / k`. The
//! engine keeps the running log-sums of both factors and records, per slot, the
//! admission probability and the sums around its own offer. An offer that
//! admits its edge always evicts, so the older edge of a pair survives that
//! offer with `1 - 1 / k`. The joint inclusion probability of any two stored
//! edges then follows from a few additions.

use super::common::{Edge, SlotId, VertexId};
use super::error::{SamplingError, SamplingResult};
use super::reservoir::Reservoir;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Sizing and retention parameters for one engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Maximum number of stored edges
    pub k: usize,
    /// Hard memory ceiling, must be at least `k`
    pub total_space: usize,
    /// Target retention fraction in (0, 1]
    pub rate: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            k: 100_000,
            total_space: 100_000,
            rate: 1.0,
        }
    }
}

impl SamplerConfig {
    pub fn new(k: usize, total_space: usize, rate: f64) -> Self {
        Self { k, total_space, rate }
    }

    /// Check the capacity preconditions once, before any edge is processed
    pub fn validate(&self) -> SamplingResult<()> {
        if self.k == 0 {
            return Err(SamplingError::ZeroCapacity);
        }
        if self.k > self.total_space {
            return Err(SamplingError::CapacityExceedsTotalSpace {
                k: self.k,
                total_space: self.total_space,
            });
        }
        if !(self.rate > 0.0 && self.rate <= 1.0) {
            return Err(SamplingError::InvalidRate(self.rate));
        }
        Ok(())
    }
}

/// What happened to an edge offered to the reservoir
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Stored; `evicted` is the edge it replaced, if the reservoir was full
    Stored { evicted: Option<Edge> },
    /// Counted but not stored
    Rejected,
    /// An edge with the same endpoints is already stored; not counted again
    Duplicate,
}

impl Admission {
    pub fn is_stored(&self) -> bool {
        matches!(self, Admission::Stored { .. })
    }
}

/// Counters describing an engine's sampling history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplerStats {
    /// Edges seen (`tn`)
    pub seen: u64,
    /// Offers counted towards the admission probability (`n`, capped)
    pub offers: u64,
    pub admitted: u64,
    pub rejected: u64,
    pub duplicates: u64,
    pub evictions: u64,
    pub cur_round: u64,
    pub total_round: u64,
    pub per_k: usize,
}

/// Admission record of the edge held in one slot
#[derive(Debug, Clone, Copy, Default)]
struct Inclusion {
    /// ln of the probability the edge was admitted
    ln_admit: f64,
    /// Single-edge survival log-sum before this edge's own offer
    single_before: f64,
    /// Single-edge survival log-sum after this edge's own offer
    single_after: f64,
    /// ln(1 - 1/k) if admitting this edge evicted another, else 0
    ln_evict: f64,
    /// Pair survival log-sum after this edge's own offer
    pair_after: f64,
    /// `tn` at admission, orders two stored edges
    seen_at: u64,
}

/// Bounded-memory sampler and triangle estimator for one worker
pub struct CountingEngine {
    config: SamplerConfig,
    reservoir: Reservoir,
    inclusion: Vec<Inclusion>,
    /// Offers so far, capped at `n_max`
    n: u64,
    n_max: u64,
    /// Total edges seen
    tn: u64,
    cur_round: u64,
    total_round: u64,
    /// Expected sampled replacements allowed per round
    per_k: usize,
    /// Sum of admission probabilities offered so far this round
    round_spent: f64,
    ln_single: f64,
    ln_pair: f64,
    /// Single survival factor folded in by the current offer
    last_single: f64,
    global_cnt: f64,
    node_to_cnt: HashMap<VertexId, f32>,
    rng: StdRng,
    stats: SamplerStats,
}

impl CountingEngine {
    /// Create an engine with its own generator seeded from `seed`
    pub fn new(config: SamplerConfig, seed: u64) -> SamplingResult<Self> {
        config.validate()?;

        let capacity = config.k.min(config.total_space);
        let n_max = ((config.k as f64) / config.rate).ceil().max(1.0) as u64;

        debug!(k = config.k, n_max, rate = config.rate, seed, "Creating counting engine");

        Ok(Self {
            reservoir: Reservoir::new(capacity),
            inclusion: Vec::with_capacity(capacity),
            n: 0,
            n_max,
            tn: 0,
            cur_round: 0,
            total_round: 1,
            per_k: config.k,
            round_spent: 0.0,
            ln_single: 0.0,
            ln_pair: 0.0,
            last_single: 0.0,
            global_cnt: 0.0,
            node_to_cnt: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
            stats: SamplerStats::default(),
            config,
        })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn reservoir(&self) -> &Reservoir {
        &self.reservoir
    }

    /// Count `edge`, then offer it to the reservoir under the sampling schedule
    pub fn process_edge(&mut self, edge: &Edge) -> Admission {
        if edge.is_self_loop() {
            return self.record(Admission::Rejected);
        }
        if self.reservoir.contains(edge) {
            self.advance_counters();
            return self.record(Admission::Duplicate);
        }

        self.update_cnt(edge);
        self.advance_counters();

        if !self.reservoir.is_full() {
            return self.store(*edge, None, 1.0);
        }

        let p = self.admit_probability();
        if p <= 0.0 {
            trace!(round = self.cur_round, "Round budget exhausted");
            return self.record(Admission::Rejected);
        }
        self.round_spent += p;
        self.note_eviction_chance(p);
        if self.rng.gen::<f64>() < p {
            let evicted = self.delete_edge();
            self.store(*edge, evicted, p)
        } else {
            self.record(Admission::Rejected)
        }
    }

    /// Count `edge`, then store it unconditionally (evicting if full)
    pub fn process_edge_without_sampling(&mut self, edge: &Edge) -> Admission {
        if edge.is_self_loop() {
            return self.record(Admission::Rejected);
        }
        if self.reservoir.contains(edge) {
            self.advance_counters();
            return self.record(Admission::Duplicate);
        }

        self.update_cnt(edge);
        self.advance_counters();

        let evicted = if self.reservoir.is_full() {
            self.note_eviction_chance(1.0);
            self.delete_edge()
        } else {
            None
        };
        self.store(*edge, evicted, 1.0)
    }

    /// Admission probability for a sampled offer to a full reservoir:
    /// `k / n`, lowered so the round's expected replacements stay within `per_k`
    fn admit_probability(&self) -> f64 {
        let round_end = (self.cur_round + 1) * self.n_max;
        let offers_left = (round_end + 1).saturating_sub(self.tn).max(1) as f64;
        let budget_left = (self.per_k as f64 - self.round_spent).max(0.0);
        (self.config.k as f64 / self.n as f64)
            .min(budget_left / offers_left)
            .min(1.0)
    }

    /// Evict one stored edge, chosen uniformly
    pub fn delete_edge(&mut self) -> Option<Edge> {
        let slot = self.reservoir.select_victim(&mut self.rng)?;
        let evicted = self.reservoir.remove_slot(slot);
        if evicted.is_some() {
            self.stats.evictions += 1;
        }
        evicted
    }

    /// Add the triangles `edge` closes against the current sample.
    ///
    /// Runs before the edge is stored, so it can never pair with itself.
    pub fn update_cnt(&mut self, edge: &Edge) {
        if edge.is_self_loop() || self.reservoir.contains(edge) {
            return;
        }
        let common = self.reservoir.common_neighbors(edge.src, edge.dst);
        if common.is_empty() {
            return;
        }

        let mut closed = 0.0;
        for w in common {
            let (Some(a), Some(b)) = (
                self.reservoir.slot_of(edge.src, w),
                self.reservoir.slot_of(edge.dst, w),
            ) else {
                continue;
            };
            let weight = self.inverse_inclusion(a, b);
            closed += weight;
            *self.node_to_cnt.entry(w).or_insert(0.0) += weight as f32;
        }

        self.global_cnt += closed;
        *self.node_to_cnt.entry(edge.src).or_insert(0.0) += closed as f32;
        *self.node_to_cnt.entry(edge.dst).or_insert(0.0) += closed as f32;
    }

    /// 1 / P(both edges in slots `a` and `b` are stored right now)
    fn inverse_inclusion(&self, a: SlotId, b: SlotId) -> f64 {
        let (x, y) = (self.inclusion[a], self.inclusion[b]);
        let (early, late) = if x.seen_at <= y.seen_at { (x, y) } else { (y, x) };
        let ln_p = early.ln_admit
            + late.ln_admit
            + (late.single_before - early.single_after)
            + late.ln_evict
            + (self.ln_pair - late.pair_after);
        (-ln_p).exp()
    }

    /// Fold an offer that evicts with probability `chance` into the survival sums
    fn note_eviction_chance(&mut self, chance: f64) {
        let k = self.reservoir.capacity() as f64;
        let single = (1.0 - chance / k).max(f64::MIN_POSITIVE);
        let pair = (1.0 - 2.0 * chance / k).max(f64::MIN_POSITIVE);
        self.last_single = single.ln();
        self.ln_single += self.last_single;
        self.ln_pair += pair.ln();
    }

    fn advance_counters(&mut self) {
        self.tn += 1;
        self.last_single = 0.0;
        if self.n < self.n_max {
            self.n += 1;
        }

        let round = (self.tn - 1) / self.n_max;
        if round > self.cur_round {
            self.cur_round = round;
            self.total_round = round + 1;
            self.round_spent = 0.0;
            trace!(round, seen = self.tn, "Advancing sampling round");
        }
    }

    fn store(&mut self, edge: Edge, evicted: Option<Edge>, admit_probability: f64) -> Admission {
        let Some(slot) = self.reservoir.insert(edge) else {
            return self.record(Admission::Rejected);
        };
        if slot >= self.inclusion.len() {
            self.inclusion.resize(slot + 1, Inclusion::default());
        }
        let ln_evict = if evicted.is_some() {
            (1.0 - 1.0 / self.reservoir.capacity() as f64).max(f64::MIN_POSITIVE).ln()
        } else {
            0.0
        };
        self.inclusion[slot] = Inclusion {
            ln_admit: admit_probability.ln(),
            single_before: self.ln_single - self.last_single,
            single_after: self.ln_single,
            ln_evict,
            pair_after: self.ln_pair,
            seen_at: self.tn,
        };
        self.record(Admission::Stored { evicted })
    }

    fn record(&mut self, admission: Admission) -> Admission {
        match admission {
            Admission::Stored { .. } => self.stats.admitted += 1,
            Admission::Rejected => self.stats.rejected += 1,
            Admission::Duplicate => self.stats.duplicates += 1,
        }
        admission
    }

    pub fn get_global_cnt(&self) -> f64 {
        self.global_cnt
    }

    pub fn get_local_cnt(&self) -> &HashMap<VertexId, f32> {
        &self.node_to_cnt
    }

    /// Consume the engine, returning `(global, local)` counts
    pub fn into_counts(self) -> (f64, HashMap<VertexId, f32>) {
        (self.global_cnt, self.node_to_cnt)
    }

    pub fn stats(&self) -> SamplerStats {
        SamplerStats {
            seen: self.tn,
            offers: self.n,
            cur_round: self.cur_round,
            total_round: self.total_round,
            per_k: self.per_k,
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(k: usize, rate: f64) -> CountingEngine {
        CountingEngine::new(SamplerConfig::new(k, k, rate), 7).unwrap()
    }

    #[test]
    fn test_single_triangle_exact() {
        let mut e = engine(10, 1.0);
        e.process_edge(&Edge::new(1, 2));
        e.process_edge(&Edge::new(2, 3));
        assert_eq!(e.get_global_cnt(), 0.0);
        e.process_edge(&Edge::new(1, 3));

        assert_eq!(e.get_global_cnt(), 1.0);
        for v in [1, 2, 3] {
            assert_eq!(e.get_local_cnt()[&v], 1.0);
        }
    }

    #[test]
    fn test_count_before_insert() {
        let mut e = engine(10, 1.0);
        e.process_edge_without_sampling(&Edge::stored(1, 9));
        e.process_edge_without_sampling(&Edge::stored(2, 9));
        e.process_edge(&Edge::new(1, 2));
        assert_eq!(e.get_global_cnt(), 1.0);

        // re-offering a stored edge neither counts nor stores it again
        assert_eq!(e.process_edge(&Edge::new(2, 1)), Admission::Duplicate);
        assert_eq!(
            e.process_edge_without_sampling(&Edge::stored(1, 2)),
            Admission::Duplicate
        );
        assert_eq!(e.get_global_cnt(), 1.0);
        assert_eq!(e.get_local_cnt()[&9], 1.0);
        assert_eq!(e.reservoir().len(), 3);
        assert_eq!(e.stats().duplicates, 2);
    }

    #[test]
    fn test_no_self_triangle() {
        let mut e = engine(10, 1.0);
        e.process_edge(&Edge::new(1, 2));
        e.process_edge(&Edge::new(1, 2));
        assert_eq!(e.get_global_cnt(), 0.0);
        assert!(e.get_local_cnt().is_empty());
    }

    #[test]
    fn test_mandatory_eviction_single_slot() {
        let mut e = engine(1, 1.0);

        e.process_edge_without_sampling(&Edge::stored(1, 2));
        let admission = e.process_edge_without_sampling(&Edge::stored(3, 4));

        assert_eq!(admission, Admission::Stored { evicted: Some(Edge::stored(1, 2)) });
        assert_eq!(e.reservoir().len(), 1);
        assert_eq!(e.reservoir().edges().next(), Some(&Edge::stored(3, 4)));
        assert_eq!(e.stats().evictions, 1);
    }

    #[test]
    fn test_self_loop_never_evicts() {
        let mut e = engine(2, 1.0);
        e.process_edge_without_sampling(&Edge::stored(1, 2));
        e.process_edge_without_sampling(&Edge::stored(2, 3));
        assert!(e.reservoir().is_full());

        assert_eq!(e.process_edge_without_sampling(&Edge::stored(4, 4)), Admission::Rejected);
        assert_eq!(e.process_edge(&Edge::new(5, 5)), Admission::Rejected);
        assert_eq!(e.reservoir().len(), 2);
        assert_eq!(e.stats().evictions, 0);
        assert_eq!(e.stats().seen, 2);
    }

    #[test]
    fn test_pair_weight_after_mandatory_eviction() {
        // one uniform eviction from three slots keeps a given pair with
        // probability 1/3, so the closed triangle weighs 3
        let mut e = engine(3, 1.0);
        e.process_edge_without_sampling(&Edge::stored(1, 9));
        e.process_edge_without_sampling(&Edge::stored(2, 9));
        e.process_edge_without_sampling(&Edge::stored(5, 6));
        e.process_edge_without_sampling(&Edge::stored(7, 8));

        let wedge_kept = e.reservoir().slot_of(1, 9).is_some() && e.reservoir().slot_of(2, 9).is_some();
        e.process_edge(&Edge::new(1, 2));
        if wedge_kept {
            assert!((e.get_global_cnt() - 3.0).abs() < 1e-9);
        } else {
            assert_eq!(e.get_global_cnt(), 0.0);
        }
    }

    #[test]
    fn test_admitting_offer_always_evicts_older_edge_weight() {
        // k = 2, rate = 0.5: the third edge is admitted with p = 2/3 and then
        // evicts one of two stored edges, so the surviving wedge has
        // probability 2/3 * 1/2 and the triangle weighs 3
        let mut checked = false;
        for seed in 0..200 {
            let mut e = CountingEngine::new(SamplerConfig::new(2, 2, 0.5), seed).unwrap();
            e.process_edge(&Edge::new(1, 9));
            e.process_edge(&Edge::new(5, 6));
            e.process_edge(&Edge::new(2, 9));
            if e.reservoir().slot_of(1, 9).is_none() || e.reservoir().slot_of(2, 9).is_none() {
                continue;
            }
            e.process_edge(&Edge::new(1, 2));
            assert!((e.get_global_cnt() - 3.0).abs() < 1e-9, "weight {}", e.get_global_cnt());
            checked = true;
            break;
        }
        assert!(checked);
    }

    #[test]
    fn test_round_budget_bounds_expected_replacements() {
        // n_max = 20; after the reservoir fills, k / n alone would offer
        // about k * ln(5) expected replacements in the first round
        let mut e = engine(4, 0.2);
        for i in 0..20u64 {
            e.process_edge(&Edge::new(i, i + 1000));
            assert!(e.round_spent <= 4.0 + 1e-9);
        }
        assert!(e.round_spent > 0.0);
        assert_eq!(e.stats().cur_round, 0);

        // the next round starts with a fresh budget
        e.process_edge(&Edge::new(50, 1050));
        assert_eq!(e.stats().cur_round, 1);
        assert!(e.round_spent <= 4.0 / 20.0 + 1e-9);
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert_eq!(
            CountingEngine::new(SamplerConfig::new(0, 10, 1.0), 0).err(),
            Some(SamplingError::ZeroCapacity)
        );
        assert!(matches!(
            CountingEngine::new(SamplerConfig::new(20, 10, 1.0), 0).err(),
            Some(SamplingError::CapacityExceedsTotalSpace { k: 20, total_space: 10 })
        ));
        assert!(CountingEngine::new(SamplerConfig::new(10, 10, 0.0), 0).is_err());
        assert!(CountingEngine::new(SamplerConfig::new(10, 10, 1.5), 0).is_err());
    }

    #[test]
    fn test_rounds_advance_with_seen_edges() {
        // n_max = ceil(4 / 0.5) = 8 seen edges per round
        let mut e = engine(4, 0.5);
        for i in 0..20u64 {
            e.process_edge(&Edge::new(i, i + 1000));
        }
        let stats = e.stats();
        assert_eq!(stats.seen, 20);
        assert_eq!(stats.offers, 8);
        assert_eq!(stats.cur_round, 2);
        assert_eq!(stats.total_round, 3);
        assert_eq!(stats.per_k, 4);
        assert_eq!(stats.admitted + stats.rejected, 20);
    }

    #[test]
    fn test_seeded_engines_are_reproducible() {
        let run = |seed| {
            let mut e = CountingEngine::new(SamplerConfig::new(16, 16, 0.25), seed).unwrap();
            for i in 0..200u64 {
                e.process_edge(&Edge::new(i % 17, (i * 7) % 23 + 17));
            }
            (e.get_global_cnt(), e.stats())
        };
        assert_eq!(run(3), run(3));
    }
}
