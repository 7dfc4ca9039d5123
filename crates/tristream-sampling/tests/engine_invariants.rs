use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tristream_sampling::{CountingEngine, Edge, SamplerConfig};

fn random_stream(seed: u64, len: usize, vertices: u64) -> Vec<Edge> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            let src = rng.gen_range(0..vertices);
            let mut dst = rng.gen_range(0..vertices);
            if dst == src {
                dst = (dst + 1) % vertices;
            }
            Edge { src, dst, do_store: rng.gen_bool(0.3) }
        })
        .collect()
}

#[test]
fn test_reservoir_bound_and_consistency_hold_after_every_edge() {
    for seed in [1, 2] {
        let config = SamplerConfig::new(25, 40, 0.3);
        let mut engine = CountingEngine::new(config, seed).unwrap();

        for edge in random_stream(seed, 2_000, 60) {
            if edge.do_store {
                engine.process_edge_without_sampling(&edge);
            } else {
                engine.process_edge(&edge);
            }
            let reservoir = engine.reservoir();
            assert!(reservoir.len() <= 25);
            assert!(reservoir.len() <= 40);
            assert!(reservoir.check_consistency(), "indexes drifted with seed {}", seed);
        }
        assert!(engine.stats().evictions > 0);
    }
}

#[test]
fn test_full_capacity_counts_clique_exactly() {
    // K5 has 10 triangles; with room for every edge nothing is ever estimated
    let mut engine = CountingEngine::new(SamplerConfig::new(10, 10, 1.0), 0).unwrap();
    for u in 0..5u64 {
        for v in (u + 1)..5 {
            engine.process_edge(&Edge::new(u, v));
        }
    }
    assert_eq!(engine.get_global_cnt(), 10.0);
    for v in 0..5u64 {
        assert_eq!(engine.get_local_cnt()[&v], 6.0);
    }
}

#[test]
fn test_sampled_estimate_is_in_the_right_range() {
    // K12: 220 triangles, 66 edges, reservoir holds half of them
    let mut edges = Vec::new();
    for u in 0..12u64 {
        for v in (u + 1)..12 {
            edges.push(Edge::new(u, v));
        }
    }

    let trials = 200;
    let mut total = 0.0;
    for seed in 0..trials {
        let mut engine = CountingEngine::new(SamplerConfig::new(33, 33, 1.0), seed).unwrap();
        for edge in &edges {
            engine.process_edge(edge);
        }
        total += engine.get_global_cnt();
    }
    let mean = total / trials as f64;
    assert!(mean > 150.0 && mean < 300.0, "mean estimate {} too far from 220", mean);
}

fn clique(n: u64) -> Vec<Edge> {
    let mut edges = Vec::new();
    for u in 0..n {
        for v in (u + 1)..n {
            edges.push(Edge::new(u, v));
        }
    }
    edges
}

fn mean_estimate(edges: &[Edge], config: SamplerConfig, trials: u64) -> f64 {
    let mut total = 0.0;
    for seed in 0..trials {
        let mut engine = CountingEngine::new(config, seed).unwrap();
        for edge in edges {
            engine.process_edge(edge);
        }
        total += engine.get_global_cnt();
    }
    total / trials as f64
}

#[test]
fn test_low_rate_estimate_stays_centered() {
    // K16: 560 triangles over 120 edges. At rate 0.2 the first round's
    // replacement budget binds, which must not pull the mean down.
    let edges = clique(16);
    let mean = mean_estimate(&edges, SamplerConfig::new(30, 30, 0.2), 500);
    assert!(mean > 515.0 && mean < 605.0, "mean estimate {} too far from 560", mean);
}

#[test]
fn test_reversed_duplicates_do_not_inflate_the_count() {
    // every edge listed in both orientations, with room for all of them
    let mut edges = Vec::new();
    for edge in clique(6) {
        edges.push(edge);
        edges.push(Edge::new(edge.dst, edge.src));
    }
    let mut engine = CountingEngine::new(SamplerConfig::new(15, 15, 1.0), 0).unwrap();
    for edge in &edges {
        engine.process_edge(edge);
    }
    assert_eq!(engine.get_global_cnt(), 20.0);
    assert_eq!(engine.stats().duplicates, 15);
}
