//! Weighted random choice of successor stations.

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::graph::{NodeId, StationGraph, is_zigzag};
use crate::stations::{StationContext, StationId};

/// Total weight below which a draw falls back to uniform.
const UNIFORM_THRESHOLD: f64 = 1e-7;

/// Deterministic generator for `Some(seed)`, entropy-seeded otherwise.
pub(crate) fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Trips from every station already on the route to each candidate.
pub(crate) fn flow_weights(context: &StationContext, route: &[StationId], candidates: &[StationId]) -> Vec<f64> {
    candidates
        .iter()
        .map(|&candidate| {
            route
                .iter()
                .map(|&station| context.flow(station, candidate) as f64)
                .sum()
        })
        .collect()
}

/// Index drawn in proportion to `weights`. Uniform when the weights are
/// all (near) zero or unusable.
pub(crate) fn pick_index<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if total.is_finite() && total >= UNIFORM_THRESHOLD {
        if let Ok(distribution) = WeightedIndex::new(weights) {
            return Some(distribution.sample(rng));
        }
    }
    Some(rng.gen_range(0..weights.len()))
}

/// Draw candidates without replacement until one does not zigzag away from
/// `route`. Every rejected candidate is removed from `candidates` (and its
/// weight from `weights`) for good.
pub(crate) fn draw_admissible<R: Rng + ?Sized>(
    rng: &mut R,
    context: &StationContext,
    graph: &StationGraph,
    route: &[StationId],
    candidates: &mut Vec<NodeId>,
    weights: &mut Vec<f64>,
) -> Option<NodeId> {
    debug_assert_eq!(candidates.len(), weights.len());
    while let Some(i) = pick_index(rng, weights) {
        let candidate = candidates.swap_remove(i);
        weights.swap_remove(i);
        let station = graph.node(candidate).id();
        if !is_zigzag(context, station, route) {
            return Some(candidate);
        }
        trace!(%station, "zigzag candidate rejected");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, D, O, P, Z};

    #[test]
    fn zero_weights_draw_uniformly() {
        let mut rng = seeded_rng(Some(1));
        let mut seen = [false; 3];
        for _ in 0..200 {
            seen[pick_index(&mut rng, &[0.0, 0.0, 0.0]).unwrap()] = true;
        }
        assert_eq!(seen, [true; 3]);
        assert_eq!(pick_index(&mut rng, &[]), None);
    }

    #[test]
    fn weights_are_respected() {
        let mut rng = seeded_rng(Some(2));
        for _ in 0..100 {
            assert_eq!(pick_index(&mut rng, &[0.0, 0.0, 5.0]), Some(2));
        }
    }

    #[test]
    fn unusable_weights_fall_back_to_uniform() {
        let mut rng = seeded_rng(Some(3));
        for _ in 0..50 {
            let i = pick_index(&mut rng, &[1.0, f64::NAN]).unwrap();
            assert!(i < 2);
        }
    }

    #[test]
    fn seeded_generators_repeat() {
        let mut a = seeded_rng(Some(9));
        let mut b = seeded_rng(Some(9));
        let xs: Vec<u32> = (0..8).map(|_| a.gen_range(0..1000)).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.gen_range(0..1000)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn flow_weights_sum_over_the_route() {
        let context = fixtures::three_path_network();
        let weights = flow_weights(
            &context,
            &[fixtures::O, fixtures::A],
            &[fixtures::C, fixtures::D],
        );
        assert_eq!(weights, vec![2.0 + 3.0, 4.0 + 6.0]);
    }

    #[test]
    fn zigzag_candidates_are_never_drawn() {
        let context = fixtures::zigzag_network();
        let graph = fixtures::graph_of(&context, O, D);
        let (z, d) = (graph.node_of(Z).unwrap(), graph.node_of(D).unwrap());

        for seed in 0..20 {
            let mut rng = seeded_rng(Some(seed));
            let mut candidates = vec![z, d];
            let mut weights = vec![1000.0, 0.001];
            let drawn = draw_admissible(&mut rng, &context, &graph, &[O, P], &mut candidates, &mut weights);
            assert_eq!(drawn, Some(d));
            assert!(!candidates.contains(&d));
            assert_eq!(candidates.len(), weights.len());
        }

        let mut rng = seeded_rng(Some(0));
        let mut candidates = vec![z];
        let mut weights = vec![1.0];
        assert_eq!(
            draw_admissible(&mut rng, &context, &graph, &[O, P], &mut candidates, &mut weights),
            None
        );
        assert!(candidates.is_empty());
    }
}
