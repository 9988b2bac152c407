//! Total travel time: in-vehicle time plus a fixed dwell at every
//! intermediate stop. Lower is better.

use std::sync::Arc;

use tracing::warn;

use super::exact::ExactSum;
use super::topology::Topology;
use super::{Criterion, normalize_descending};
use crate::graph::NodeId;
use crate::stations::{Station, StationContext, StationId};

/// Seconds spent at each intermediate stop.
pub const DWELL_SECONDS: f64 = 90.0;

pub struct TotalTimeCriterion {
    context: Arc<StationContext>,
    positions: Vec<Option<usize>>,
    arena_ids: Vec<StationId>,
    /// Mean time from each position to the destination over all paths.
    average_remaining: Vec<f64>,
}

impl TotalTimeCriterion {
    pub fn new(context: Arc<StationContext>) -> Self {
        Self {
            context,
            positions: Vec::new(),
            arena_ids: Vec::new(),
            average_remaining: Vec::new(),
        }
    }

    /// Mean remaining time from `node` to the destination, if initialised.
    pub fn average_remaining(&self, node: NodeId) -> Option<f64> {
        let position = self.positions.get(node.index()).copied().flatten()?;
        self.average_remaining.get(position).copied()
    }
}

impl Criterion for TotalTimeCriterion {
    fn name(&self) -> &'static str {
        "TotalTime"
    }

    fn evaluate(&self, route: &[Arc<Station>]) -> f64 {
        if route.len() < 2 {
            warn!(
                station = ?route.first().map(|s| s.id),
                "timing a route with fewer than two stations"
            );
        }
        let travel: f64 = route
            .windows(2)
            .map(|pair| self.context.travel_time(pair[0].id, pair[1].id))
            .sum();
        travel + route.len().saturating_sub(2) as f64 * DWELL_SECONDS
    }

    fn at_least_as_good(&self, a: f64, b: f64) -> bool {
        a <= b
    }

    fn normalize(&self, value: f64, min: f64, max: f64) -> f64 {
        normalize_descending(value, min, max)
    }

    fn init_estimator(&mut self, topology: &Topology<'_>) {
        let size = topology.len();
        let destination = topology.destination();
        let counts = topology.counts();

        let mut average = vec![0.0; size];
        for i in (0..destination).rev() {
            let from = topology.id_at(i);
            let mut total = ExactSum::default();
            for &next in topology.successors_at(i) {
                let leg = self.context.travel_time(from, topology.id_at(next));
                total.add_scaled(average[next] + leg + DWELL_SECONDS, counts.get(next, destination));
            }
            average[i] = total.quotient(counts.get(i, destination));
        }

        self.positions = topology.positions().to_vec();
        self.arena_ids = topology.arena_ids();
        self.average_remaining = average;
    }

    fn predict_gain(&self, path: &[NodeId], candidate: NodeId) -> f64 {
        let Some(position) = self.positions.get(candidate.index()).copied().flatten() else {
            return 0.0;
        };
        let leg = path.last().map_or(0.0, |last| {
            self.context
                .travel_time(self.arena_ids[last.index()], self.arena_ids[candidate.index()])
        });
        leg + DWELL_SECONDS + self.average_remaining[position]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, A, B, C, D, O};
    use crate::stations::BUS_SPEED;

    fn route(context: &StationContext, ids: &[StationId]) -> Vec<Arc<Station>> {
        ids.iter().map(|&id| Arc::clone(context.station(id).unwrap())).collect()
    }

    #[test]
    fn evaluates_travel_plus_dwell() {
        let context = fixtures::three_path_network();
        let criterion = TotalTimeCriterion::new(Arc::clone(&context));

        let direct = criterion.evaluate(&route(&context, &[O, C, D]));
        assert!((direct - (3000.0 / BUS_SPEED + DWELL_SECONDS)).abs() < 1e-9);

        let via_a = criterion.evaluate(&route(&context, &[O, A, C, D]));
        let metres = 2.0 * 2f64.sqrt() * 1000.0 + 1000.0;
        assert!((via_a - (metres / BUS_SPEED + 2.0 * DWELL_SECONDS)).abs() < 1e-9);

        assert!(criterion.at_least_as_good(direct, via_a));
        assert!(!criterion.at_least_as_good(via_a, direct));
    }

    #[test]
    fn single_station_route_has_no_time() {
        let context = fixtures::three_path_network();
        let criterion = TotalTimeCriterion::new(Arc::clone(&context));
        assert_eq!(criterion.evaluate(&route(&context, &[O])), 0.0);
    }

    #[test]
    fn estimator_averages_over_all_completions() {
        let context = fixtures::three_path_network();
        let graph = fixtures::graph_of(&context, O, D);
        let mut criterion = TotalTimeCriterion::new(Arc::clone(&context));
        criterion.init_estimator(&Topology::new(&graph));

        let node = |id| graph.node_of(id).unwrap();
        let leg = |a, b| context.travel_time(a, b) + DWELL_SECONDS;

        assert_eq!(criterion.average_remaining(node(D)), Some(0.0));
        let from_c = leg(C, D);
        assert!((criterion.average_remaining(node(C)).unwrap() - from_c).abs() < 1e-9);
        let from_o = (leg(O, A) + leg(A, C) + from_c
            + leg(O, B) + leg(B, C) + from_c
            + leg(O, C) + from_c)
            / 3.0;
        assert!((criterion.average_remaining(node(O)).unwrap() - from_o).abs() < 1e-9);

        // Predicting through C from [O] sees the O→C hop and the C→D tail.
        let predicted = criterion.predict_gain(&[node(O)], node(C));
        assert!((predicted - (leg(O, C) + from_c)).abs() < 1e-9);
        // Evaluate counts one dwell fewer than the per-hop prediction.
        let evaluated = criterion.evaluate(&route(&context, &[O, C, D]));
        assert!((predicted - evaluated - DWELL_SECONDS).abs() < 1e-9);
    }

    #[test]
    fn uninitialised_prediction_is_zero() {
        let context = fixtures::three_path_network();
        let criterion = TotalTimeCriterion::new(context);
        assert_eq!(criterion.predict_gain(&[], NodeId(0)), 0.0);
    }
}
