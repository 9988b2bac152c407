//! Flow: observed trips served between every ordered pair of stops on the
//! route. Higher is better.

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;

use super::exact::count_ratio;
use super::topology::{PathCounts, Topology};
use super::{Criterion, normalize_ascending};
use crate::graph::NodeId;
use crate::stations::{Station, StationContext, StationId};

pub struct FlowCriterion {
    context: Arc<StationContext>,
    positions: Vec<Option<usize>>,
    counts: Option<PathCounts>,
    /// Expected flow among the stops from a position onward, over all paths
    /// from that position to the destination.
    onward: Vec<f64>,
    /// `across[k][p]`, `p < k`: expected flow from the stop at `p` to the
    /// stops from `k` onward.
    across: Vec<Vec<f64>>,
}

impl FlowCriterion {
    pub fn new(context: Arc<StationContext>) -> Self {
        Self {
            context,
            positions: Vec::new(),
            counts: None,
            onward: Vec::new(),
            across: Vec::new(),
        }
    }

    fn position(&self, node: NodeId) -> Option<usize> {
        self.positions.get(node.index()).copied().flatten()
    }

    /// Number of paths from `from` to `to` in the initialised graph.
    pub fn route_count(&self, from: NodeId, to: NodeId) -> Option<&BigUint> {
        let counts = self.counts.as_ref()?;
        Some(counts.get(self.position(from)?, self.position(to)?))
    }
}

impl Criterion for FlowCriterion {
    fn name(&self) -> &'static str {
        "Flow"
    }

    fn evaluate(&self, route: &[Arc<Station>]) -> f64 {
        let mut total: u64 = 0;
        for (i, from) in route.iter().enumerate() {
            for to in &route[i + 1..] {
                total = total.saturating_add(self.context.flow(from.id, to.id));
            }
        }
        total as f64
    }

    fn at_least_as_good(&self, a: f64, b: f64) -> bool {
        a >= b
    }

    fn normalize(&self, value: f64, min: f64, max: f64) -> f64 {
        normalize_ascending(value, min, max)
    }

    fn init_estimator(&mut self, topology: &Topology<'_>) {
        let size = topology.len();
        let destination = topology.destination();
        let counts = topology.counts();
        let ids: Vec<StationId> = (0..size).map(|i| topology.id_at(i)).collect();
        let flow = |p: usize, q: usize| self.context.flow(ids[p], ids[q]);

        // paths(i → q) × paths(q → destination), for q >= i.
        let through = |i: usize, q: usize| counts.get(i, q) * counts.get(q, destination);

        // Flow from p to every later stop, summed over all p → destination paths.
        let outgoing: Vec<BigUint> = (0..size)
            .map(|p| {
                (p + 1..=destination).fold(BigUint::zero(), |acc, q| match flow(p, q) {
                    0 => acc,
                    trips => acc + through(p, q) * trips,
                })
            })
            .collect();

        let mut onward = vec![0.0; size];
        let mut across = vec![Vec::new(); size];
        for k in 0..destination {
            let total = counts.get(k, destination);
            let weighted = (k..destination).fold(BigUint::zero(), |acc, p| {
                if outgoing[p].is_zero() {
                    acc
                } else {
                    acc + counts.get(k, p) * &outgoing[p]
                }
            });
            onward[k] = count_ratio(&weighted, total);

            across[k] = (0..k)
                .map(|p| {
                    let weighted = (k..=destination).fold(BigUint::zero(), |acc, q| match flow(p, q) {
                        0 => acc,
                        trips => acc + through(k, q) * trips,
                    });
                    count_ratio(&weighted, total)
                })
                .collect();
        }

        self.positions = topology.positions().to_vec();
        self.counts = Some(counts.clone());
        self.onward = onward;
        self.across = across;
    }

    fn predict_gain(&self, path: &[NodeId], candidate: NodeId) -> f64 {
        let Some(k) = self.position(candidate) else {
            return 0.0;
        };
        let Some(across) = self.across.get(k) else {
            return 0.0;
        };
        let from_path: f64 = path
            .iter()
            .filter_map(|&node| self.position(node))
            .filter_map(|p| across.get(p))
            .sum();
        from_path + self.onward[k]
    }
}
