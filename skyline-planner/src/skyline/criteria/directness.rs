//! Directness: mean detour ratio (distance travelled on the route divided by
//! the straight road distance) over every ordered pair of stops. Lower is
//! better; a perfectly direct route scores 1.

use std::sync::Arc;

use num_traits::Zero;

use super::exact::{ExactSum, count_ratio};
use super::topology::Topology;
use super::{Criterion, normalize_descending};
use crate::graph::NodeId;
use crate::stations::{Station, StationContext, StationId};

pub struct DirectnessCriterion {
    context: Arc<StationContext>,
    positions: Vec<Option<usize>>,
    /// `from_prefix[u][k]`, `u < k`: expected detour ratio from the stop at
    /// `u` to the stops from `k` onward, per path from `k`.
    from_prefix: Vec<Vec<f64>>,
    /// Expected detour-ratio sum among the stops from `k` onward, per path.
    onward: Vec<f64>,
}

impl DirectnessCriterion {
    pub fn new(context: Arc<StationContext>) -> Self {
        Self {
            context,
            positions: Vec::new(),
            from_prefix: Vec::new(),
            onward: Vec::new(),
        }
    }

    fn position(&self, node: NodeId) -> Option<usize> {
        self.positions.get(node.index()).copied().flatten()
    }
}

impl Criterion for DirectnessCriterion {
    fn name(&self) -> &'static str {
        "Directness"
    }

    /// Routes with no measurable pair of stops score 1.
    fn evaluate(&self, route: &[Arc<Station>]) -> f64 {
        let mut travelled = Vec::with_capacity(route.len());
        let mut so_far = 0.0;
        for (i, station) in route.iter().enumerate() {
            if i > 0 {
                so_far += self.context.distance(route[i - 1].id, station.id);
            }
            travelled.push(so_far);
        }

        let mut sum = 0.0;
        let mut pairs = 0usize;
        for i in 0..route.len() {
            for j in i + 1..route.len() {
                let straight = self.context.distance(route[i].id, route[j].id);
                if straight > 0.0 {
                    sum += (travelled[j] - travelled[i]) / straight;
                    pairs += 1;
                }
            }
        }
        if pairs == 0 { 1.0 } else { sum / pairs as f64 }
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
        let ids: Vec<StationId> = (0..size).map(|i| topology.id_at(i)).collect();
        let distance: Vec<Vec<f64>> = ids
            .iter()
            .map(|&from| ids.iter().map(|&to| self.context.distance(from, to)).collect())
            .collect();

        // Mean travelled distance from i to j over all i → j paths; the
        // straight distance when no path exists.
        let mut travelled = vec![vec![0.0; size]; size];
        for j in 0..size {
            let mut accumulated = vec![ExactSum::default(); j + 1];
            for i in (0..j).rev() {
                let mut total = ExactSum::default();
                for &next in topology.successors_at(i).iter().filter(|&&s| s <= j) {
                    total.add(&accumulated[next]);
                    total.add_scaled(distance[i][next], counts.get(next, j));
                }
                let paths = counts.get(i, j);
                travelled[i][j] = if paths.is_zero() {
                    distance[i][j]
                } else {
                    total.quotient(paths)
                };
                accumulated[i] = total;
            }
        }

        let ratio: Vec<Vec<f64>> = (0..size)
            .map(|u| {
                (0..size)
                    .map(|v| match distance[u][v] {
                        d if v > u && d > 0.0 => travelled[u][v] / d,
                        _ => 0.0,
                    })
                    .collect()
            })
            .collect();

        // Ratio mass from u to every later stop, over all u → destination paths.
        let outgoing: Vec<ExactSum> = (0..size)
            .map(|u| {
                let mut sum = ExactSum::default();
                for v in u + 1..size {
                    if ratio[u][v] != 0.0 {
                        sum.add_scaled(ratio[u][v], &(counts.get(u, v) * counts.get(v, destination)));
                    }
                }
                sum
            })
            .collect();

        let mut from_prefix = vec![vec![0.0; size]; size];
        let mut onward = vec![0.0; size];
        for k in 0..size {
            let total = counts.get(k, destination);
            if total.is_zero() {
                continue;
            }
            // Share of k → destination paths passing through each later stop.
            let share: Vec<f64> = (k..size)
                .map(|v| count_ratio(&(counts.get(k, v) * counts.get(v, destination)), total))
                .collect();
            for (u, row) in from_prefix.iter_mut().enumerate().take(k) {
                row[k] = (k..size).map(|v| share[v - k] * ratio[u][v]).sum();
            }

            let mut weighted = ExactSum::default();
            for u in k..size {
                weighted.add_product(&outgoing[u], counts.get(k, u));
            }
            onward[k] = weighted.quotient(total);
        }

        self.positions = topology.positions().to_vec();
        self.from_prefix = from_prefix;
        self.onward = onward;
    }

    fn predict_gain(&self, path: &[NodeId], candidate: NodeId) -> f64 {
        let Some(k) = self.position(candidate) else {
            return 0.0;
        };
        let from_path: f64 = path
            .iter()
            .filter_map(|&node| self.position(node))
            .filter(|&u| u < k)
            .map(|u| self.from_prefix[u][k])
            .sum();
        from_path + self.onward[k]
    }
}
