//! Topological view of a station graph plus exact path counts.

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::graph::{NodeId, StationGraph};
use crate::stations::{Station, StationId};

/// `counts[i][j]`: number of paths from the node at topological position `i`
/// to the node at position `j`, using only nodes at positions `<= j`.
/// Zero for `i > j`, one for `i == j`.
#[derive(Debug, Clone)]
pub struct PathCounts {
    size: usize,
    counts: Vec<BigUint>,
}

impl PathCounts {
    /// Compute from successor lists given by topological position.
    pub(crate) fn compute(successors: &[Vec<usize>]) -> Self {
        let size = successors.len();
        let mut counts = vec![BigUint::zero(); size * size];
        for j in 0..size {
            counts[j * size + j] = BigUint::one();
            for i in (0..j).rev() {
                let total = successors[i]
                    .iter()
                    .filter(|&&s| s <= j)
                    .fold(BigUint::zero(), |acc, &s| acc + &counts[s * size + j]);
                counts[i * size + j] = total;
            }
        }
        Self { size, counts }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Paths from position `from` to position `to`.
    pub fn get(&self, from: usize, to: usize) -> &BigUint {
        &self.counts[from * self.size + to]
    }
}

/// A graph in topological order, as estimators consume it.
pub struct Topology<'g> {
    graph: &'g StationGraph,
    order: Vec<NodeId>,
    position: Vec<Option<usize>>,
    successors: Vec<Vec<usize>>,
    counts: PathCounts,
}

impl<'g> Topology<'g> {
    /// Sort `graph` topologically and count paths between every ordered pair.
    pub fn new(graph: &'g StationGraph) -> Self {
        let order = graph.topological_order();
        let mut position = vec![None; graph.len()];
        for (i, id) in order.iter().enumerate() {
            position[id.index()] = Some(i);
        }
        let successors: Vec<Vec<usize>> = order
            .iter()
            .map(|&id| {
                graph
                    .node(id)
                    .successors()
                    .iter()
                    .filter_map(|s| position[s.index()])
                    .collect()
            })
            .collect();
        let counts = PathCounts::compute(&successors);
        Self {
            graph,
            order,
            position,
            successors,
            counts,
        }
    }

    pub fn graph(&self) -> &'g StationGraph {
        self.graph
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Topological position of every arena node, `None` for nodes left out
    /// of the order.
    pub fn positions(&self) -> &[Option<usize>] {
        &self.position
    }

    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.position.get(node.index()).copied().flatten()
    }

    /// Position of the destination, the last one in the order.
    pub fn destination(&self) -> usize {
        self.position(self.graph.destination())
            .unwrap_or_else(|| self.order.len().saturating_sub(1))
    }

    pub fn station_at(&self, position: usize) -> &'g Arc<Station> {
        self.graph.node(self.order[position]).station()
    }

    pub fn id_at(&self, position: usize) -> StationId {
        self.station_at(position).id
    }

    pub fn successors_at(&self, position: usize) -> &[usize] {
        &self.successors[position]
    }

    pub fn counts(&self) -> &PathCounts {
        &self.counts
    }

    /// Station id of every arena node, indexed by [`NodeId::index`].
    pub(crate) fn arena_ids(&self) -> Vec<StationId> {
        self.graph.nodes().iter().map(|n| n.id()).collect()
    }
}
