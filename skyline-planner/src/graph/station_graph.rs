//! Arena-backed station graph.
//!
//! Nodes live in a `Vec` and refer to each other by [`NodeId`]. Removing a
//! node swap-removes it from the arena, so ids are only stable until the next
//! [`StationGraph::drop_node`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use num_bigint::BigUint;
use num_traits::{One, Zero};
use tracing::warn;

use crate::stations::{Station, StationId};

/// Index of a node in its graph's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A station plus its edges inside one graph.
pub struct StationNode {
    station: Arc<Station>,
    predecessors: Vec<NodeId>,
    successors: Vec<NodeId>,
    hits: AtomicU64,
}

impl StationNode {
    fn new(station: Arc<Station>) -> Self {
        Self {
            station,
            predecessors: Vec::new(),
            successors: Vec::new(),
            hits: AtomicU64::new(0),
        }
    }

    pub fn station(&self) -> &Arc<Station> {
        &self.station
    }

    pub fn id(&self) -> StationId {
        self.station.id
    }

    pub fn predecessors(&self) -> &[NodeId] {
        &self.predecessors
    }

    pub fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    /// How often a search has passed through this node.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }
}

impl Clone for StationNode {
    fn clone(&self) -> Self {
        Self {
            station: Arc::clone(&self.station),
            predecessors: self.predecessors.clone(),
            successors: self.successors.clone(),
            hits: AtomicU64::new(self.hits()),
        }
    }
}

impl fmt::Debug for StationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationNode")
            .field("station", &self.station.id)
            .field("predecessors", &self.predecessors)
            .field("successors", &self.successors)
            .field("hits", &self.hits())
            .finish()
    }
}

/// Successor-count statistics over the nodes that have successors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChoiceStats {
    pub min: usize,
    pub mean: f64,
    pub max: usize,
}

/// Directed station graph between a fixed origin and destination.
#[derive(Debug, Clone)]
pub struct StationGraph {
    origin: NodeId,
    destination: NodeId,
    waypoints: Vec<NodeId>,
    nodes: Vec<StationNode>,
    index: HashMap<StationId, NodeId>,
}

impl StationGraph {
    /// A graph holding only its two endpoints, with no edges.
    pub(crate) fn with_endpoints(origin: Arc<Station>, destination: Arc<Station>) -> Self {
        let mut graph = Self {
            origin: NodeId(0),
            destination: NodeId(0),
            waypoints: Vec::new(),
            nodes: Vec::new(),
            index: HashMap::new(),
        };
        graph.origin = graph.insert_node(origin).0;
        graph.destination = graph.insert_node(destination).0;
        graph
    }

    pub fn origin(&self) -> NodeId {
        self.origin
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Intermediate stops the graph was built through, in visiting order.
    pub fn waypoints(&self) -> &[NodeId] {
        &self.waypoints
    }

    pub fn node(&self, id: NodeId) -> &StationNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[StationNode] {
        &self.nodes
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Node holding the station with this id.
    pub fn node_of(&self, station: StationId) -> Option<NodeId> {
        self.index.get(&station).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.successors.len()).sum()
    }

    /// Stations along a path of nodes.
    pub fn stations_of(&self, path: &[NodeId]) -> Vec<Arc<Station>> {
        path.iter()
            .map(|&id| Arc::clone(&self.nodes[id.0].station))
            .collect()
    }

    /// Station ids along a path of nodes.
    pub fn ids_of(&self, path: &[NodeId]) -> Vec<StationId> {
        path.iter().map(|&id| self.nodes[id.0].id()).collect()
    }

    /// Register a station, returning its node and whether it was new.
    pub(crate) fn insert_node(&mut self, station: Arc<Station>) -> (NodeId, bool) {
        if let Some(&existing) = self.index.get(&station.id) {
            return (existing, false);
        }
        let id = NodeId(self.nodes.len());
        self.index.insert(station.id, id);
        self.nodes.push(StationNode::new(station));
        (id, true)
    }

    /// Add `from → to` unless already present.
    pub(crate) fn link(&mut self, from: NodeId, to: NodeId) {
        if self.nodes[from.0].successors.contains(&to) {
            return;
        }
        self.nodes[from.0].successors.push(to);
        self.nodes[to.0].predecessors.push(from);
    }

    pub(crate) fn unlink(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from.0].successors.retain(|&s| s != to);
        self.nodes[to.0].predecessors.retain(|&p| p != from);
    }

    pub(crate) fn set_successors(&mut self, id: NodeId, successors: Vec<NodeId>) {
        self.nodes[id.0].successors = successors;
    }

    pub(crate) fn push_waypoint(&mut self, id: NodeId) {
        self.waypoints.push(id);
    }

    pub(crate) fn set_destination(&mut self, id: NodeId) {
        self.destination = id;
    }

    /// Recompute every predecessor list from the successor lists.
    pub(crate) fn rebuild_predecessors(&mut self) {
        for node in &mut self.nodes {
            node.predecessors.clear();
        }
        for from in 0..self.nodes.len() {
            for i in 0..self.nodes[from].successors.len() {
                let to = self.nodes[from].successors[i];
                self.nodes[to.0].predecessors.push(NodeId(from));
            }
        }
    }

    /// Sort every edge list by ascending station id.
    pub(crate) fn normalize_edges(&mut self) {
        let ids: Vec<StationId> = self.nodes.iter().map(StationNode::id).collect();
        for node in &mut self.nodes {
            node.successors.sort_by_key(|s| ids[s.0]);
            node.predecessors.sort_by_key(|p| ids[p.0]);
        }
    }

    /// Keep only nodes reachable from the origin along successors.
    /// The two endpoints are always kept.
    pub(crate) fn compact(&mut self) {
        let mut keep = vec![false; self.nodes.len()];
        let mut stack = vec![self.origin];
        keep[self.origin.0] = true;
        while let Some(id) = stack.pop() {
            for &next in &self.nodes[id.0].successors {
                if !keep[next.0] {
                    keep[next.0] = true;
                    stack.push(next);
                }
            }
        }
        keep[self.destination.0] = true;
        self.retain(&keep);
    }

    fn retain(&mut self, keep: &[bool]) {
        if keep.iter().all(|&k| k) {
            return;
        }
        let mut remap = vec![None; self.nodes.len()];
        let mut next = 0;
        for (old, &kept) in keep.iter().enumerate() {
            if kept {
                remap[old] = Some(NodeId(next));
                next += 1;
            }
        }
        let translate = |edges: &[NodeId]| -> Vec<NodeId> {
            edges.iter().filter_map(|e| remap[e.0]).collect()
        };

        let old_nodes = std::mem::take(&mut self.nodes);
        for (old, node) in old_nodes.into_iter().enumerate() {
            if keep[old] {
                let successors = translate(&node.successors);
                let predecessors = translate(&node.predecessors);
                self.nodes.push(StationNode {
                    successors,
                    predecessors,
                    ..node
                });
            }
        }
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id(), NodeId(i)))
            .collect();
        self.waypoints = translate(&self.waypoints);
        if let (Some(origin), Some(destination)) = (remap[self.origin.0], remap[self.destination.0]) {
            self.origin = origin;
            self.destination = destination;
        }
    }

    /// Deep copy. Hit counters are copied too.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// The same stations with every edge reversed and the endpoints swapped.
    pub fn reverse_edges(&self) -> Self {
        let mut reversed = Self {
            origin: self.destination,
            destination: self.origin,
            waypoints: self.waypoints.iter().rev().copied().collect(),
            nodes: self
                .nodes
                .iter()
                .map(|n| StationNode::new(Arc::clone(&n.station)))
                .collect(),
            index: self.index.clone(),
        };
        for (i, node) in self.nodes.iter().enumerate() {
            reversed.nodes[i].successors = node.predecessors.clone();
            reversed.nodes[i].predecessors = node.successors.clone();
        }
        reversed
    }

    /// Kahn's algorithm from the origin. Nodes not reachable from the origin,
    /// or sitting on a cycle, are left out.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut remaining: Vec<usize> = self.nodes.iter().map(|n| n.predecessors.len()).collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        order.push(self.origin);
        let mut head = 0;
        while head < order.len() {
            let id = order[head];
            head += 1;
            for &next in &self.nodes[id.0].successors {
                remaining[next.0] = remaining[next.0].saturating_sub(1);
                if remaining[next.0] == 0 {
                    order.push(next);
                }
            }
        }
        order
    }

    /// Remove a station's node and every edge touching it.
    ///
    /// The endpoints cannot be dropped. The last node in the arena takes the
    /// freed slot, so any previously held [`NodeId`] may be invalidated.
    pub fn drop_node(&mut self, station: StationId) -> bool {
        let Some(&target) = self.index.get(&station) else {
            return false;
        };
        if target == self.origin || target == self.destination {
            return false;
        }
        self.index.remove(&station);

        let predecessors = std::mem::take(&mut self.nodes[target.0].predecessors);
        for p in predecessors {
            self.nodes[p.0].successors.retain(|&s| s != target);
        }
        let successors = std::mem::take(&mut self.nodes[target.0].successors);
        for s in successors {
            self.nodes[s.0].predecessors.retain(|&p| p != target);
        }
        self.waypoints.retain(|&w| w != target);

        let last = NodeId(self.nodes.len() - 1);
        self.nodes.swap_remove(target.0);
        if last != target {
            let moved = self.nodes[target.0].id();
            self.index.insert(moved, target);
            let fix = |edges: &mut Vec<NodeId>| {
                for edge in edges.iter_mut().filter(|e| **e == last) {
                    *edge = target;
                }
            };
            for node in &mut self.nodes {
                fix(&mut node.successors);
                fix(&mut node.predecessors);
            }
            fix(&mut self.waypoints);
            if self.origin == last {
                self.origin = target;
            }
            if self.destination == last {
                self.destination = target;
            }
        }
        true
    }

    /// Exact number of origin→destination paths.
    pub fn count_routes(&self) -> BigUint {
        let order = self.topological_order();
        let mut counts = vec![BigUint::zero(); self.nodes.len()];
        for &id in order.iter().rev() {
            counts[id.0] = if id == self.destination {
                BigUint::one()
            } else {
                self.nodes[id.0]
                    .successors
                    .iter()
                    .fold(BigUint::zero(), |acc, s| acc + &counts[s.0])
            };
        }
        std::mem::take(&mut counts[self.origin.0])
    }

    /// Successor-count statistics, or `None` if no node has successors.
    pub fn choice_stats(&self) -> Option<ChoiceStats> {
        let choices: Vec<usize> = self
            .nodes
            .iter()
            .map(|n| n.successors.len())
            .filter(|&n| n > 0)
            .collect();
        let min = *choices.iter().min()?;
        let max = *choices.iter().max()?;
        let mean = choices.iter().sum::<usize>() as f64 / choices.len() as f64;
        Some(ChoiceStats { min, mean, max })
    }

    /// Whether any cycle is reachable from the origin. Each loop found is
    /// logged.
    pub fn has_loop(&self) -> bool {
        let mut on_path = HashMap::new();
        let mut path = Vec::new();
        let mut finished = HashSet::new();
        self.find_loop(self.origin, &mut path, &mut on_path, &mut finished)
    }

    fn find_loop(
        &self,
        current: NodeId,
        path: &mut Vec<NodeId>,
        on_path: &mut HashMap<NodeId, usize>,
        finished: &mut HashSet<NodeId>,
    ) -> bool {
        on_path.insert(current, path.len());
        path.push(current);
        let mut found = false;
        for &next in &self.nodes[current.0].successors {
            if let Some(&start) = on_path.get(&next) {
                let stations: Vec<StationId> = path[start..].iter().map(|&n| self.node(n).id()).collect();
                warn!(?stations, "loop detected in station graph");
                found = true;
            } else if !finished.contains(&next) && self.find_loop(next, path, on_path, finished) {
                found = true;
            }
        }
        path.pop();
        on_path.remove(&current);
        finished.insert(current);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, A, B, C, D, O};

    fn station(id: u32, lon: f64) -> Arc<Station> {
        Arc::new(Station::new(StationId(id), format!("s{id}"), lon, 0.0))
    }

    /// 1 → 2 → 4, 1 → 3 → 4, 2 → 3 built by hand.
    fn square() -> StationGraph {
        let mut graph = StationGraph::with_endpoints(station(1, 0.0), station(4, 3.0));
        let (two, _) = graph.insert_node(station(2, 1.0));
        let (three, _) = graph.insert_node(station(3, 2.0));
        let (origin, destination) = (graph.origin(), graph.destination());
        graph.link(origin, two);
        graph.link(origin, three);
        graph.link(two, three);
        graph.link(two, destination);
        graph.link(three, destination);
        graph
    }

    #[test]
    fn insert_is_idempotent() {
        let mut graph = square();
        let (id, fresh) = graph.insert_node(station(2, 1.0));
        assert!(!fresh);
        assert_eq!(graph.node_of(StationId(2)), Some(id));
        assert_eq!(graph.len(), 4);

        graph.link(graph.origin(), id);
        assert_eq!(graph.edge_count(), 5);
    }

    #[test]
    fn topological_order_respects_edges() {
        let graph = square();
        let order = graph.topological_order();
        assert_eq!(order.len(), 4);
        let position: HashMap<NodeId, usize> = order.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        for id in graph.node_ids() {
            for &next in graph.node(id).successors() {
                assert!(position[&id] < position[&next]);
            }
        }
        assert_eq!(order[0], graph.origin());
        assert_eq!(*order.last().unwrap(), graph.destination());
    }

    #[test]
    fn counts_routes() {
        assert_eq!(square().count_routes(), BigUint::from(3u32));
    }

    #[test]
    fn choice_stats() {
        let stats = square().choice_stats().unwrap();
        assert_eq!(stats.min, 1);
        assert_eq!(stats.max, 2);
        assert!((stats.mean - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn reverse_twice_is_identity() {
        let graph = square();
        let reversed = graph.reverse_edges();
        assert_eq!(reversed.node(reversed.origin()).id(), StationId(4));
        assert_eq!(reversed.node(reversed.destination()).id(), StationId(1));
        assert_eq!(reversed.count_routes(), BigUint::from(3u32));
        assert!(!fixtures::same_graph(&reversed, &graph));
        assert!(fixtures::same_graph(&reversed.reverse_edges(), &graph));
    }

    #[test]
    fn duplicate_is_independent() {
        let graph = square();
        graph.node(graph.origin()).record_hit();
        let mut copy = graph.duplicate();
        assert!(fixtures::same_graph(&copy, &graph));
        assert_eq!(copy.node(copy.origin()).hits(), 1);

        assert!(copy.drop_node(StationId(2)));
        assert!(!fixtures::same_graph(&copy, &graph));
        assert_eq!(graph.len(), 4);
        assert_eq!(copy.len(), 3);
    }

    #[test]
    fn drop_node_repairs_moved_indices() {
        let mut graph = square();
        // Node 2 sits at index 2, node 3 (last) moves into its slot.
        assert!(graph.drop_node(StationId(2)));
        assert_eq!(graph.len(), 3);
        assert!(graph.node_of(StationId(2)).is_none());

        let three = graph.node_of(StationId(3)).unwrap();
        assert_eq!(three.index(), 2);
        assert_eq!(graph.ids_of(graph.node(three).predecessors()), vec![StationId(1)]);
        assert_eq!(graph.ids_of(graph.node(three).successors()), vec![StationId(4)]);
        assert_eq!(
            graph.ids_of(graph.node(graph.origin()).successors()),
            vec![StationId(3)]
        );
        assert_eq!(graph.count_routes(), BigUint::one());
    }

    #[test]
    fn endpoints_cannot_be_dropped() {
        let mut graph = square();
        assert!(!graph.drop_node(StationId(1)));
        assert!(!graph.drop_node(StationId(4)));
        assert!(!graph.drop_node(StationId(99)));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn detects_loops() {
        let mut graph = square();
        assert!(!graph.has_loop());
        let (two, three) = (
            graph.node_of(StationId(2)).unwrap(),
            graph.node_of(StationId(3)).unwrap(),
        );
        graph.link(three, two);
        assert!(graph.has_loop());
    }

    #[test]
    fn compact_drops_unreachable_nodes() {
        let mut graph = square();
        let (orphan, _) = graph.insert_node(station(9, 1.5));
        let destination = graph.destination();
        graph.link(orphan, destination);
        assert_eq!(graph.len(), 5);

        graph.compact();

        assert_eq!(graph.len(), 4);
        assert!(graph.node_of(StationId(9)).is_none());
        assert_eq!(graph.ids_of(graph.node(graph.destination()).predecessors()).len(), 2);
        assert_eq!(graph.count_routes(), BigUint::from(3u32));
    }

    #[test]
    fn normalised_edges_are_sorted() {
        let context = fixtures::three_path_network();
        let graph = fixtures::graph_of(&context, O, D);
        assert_eq!(graph.ids_of(graph.node(graph.origin()).successors()), vec![A, B, C]);
        let c = graph.node_of(C).unwrap();
        assert_eq!(graph.ids_of(graph.node(c).predecessors()), vec![O, A, B]);
    }
}
