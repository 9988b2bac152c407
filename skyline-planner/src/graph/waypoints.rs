//! Waypoint handling: splicing segment graphs and restricting a graph so
//! every route passes its waypoints in order.

use std::collections::HashMap;

use super::station_graph::{NodeId, StationGraph};
use crate::stations::StationId;

impl StationGraph {
    /// Append `segment`, whose origin is this graph's destination.
    ///
    /// The old destination becomes a waypoint. Stations already present are
    /// shared rather than duplicated.
    pub(crate) fn splice(&mut self, segment: StationGraph) {
        let boundary = self.destination();
        debug_assert_eq!(
            self.node(boundary).id(),
            segment.node(segment.origin()).id(),
            "segment must start where the graph ends"
        );
        self.push_waypoint(boundary);

        let remap: Vec<NodeId> = segment
            .node_ids()
            .map(|id| {
                if id == segment.origin() {
                    boundary
                } else {
                    self.insert_node(segment.node(id).station().clone()).0
                }
            })
            .collect();
        for id in segment.node_ids() {
            for &next in segment.node(id).successors() {
                self.link(remap[id.index()], remap[next.index()]);
            }
        }
        self.set_destination(remap[segment.destination().index()]);
    }

    /// A copy in which every origin→destination route visits the waypoints.
    ///
    /// Waypoints are taken in topological order. Within each segment, edges
    /// that jump past the segment's end are removed and nodes left without
    /// successors are dropped; whatever is no longer reachable from the
    /// origin is compacted away at the end.
    pub fn restrict_to_waypoints(&self) -> StationGraph {
        let mut graph = self.duplicate();
        let order: Vec<StationId> = graph
            .topological_order()
            .into_iter()
            .map(|id| graph.node(id).id())
            .collect();
        let position: HashMap<StationId, usize> =
            order.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut stops: Vec<usize> = graph
            .waypoints()
            .iter()
            .chain(std::iter::once(&graph.destination()))
            .filter_map(|&id| position.get(&graph.node(id).id()).copied())
            .collect();
        stops.sort_unstable();
        stops.dedup();

        let Some(&origin) = position.get(&graph.node(graph.origin()).id()) else {
            return graph;
        };
        let mut start = origin;
        for end in stops {
            if end <= start {
                continue;
            }
            for &station in &order[start..end] {
                let Some(node) = graph.node_of(station) else {
                    continue;
                };
                let jumping: Vec<NodeId> = graph
                    .node(node)
                    .successors()
                    .iter()
                    .copied()
                    .filter(|&next| {
                        position
                            .get(&graph.node(next).id())
                            .is_some_and(|&at| at > end)
                    })
                    .collect();
                for next in jumping {
                    graph.unlink(node, next);
                }
            }
            for &station in order[start + 1..end].iter().rev() {
                let dead_end = graph
                    .node_of(station)
                    .is_some_and(|node| graph.node(node).successors().is_empty());
                if dead_end {
                    graph.drop_node(station);
                }
            }
            start = end;
        }

        graph.compact();
        graph.normalize_edges();
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, A, B, C, D, O};
    use crate::graph::{BuildConfig, GraphBuilder};
    use crate::stations::Station;
    use num_bigint::BigUint;
    use std::sync::Arc;

    #[test]
    fn restriction_forces_waypoint() {
        let context = fixtures::three_path_network();
        // O → A → D skips C; restricting through C must remove it.
        let builder = GraphBuilder::new(Arc::clone(&context), BuildConfig::default());
        let mut graph = builder
            .from_edges(O, D, &[(O, A), (O, B), (O, C), (A, C), (A, D), (B, C), (C, D)])
            .unwrap()
            .into_graph()
            .unwrap();
        assert_eq!(graph.count_routes(), BigUint::from(4u32));
        let c = graph.node_of(C).unwrap();
        graph.push_waypoint(c);

        let restricted = graph.restrict_to_waypoints();

        assert_eq!(restricted.count_routes(), BigUint::from(3u32));
        let a = restricted.node_of(A).unwrap();
        assert_eq!(restricted.ids_of(restricted.node(a).successors()), vec![C]);
        assert_eq!(restricted.ids_of(restricted.waypoints()), vec![C]);
        // The source graph is untouched.
        assert_eq!(graph.count_routes(), BigUint::from(4u32));
    }

    #[test]
    fn restriction_drops_dead_branches() {
        let context = fixtures::three_path_network();
        let builder = GraphBuilder::new(Arc::clone(&context), BuildConfig::default());
        // B only leads straight to D, past the waypoint A.
        let mut graph = builder
            .from_edges(O, D, &[(O, A), (O, B), (A, D), (B, D)])
            .unwrap()
            .into_graph()
            .unwrap();
        let a = graph.node_of(A).unwrap();
        graph.push_waypoint(a);

        let restricted = graph.restrict_to_waypoints();

        assert!(restricted.node_of(B).is_none());
        assert_eq!(restricted.count_routes(), BigUint::from(1u32));
        assert_eq!(restricted.len(), 3);
    }

    #[test]
    fn stations_outside_the_topological_order_are_left_alone() {
        let station = |id: StationId, lon: f64| Arc::new(Station::new(id, format!("{id}"), lon, 0.0));
        let mut graph = StationGraph::with_endpoints(station(O, 0.0), station(D, 3.0));
        let (a, _) = graph.insert_node(station(A, 1.0));
        let (b, _) = graph.insert_node(station(B, 2.0));
        let (origin, destination) = (graph.origin(), graph.destination());
        // A and B wait on each other, so neither gets a topological position.
        graph.link(origin, a);
        graph.link(origin, destination);
        graph.link(a, b);
        graph.link(b, a);
        graph.push_waypoint(destination);

        let restricted = graph.restrict_to_waypoints();

        let origin = restricted.origin();
        assert_eq!(restricted.ids_of(restricted.node(origin).successors()), vec![A, D]);
        assert_eq!(restricted.len(), 4);
    }

    #[tokio::test]
    async fn splice_shares_boundary() {
        let context = fixtures::three_path_network();
        let mut first = fixtures::build_graph(&context, O, C).await;
        let second = fixtures::build_graph(&context, C, D).await;
        first.splice(second);

        assert_eq!(first.node(first.destination()).id(), D);
        assert_eq!(first.ids_of(first.waypoints()), vec![C]);
        assert_eq!(first.count_routes(), BigUint::from(3u32));
        assert!(!first.has_loop());
    }
}
