//! Small synthetic station networks shared by unit tests.
//!
//! Coordinates are planar; every ordered pair of stations gets a distance of
//! `1000 × euclidean` metres.

use std::sync::Arc;

use crate::graph::{BuildConfig, GraphBuilder, StationGraph, StationNode};
use crate::stations::{Station, StationContext, StationId};

pub(crate) const O: StationId = StationId(1);
pub(crate) const A: StationId = StationId(2);
pub(crate) const B: StationId = StationId(3);
pub(crate) const C: StationId = StationId(4);
pub(crate) const D: StationId = StationId(5);
pub(crate) const P: StationId = StationId(6);
pub(crate) const Z: StationId = StationId(7);

type StationRow<'a> = (StationId, f64, f64, &'a [StationId]);

pub(crate) fn network(stations: &[StationRow<'_>], flows: &[(StationId, StationId, u64)]) -> Arc<StationContext> {
    let mut builder = StationContext::builder();
    for &(id, lon, lat, neighbors) in stations {
        builder = builder.station(
            Station::new(id, format!("Stop {id}"), lon, lat)
                .with_trip_count(10)
                .with_neighbors(neighbors.iter().copied()),
        );
    }
    for &(a, alon, alat, _) in stations {
        for &(b, blon, blat, _) in stations {
            if a != b {
                builder = builder.distance(a, b, (alon - blon).hypot(alat - blat) * 1000.0);
            }
        }
    }
    for &(from, to, trips) in flows {
        builder = builder.flow(from, to, trips);
    }
    Arc::new(builder.build())
}

/// O(0,0) → {A(1,1), B(1,-1), C(2,0)}, A → C, B → C, C → D(3,0).
///
/// Three routes: O-A-C-D, O-B-C-D, O-C-D. The skyline is {O-A-C-D, O-C-D}:
/// O-A-C-D beats O-B-C-D on flow and ties elsewhere, O-C-D is fastest.
pub(crate) fn three_path_network() -> Arc<StationContext> {
    network(
        &[
            (O, 0.0, 0.0, &[A, B, C]),
            (A, 1.0, 1.0, &[C]),
            (B, 1.0, -1.0, &[C]),
            (C, 2.0, 0.0, &[D]),
            (D, 3.0, 0.0, &[]),
        ],
        &[
            (O, A, 5),
            (O, B, 1),
            (O, C, 2),
            (O, D, 4),
            (A, C, 3),
            (A, D, 6),
            (B, C, 2),
            (B, D, 7),
            (C, D, 1),
        ],
    )
}

/// O(0,0) → {A(1,1), B(1,-1)} → D(2,0). Two routes; O-A-D carries more flow.
pub(crate) fn diamond_network() -> Arc<StationContext> {
    network(
        &[
            (O, 0.0, 0.0, &[A, B]),
            (A, 1.0, 1.0, &[D]),
            (B, 1.0, -1.0, &[D]),
            (D, 2.0, 0.0, &[]),
        ],
        &[(O, A, 3), (O, B, 1), (O, D, 5), (A, D, 4), (B, D, 2)],
    )
}

/// O(0,0) → P(1,2) → {Z(2.3,0), D(3,0)}, Z → D.
///
/// Z is admissible from P but O lies closer to Z than P does, so O-P-Z is a
/// zigzag and only O-P-D is a valid route.
pub(crate) fn zigzag_network() -> Arc<StationContext> {
    network(
        &[
            (O, 0.0, 0.0, &[P]),
            (P, 1.0, 2.0, &[Z, D]),
            (Z, 2.3, 0.0, &[D]),
            (D, 3.0, 0.0, &[]),
        ],
        &[(O, P, 2), (P, Z, 9), (Z, D, 9), (P, D, 1)],
    )
}

/// Build the graph between `origin` and `destination`, panicking on failure.
pub(crate) async fn build_graph(
    context: &Arc<StationContext>,
    origin: StationId,
    destination: StationId,
) -> StationGraph {
    GraphBuilder::new(Arc::clone(context), BuildConfig::default())
        .build(origin, destination)
        .await
        .unwrap()
        .into_graph()
        .unwrap()
}

/// Synchronous variant of [`build_graph`] for non-async tests.
pub(crate) fn graph_of(
    context: &Arc<StationContext>,
    origin: StationId,
    destination: StationId,
) -> StationGraph {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(build_graph(context, origin, destination))
}

pub(crate) fn ids(graph: &StationGraph, path: &[crate::graph::NodeId]) -> Vec<StationId> {
    path.iter().map(|&n| graph.node(n).id()).collect()
}

/// Same endpoints and the same edge sets by station id, whatever the arena
/// layout.
pub(crate) fn same_graph(left: &StationGraph, right: &StationGraph) -> bool {
    let endpoints = |graph: &StationGraph| {
        (graph.node(graph.origin()).id(), graph.node(graph.destination()).id())
    };
    let edges = |graph: &StationGraph, node: &StationNode| {
        let mut successors = graph.ids_of(node.successors());
        let mut predecessors = graph.ids_of(node.predecessors());
        successors.sort();
        predecessors.sort();
        (successors, predecessors)
    };
    left.len() == right.len()
        && endpoints(left) == endpoints(right)
        && left.nodes().iter().all(|node| match right.node_of(node.id()) {
            Some(twin) => edges(left, node) == edges(right, right.node(twin)),
            None => false,
        })
}
