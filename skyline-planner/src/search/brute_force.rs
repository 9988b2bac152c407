//! Exhaustive enumeration of every admissible route.
//!
//! Each task extends one route prefix by every successor of its last
//! station. Completed routes go straight to the shared frontier; longer
//! prefixes come back to the driver, which spawns a task for each. A
//! semaphore bounds how many extension tasks run at once.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

use crate::graph::{NodeId, StationGraph, is_zigzag};
use crate::skyline::{CriteriaSet, RouteList};
use crate::stations::StationContext;

/// Extension tasks allowed to run at once by default.
pub const DEFAULT_MAX_CONCURRENT: usize = 20;

/// Non-zigzag one-station extensions of `prefix`. Extensions reaching the
/// destination are offered to `routes` instead of being returned.
fn extend(
    graph: &StationGraph,
    context: &StationContext,
    routes: &RouteList,
    prefix: &[NodeId],
) -> Vec<Vec<NodeId>> {
    let route = graph.ids_of(prefix);
    let Some(&last) = prefix.last() else {
        return Vec::new();
    };

    let mut extensions = Vec::new();
    for &next in graph.node(last).successors() {
        if is_zigzag(context, graph.node(next).id(), &route) {
            continue;
        }
        let mut extended = prefix.to_vec();
        extended.push(next);
        if next == graph.destination() {
            routes.add(graph.stations_of(&extended), None);
        } else {
            extensions.push(extended);
        }
    }
    extensions
}

/// Offer every admissible origin-to-destination route of `graph` to a new
/// frontier.
pub async fn search_brute_force(
    context: Arc<StationContext>,
    graph: Arc<StationGraph>,
    max_concurrent: usize,
) -> Arc<RouteList> {
    let routes = Arc::new(RouteList::new(Arc::new(CriteriaSet::standard(Arc::clone(&context)))));
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = JoinSet::new();

    let spawn = |tasks: &mut JoinSet<Vec<Vec<NodeId>>>, prefix: Vec<NodeId>| {
        let graph = Arc::clone(&graph);
        let context = Arc::clone(&context);
        let routes = Arc::clone(&routes);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return Vec::new();
            };
            extend(&graph, &context, &routes, &prefix)
        });
    };

    spawn(&mut tasks, vec![graph.origin()]);
    let mut prefixes = 1usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(extensions) => {
                prefixes += extensions.len();
                for prefix in extensions {
                    spawn(&mut tasks, prefix);
                }
            }
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(_) => {}
        }
    }

    info!(
        routes = routes.len(),
        insertions = routes.insert_count(),
        prefixes,
        "brute-force enumeration finished"
    );
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, A, C, D, O, P};

    #[tokio::test]
    async fn enumerates_every_route() {
        let context = fixtures::three_path_network();
        let graph = Arc::new(fixtures::build_graph(&context, O, D).await);
        let routes = search_brute_force(Arc::clone(&context), graph, DEFAULT_MAX_CONCURRENT).await;

        assert_eq!(routes.insert_count(), 3);
        let mut ids = routes.station_ids();
        ids.sort();
        assert_eq!(ids, vec![vec![O, A, C, D], vec![O, C, D]]);
    }

    #[tokio::test]
    async fn zigzag_routes_are_skipped() {
        let context = fixtures::zigzag_network();
        let graph = Arc::new(fixtures::build_graph(&context, O, D).await);
        let routes = search_brute_force(Arc::clone(&context), graph, 1).await;

        assert_eq!(routes.insert_count(), 1);
        assert_eq!(routes.station_ids(), vec![vec![O, P, D]]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enumeration_is_complete() {
        let context = fixtures::three_path_network();
        let graph = Arc::new(fixtures::build_graph(&context, O, D).await);
        for limit in [1, 2, 20] {
            let routes = search_brute_force(Arc::clone(&context), Arc::clone(&graph), limit).await;
            assert_eq!(routes.insert_count(), 3);
            assert_eq!(routes.len(), 2);
        }
    }
}
