//! PBS baseline: flow-biased random walks offered to a skyline frontier.
//!
//! Each walk starts at the origin and picks every next station in
//! proportion to the trips between the stations already walked and the
//! candidate, uniformly when no trips are recorded. A zigzag pick costs a
//! retry; a walk that runs out of retries is abandoned. The bidirectional
//! variant also walks the edge-reversed graph and flips those routes back
//! before offering them.

use std::sync::Arc;

use futures::future::join_all;
use rand::Rng;
use tokio::sync::Semaphore;
use tracing::{info, trace};

use super::config::PbsConfig;
use super::sampling::{pick_index, seeded_rng};
use crate::graph::{NodeId, StationGraph, is_zigzag};
use crate::skyline::{CriteriaSet, RouteList};
use crate::stations::StationContext;

/// Zigzag picks tolerated in a row before a walk is abandoned.
const WALK_RETRIES: usize = 5;

/// One flow-biased walk from `graph`'s origin to its destination.
///
/// On a reversed graph (`reversed == true`) flow is read in travel
/// direction, from the candidate towards the stations already walked.
fn random_walk<R: Rng + ?Sized>(
    graph: &StationGraph,
    context: &StationContext,
    rng: &mut R,
    reversed: bool,
) -> Option<Vec<NodeId>> {
    let mut current = graph.origin();
    let mut path = vec![current];
    let mut route = vec![graph.node(current).id()];
    let mut retries = WALK_RETRIES;

    while current != graph.destination() {
        let successors = graph.node(current).successors();
        let weights: Vec<f64> = successors
            .iter()
            .map(|&candidate| {
                let candidate = graph.node(candidate).id();
                route
                    .iter()
                    .map(|&station| {
                        let trips = if reversed {
                            context.flow(candidate, station)
                        } else {
                            context.flow(station, candidate)
                        };
                        trips as f64
                    })
                    .sum()
            })
            .collect();
        let next = successors[pick_index(rng, &weights)?];
        let station = graph.node(next).id();

        if is_zigzag(context, station, &route) {
            retries -= 1;
            if retries == 0 {
                trace!(route = ?route, "walk abandoned after repeated zigzags");
                return None;
            }
            continue;
        }
        retries = WALK_RETRIES;
        path.push(next);
        route.push(station);
        current = next;
    }
    Some(path)
}

/// One forward walk, plus one reversed walk when `reversed` is given.
fn walk_round<R: Rng + ?Sized>(
    graph: &StationGraph,
    reversed: Option<&StationGraph>,
    context: &StationContext,
    routes: &RouteList,
    rng: &mut R,
) {
    if let Some(path) = random_walk(graph, context, rng, false) {
        routes.add(graph.stations_of(&path), None);
    }
    if let Some(reversed) = reversed {
        if let Some(mut path) = random_walk(reversed, context, rng, true) {
            path.reverse();
            routes.add(reversed.stations_of(&path), None);
        }
    }
}

/// Walk until `target_insertions` routes have been offered, giving up after
/// ten times as many rounds.
pub fn search_pbs(context: Arc<StationContext>, graph: &StationGraph, config: &PbsConfig) -> RouteList {
    let routes = RouteList::new(Arc::new(CriteriaSet::standard(Arc::clone(&context))));
    let reversed = config.bidirectional.then(|| graph.reverse_edges());
    let mut rng = seeded_rng(config.seed);

    for _ in 0..config.target_insertions.saturating_mul(10) {
        if routes.insert_count() >= config.target_insertions {
            break;
        }
        walk_round(graph, reversed.as_ref(), &context, &routes, &mut rng);
    }

    info!(
        routes = routes.len(),
        insertions = routes.insert_count(),
        bidirectional = config.bidirectional,
        "PBS search finished"
    );
    routes
}

/// `target_insertions` walk rounds as concurrent tasks, at most
/// `max_concurrent` running at once.
///
/// With a seed, round `i` walks with its own generator seeded `seed + i`.
pub async fn search_pbs_parallel(
    context: Arc<StationContext>,
    graph: Arc<StationGraph>,
    config: &PbsConfig,
) -> Arc<RouteList> {
    let routes = Arc::new(RouteList::new(Arc::new(CriteriaSet::standard(Arc::clone(&context)))));
    let reversed = config.bidirectional.then(|| Arc::new(graph.reverse_edges()));
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

    let handles: Vec<_> = (0..config.target_insertions)
        .map(|i| {
            let graph = Arc::clone(&graph);
            let reversed = reversed.clone();
            let context = Arc::clone(&context);
            let routes = Arc::clone(&routes);
            let semaphore = Arc::clone(&semaphore);
            let seed = config.seed.map(|seed| seed.wrapping_add(i as u64));
            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let mut rng = seeded_rng(seed);
                walk_round(&graph, reversed.as_deref(), &context, &routes, &mut rng);
            })
        })
        .collect();

    for joined in join_all(handles).await {
        if let Err(error) = joined {
            if error.is_panic() {
                std::panic::resume_unwind(error.into_panic());
            }
        }
    }

    info!(
        routes = routes.len(),
        insertions = routes.insert_count(),
        bidirectional = config.bidirectional,
        "parallel PBS search finished"
    );
    routes
}
