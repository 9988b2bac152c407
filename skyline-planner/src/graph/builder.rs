//! Concurrent station graph construction.
//!
//! Expansion starts at the origin and proceeds level by level. Every newly
//! discovered station gets its own task, which filters the station's
//! neighbours through the admissibility predicates and registers the
//! survivors in the shared arena. A semaphore caps how many expansions run at
//! once. After expansion the graph is purged of edges that cannot reach the
//! destination, checked for loops, compacted and its edge lists sorted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, trace, warn};

use super::admissibility::is_admissible;
use super::error::GraphError;
use super::station_graph::{NodeId, StationGraph};
use crate::stations::{Station, StationContext, StationId};

/// Graph construction settings.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Maximum number of node expansions running at once.
    pub max_concurrent: usize,
}

impl BuildConfig {
    pub fn new(max_concurrent: usize) -> Self {
        Self { max_concurrent }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { max_concurrent: 20 }
    }
}

/// How construction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// Destination reachable and no loop found.
    Ready,
    /// No admissible path reaches the destination.
    Unreachable,
    /// A loop survived the reachability purge.
    Cyclic,
}

/// A constructed graph together with its status.
///
/// Only a [`BuildStatus::Ready`] graph may be searched; [`into_graph`]
/// enforces that.
///
/// [`into_graph`]: BuildOutcome::into_graph
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    graph: StationGraph,
    status: BuildStatus,
}

impl BuildOutcome {
    pub fn status(&self) -> BuildStatus {
        self.status
    }

    pub fn succeeded(&self) -> bool {
        self.status == BuildStatus::Ready
    }

    /// The graph, for inspection even when construction failed.
    pub fn graph(&self) -> &StationGraph {
        &self.graph
    }

    /// The graph, if it can be searched.
    pub fn into_graph(self) -> Result<StationGraph, GraphError> {
        match self.status {
            BuildStatus::Ready => Ok(self.graph),
            status => Err(GraphError::NotSearchable(status)),
        }
    }
}

type SharedGraph = Arc<Mutex<StationGraph>>;

/// Builds station graphs from a shared [`StationContext`].
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    context: Arc<StationContext>,
    config: BuildConfig,
}

impl GraphBuilder {
    pub fn new(context: Arc<StationContext>, config: BuildConfig) -> Self {
        Self { context, config }
    }

    pub fn context(&self) -> &Arc<StationContext> {
        &self.context
    }

    /// Build the admissible graph from `origin` to `destination`.
    pub async fn build(
        &self,
        origin: StationId,
        destination: StationId,
    ) -> Result<BuildOutcome, GraphError> {
        let origin = self.lookup(origin)?;
        let destination = self.lookup(destination)?;
        debug!(origin = %origin.id, destination = %destination.id, "building station graph");

        let graph = self.expand(origin, destination).await?;
        Ok(finalize(graph))
    }

    /// Build through an ordered list of intermediate stops.
    ///
    /// One sub-graph is built per consecutive pair of stops and the pieces
    /// are spliced together, sharing any station that appears in more than
    /// one piece. The first failing segment decides the status.
    pub async fn build_with_stops(
        &self,
        origin: StationId,
        destination: StationId,
        stops: &[StationId],
    ) -> Result<BuildOutcome, GraphError> {
        for &stop in stops {
            self.lookup(stop)?;
        }

        let mut combined: Option<StationGraph> = None;
        let mut segment_start = origin;
        for &segment_end in stops.iter().chain(std::iter::once(&destination)) {
            let outcome = self.build(segment_start, segment_end).await?;
            if !outcome.succeeded() {
                warn!(
                    from = %segment_start,
                    to = %segment_end,
                    status = ?outcome.status,
                    "segment construction failed"
                );
                return Ok(outcome);
            }
            match combined.as_mut() {
                None => combined = Some(outcome.graph),
                Some(graph) => graph.splice(outcome.graph),
            }
            segment_start = segment_end;
        }

        let Some(mut graph) = combined else {
            unreachable!("at least the final segment is always built");
        };
        let status = if graph.has_loop() {
            BuildStatus::Cyclic
        } else {
            BuildStatus::Ready
        };
        graph.normalize_edges();
        info!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            stops = stops.len(),
            ?status,
            "station graph with stops built"
        );
        Ok(BuildOutcome { graph, status })
    }

    /// Build from an explicit edge list instead of neighbour lists.
    ///
    /// Edges are taken as given, without admissibility filtering, and then
    /// post-processed like any other build.
    pub fn from_edges(
        &self,
        origin: StationId,
        destination: StationId,
        edges: &[(StationId, StationId)],
    ) -> Result<BuildOutcome, GraphError> {
        let mut graph = StationGraph::with_endpoints(self.lookup(origin)?, self.lookup(destination)?);
        for &(from, to) in edges {
            let (from, _) = graph.insert_node(self.lookup(from)?);
            let (to, _) = graph.insert_node(self.lookup(to)?);
            graph.link(from, to);
        }
        Ok(finalize(graph))
    }

    fn lookup(&self, id: StationId) -> Result<Arc<Station>, GraphError> {
        self.context
            .station(id)
            .cloned()
            .ok_or(GraphError::UnknownStation(id))
    }

    async fn expand(
        &self,
        origin: Arc<Station>,
        destination: Arc<Station>,
    ) -> Result<StationGraph, GraphError> {
        let shared: SharedGraph = Arc::new(Mutex::new(StationGraph::with_endpoints(
            Arc::clone(&origin),
            Arc::clone(&destination),
        )));
        let gate = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let endpoints = Arc::new((origin, destination));

        let mut frontier = {
            let graph = lock(&shared);
            vec![(graph.origin(), Arc::clone(graph.node(graph.origin()).station()))]
        };
        let mut levels = 0usize;
        while !frontier.is_empty() {
            levels += 1;
            let tasks: Vec<_> = frontier
                .drain(..)
                .map(|(node, station)| {
                    tokio::spawn(expand_node(
                        Arc::clone(&self.context),
                        Arc::clone(&shared),
                        Arc::clone(&gate),
                        Arc::clone(&endpoints),
                        node,
                        station,
                    ))
                })
                .collect();

            for joined in join_all(tasks).await {
                match joined {
                    Ok(discovered) => frontier.extend(discovered),
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(e) => return Err(GraphError::ExpansionAborted(e.to_string())),
                }
            }
            trace!(level = levels, pending = frontier.len(), "expansion level done");
        }

        let graph = lock(&shared).clone();
        debug!(nodes = graph.len(), edges = graph.edge_count(), levels, "expansion complete");
        Ok(graph)
    }
}

fn lock(graph: &SharedGraph) -> std::sync::MutexGuard<'_, StationGraph> {
    graph.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Expand one node and return the stations it discovered for the first time.
async fn expand_node(
    context: Arc<StationContext>,
    graph: SharedGraph,
    gate: Arc<Semaphore>,
    endpoints: Arc<(Arc<Station>, Arc<Station>)>,
    node: NodeId,
    station: Arc<Station>,
) -> Vec<(NodeId, Arc<Station>)> {
    let Ok(_permit) = gate.acquire().await else {
        return Vec::new();
    };
    let (origin, destination) = &*endpoints;

    let candidates: Vec<Arc<Station>> = station
        .neighbors
        .iter()
        .filter_map(|&id| context.station(id))
        .filter(|next| is_admissible(&context, next, &station, origin, destination))
        .cloned()
        .collect();

    let mut graph = lock(&graph);
    let mut discovered = Vec::new();
    for candidate in candidates {
        let (next, fresh) = graph.insert_node(Arc::clone(&candidate));
        graph.link(node, next);
        if fresh {
            discovered.push((next, candidate));
        }
    }
    discovered
}

/// Reachability purge, loop check, compaction and edge normalisation.
fn finalize(mut graph: StationGraph) -> BuildOutcome {
    let reachable = purge_unreachable(&mut graph);
    let cyclic = graph.has_loop();
    graph.compact();
    graph.normalize_edges();

    let status = if !reachable {
        warn!(
            origin = %graph.node(graph.origin()).id(),
            destination = %graph.node(graph.destination()).id(),
            "destination unreachable from origin"
        );
        BuildStatus::Unreachable
    } else if cyclic {
        BuildStatus::Cyclic
    } else {
        BuildStatus::Ready
    };

    if let Some(stats) = graph.choice_stats() {
        debug!(min = stats.min, mean = stats.mean, max = stats.max, "successor counts");
    }
    info!(
        nodes = graph.len(),
        edges = graph.edge_count(),
        ?status,
        "station graph built"
    );
    BuildOutcome { graph, status }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Reach {
    Visiting,
    Done(bool),
}

/// Drop every edge whose target cannot reach the destination and rebuild the
/// predecessor lists. Edges back into a node still being visited are kept so
/// the loop check can see them. Returns whether the origin reaches the
/// destination.
fn purge_unreachable(graph: &mut StationGraph) -> bool {
    let mut memo = HashMap::new();
    let reachable = purge_from(graph, graph.origin(), &mut memo);
    graph.rebuild_predecessors();
    reachable
}

fn purge_from(graph: &mut StationGraph, current: NodeId, memo: &mut HashMap<NodeId, Reach>) -> bool {
    if current == graph.destination() {
        return true;
    }
    match memo.get(&current) {
        Some(Reach::Done(reaches)) => return *reaches,
        Some(Reach::Visiting) => return false,
        None => {}
    }
    memo.insert(current, Reach::Visiting);

    let successors = graph.node(current).successors().to_vec();
    let mut kept = Vec::with_capacity(successors.len());
    let mut reaches = false;
    for next in successors {
        if memo.get(&next) == Some(&Reach::Visiting) {
            kept.push(next);
        } else if purge_from(graph, next, memo) {
            kept.push(next);
            reaches = true;
        }
    }
    graph.set_successors(current, kept);
    memo.insert(current, Reach::Done(reaches));
    reaches
}
