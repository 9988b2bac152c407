//! The skyline frontier: a set of routes none of which dominates another.
//!
//! Every mutation goes through [`RouteList::add`], which holds one exclusive
//! lock for the identity lookup, the dominance scan and the update, so
//! concurrent producers always see a consistent frontier.
//!
//! Entries may carry a caller-chosen tag. When an entry is evicted its tag
//! is handed back in the [`AddOutcome`], which lets a search engine credit
//! and debit whatever produced the route without the frontier knowing about
//! engine state.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::criteria::CriteriaSet;
use super::route::{Route, RouteSummary, route_hash};
use crate::stations::{Station, StationId};

/// Criteria values closer than this compare equal when sorting.
const SORT_TOLERANCE: f64 = 1e-7;

/// A frontier entry and the tag it was inserted with.
#[derive(Debug, Clone)]
pub struct RouteEntry<K> {
    pub route: Route,
    pub tag: Option<K>,
}

/// Result of [`RouteList::add`].
#[derive(Debug, Clone, PartialEq)]
pub struct AddOutcome<K> {
    /// Whether the route joined the frontier.
    pub accepted: bool,
    /// The route's criteria. For a duplicate these are the stored values.
    pub criteria: Vec<f64>,
    /// Tags of the entries the new route evicted.
    pub evicted: Vec<K>,
}

impl<K> AddOutcome<K> {
    fn rejected(criteria: Vec<f64>) -> Self {
        Self {
            accepted: false,
            criteria,
            evicted: Vec::new(),
        }
    }
}

/// Frontier state behind the [`RouteList`] lock.
#[derive(Debug)]
pub struct Frontier<K> {
    entries: Vec<RouteEntry<K>>,
    insert_count: usize,
    eviction_count: usize,
}

impl<K> Frontier<K> {
    pub fn entries(&self) -> &[RouteEntry<K>] {
        &self.entries
    }

    pub fn insert_count(&self) -> usize {
        self.insert_count
    }

    pub fn eviction_count(&self) -> usize {
        self.eviction_count
    }

    /// The stored entry for `stations` (in either direction), given its
    /// precomputed `hash`.
    pub fn get_by_hash(&self, stations: &[Arc<Station>], hash: u64) -> Option<&RouteEntry<K>> {
        self.entries
            .iter()
            .find(|e| e.route.hash() == hash && e.route.same_stations(stations))
    }
}

/// Thread-safe skyline route list.
pub struct RouteList<K = ()> {
    criteria: Arc<CriteriaSet>,
    inner: Mutex<Frontier<K>>,
}

impl<K> RouteList<K> {
    pub fn new(criteria: Arc<CriteriaSet>) -> Self {
        Self {
            criteria,
            inner: Mutex::new(Frontier {
                entries: Vec::new(),
                insert_count: 0,
                eviction_count: 0,
            }),
        }
    }

    pub fn criteria(&self) -> &Arc<CriteriaSet> {
        &self.criteria
    }

    /// Hold the frontier lock, for callers that need several reads to agree.
    pub fn lock(&self) -> MutexGuard<'_, Frontier<K>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer a route to the frontier.
    ///
    /// Every call counts as an insertion attempt. A route already present
    /// (forwards or reversed) is not accepted and reports its stored
    /// criteria. A route dominated by an existing entry is rejected without
    /// touching the frontier; otherwise every entry it dominates is evicted
    /// and it is inserted.
    pub fn add(&self, stations: Vec<Arc<Station>>, tag: Option<K>) -> AddOutcome<K> {
        let mut frontier = self.lock();
        frontier.insert_count += 1;

        let hash = route_hash(&stations.iter().map(|s| s.id).collect::<Vec<_>>());
        if let Some(existing) = frontier.get_by_hash(&stations, hash) {
            return AddOutcome::rejected(existing.route.criteria().to_vec());
        }

        let criteria = self.criteria.evaluate(&stations);
        if frontier
            .entries
            .iter()
            .any(|e| self.criteria.dominates(e.route.criteria(), &criteria))
        {
            return AddOutcome::rejected(criteria);
        }

        let (evicted, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut frontier.entries)
            .into_iter()
            .partition(|e| self.criteria.dominates(&criteria, e.route.criteria()));
        frontier.entries = kept;
        frontier.eviction_count += evicted.len();

        let route = Route::new(stations, criteria.clone());
        trace!(
            route = ?route.ids(),
            evicted = evicted.len(),
            frontier = frontier.entries.len() + 1,
            "route accepted"
        );
        frontier.entries.push(RouteEntry { route, tag });

        AddOutcome {
            accepted: true,
            criteria,
            evicted: evicted.into_iter().filter_map(|e| e.tag).collect(),
        }
    }

    /// Locked lookup of a stored route by its stations.
    pub fn get_by_hash(&self, stations: &[Arc<Station>]) -> Option<Route> {
        let hash = route_hash(&stations.iter().map(|s| s.id).collect::<Vec<_>>());
        self.lock().get_by_hash(stations, hash).map(|e| e.route.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn insert_count(&self) -> usize {
        self.lock().insert_count
    }

    pub fn eviction_count(&self) -> usize {
        self.lock().eviction_count
    }

    /// Snapshot of the current routes in insertion order.
    pub fn entries(&self) -> Vec<Route> {
        self.lock().entries.iter().map(|e| e.route.clone()).collect()
    }

    /// Snapshot sorted by criteria, descending lexicographically.
    pub fn sorted_entries(&self) -> Vec<Route> {
        let mut routes = self.entries();
        routes.sort_by(|a, b| compare_descending(a.criteria(), b.criteria()));
        routes
    }

    /// Sorted snapshot as serialisable summaries.
    pub fn summaries(&self) -> Vec<RouteSummary> {
        self.sorted_entries().iter().map(Route::summary).collect()
    }

    pub fn station_ids(&self) -> Vec<Vec<StationId>> {
        self.entries().iter().map(Route::ids).collect()
    }

    /// Offer every route of `other` to this list, untagged. Returns how many
    /// were accepted.
    pub fn merge_from<L>(&self, other: &RouteList<L>) -> usize {
        other
            .entries()
            .into_iter()
            .filter(|route| self.add(route.stations().to_vec(), None).accepted)
            .count()
    }
}

impl<K> std::fmt::Debug for RouteList<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let frontier = self.lock();
        f.debug_struct("RouteList")
            .field("criteria", &self.criteria)
            .field("routes", &frontier.entries.len())
            .field("insert_count", &frontier.insert_count)
            .field("eviction_count", &frontier.eviction_count)
            .finish()
    }
}

fn compare_descending(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        if (x - y).abs() > SORT_TOLERANCE {
            return y.partial_cmp(x).unwrap_or(Ordering::Equal);
        }
    }
    Ordering::Equal
}

/// Pareto-set difference between two frontiers on (time, flow), in `[-1, 1]`.
///
/// Both frontiers are merged and swept by descending flow (ties by ascending
/// time); each route that sets a new best time counts for its source, as do
/// routes matching the current best exactly. The result is the share of
/// counted routes from `target` minus the share from `baseline`. Positive
/// means `target` found the better frontier.
pub fn frontier_difference<A, B>(target: &RouteList<A>, baseline: &RouteList<B>) -> f64 {
    let target = target.entries();
    let baseline = baseline.entries();
    match (target.is_empty(), baseline.is_empty()) {
        (true, true) => return 0.0,
        (true, false) => return -1.0,
        (false, true) => return 1.0,
        (false, false) => {}
    }

    let mut merged: Vec<(usize, f64, f64)> = target
        .iter()
        .map(|r| (1, r.criteria()[0], r.criteria()[1]))
        .chain(baseline.iter().map(|r| (2, r.criteria()[0], r.criteria()[1])))
        .collect();
    merged.sort_by(|a, b| {
        if (a.2 - b.2).abs() < SORT_TOLERANCE {
            a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal)
        } else {
            b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal)
        }
    });

    let mut accepted = [0usize; 3];
    let (source, mut best_time, mut best_flow) = merged[0];
    accepted[0] = 1;
    accepted[source] = 1;
    for &(source, time, flow) in &merged[1..] {
        if (flow - best_flow).abs() < SORT_TOLERANCE && (time - best_time).abs() < SORT_TOLERANCE {
            accepted[source] += 1;
        } else if time < best_time - SORT_TOLERANCE {
            accepted[source] += 1;
            accepted[0] += 1;
            best_time = time;
            best_flow = flow;
        }
    }
    (accepted[1] as f64 - accepted[2] as f64) / accepted[0] as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, A, B, C, D, O};
    use crate::stations::StationContext;

    fn route(context: &StationContext, ids: &[StationId]) -> Vec<Arc<Station>> {
        ids.iter().map(|&id| Arc::clone(context.station(id).unwrap())).collect()
    }

    fn list<K>(context: &Arc<StationContext>) -> RouteList<K> {
        RouteList::new(Arc::new(CriteriaSet::standard(Arc::clone(context))))
    }

    #[test]
    fn dominated_candidate_is_rejected_without_evictions() {
        let context = fixtures::three_path_network();
        let routes: RouteList<&str> = list(&context);

        assert!(routes.add(route(&context, &[O, A, C, D]), Some("a")).accepted);
        let outcome = routes.add(route(&context, &[O, B, C, D]), Some("b"));
        assert!(!outcome.accepted);
        assert!(outcome.evicted.is_empty());
        assert_eq!(outcome.criteria[1], 17.0);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes.eviction_count(), 0);
    }

    #[test]
    fn dominating_candidate_evicts_and_returns_tags() {
        let context = fixtures::three_path_network();
        let routes: RouteList<&str> = list(&context);

        assert!(routes.add(route(&context, &[O, B, C, D]), Some("b")).accepted);
        assert!(routes.add(route(&context, &[O, C, D]), Some("direct")).accepted);
        let outcome = routes.add(route(&context, &[O, A, C, D]), Some("a"));
        assert!(outcome.accepted);
        assert_eq!(outcome.evicted, vec!["b"]);
        assert_eq!(routes.eviction_count(), 1);
        assert_eq!(routes.insert_count(), 3);

        let mut ids = routes.station_ids();
        ids.sort();
        assert_eq!(ids, vec![vec![O, A, C, D], vec![O, C, D]]);
    }

    #[test]
    fn reversed_route_is_a_duplicate() {
        let context = fixtures::three_path_network();
        let routes: RouteList = list(&context);

        let first = routes.add(route(&context, &[O, A, C, D]), None);
        let second = routes.add(route(&context, &[D, C, A, O]), None);
        assert!(first.accepted);
        assert!(!second.accepted);
        assert_eq!(first.criteria, second.criteria);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes.insert_count(), 2);
        assert!(routes.get_by_hash(&route(&context, &[D, C, A, O])).is_some());
        assert!(routes.get_by_hash(&route(&context, &[O, C, D])).is_none());
    }

    #[test]
    fn repeated_insertions_change_entries_once() {
        let context = fixtures::three_path_network();
        let routes: RouteList = list(&context);
        for attempt in 1..=4 {
            routes.add(route(&context, &[O, C, D]), None);
            assert_eq!(routes.insert_count(), attempt);
            assert_eq!(routes.len(), 1);
        }
    }

    #[test]
    fn sorted_entries_descend_lexicographically() {
        let context = fixtures::three_path_network();
        let routes: RouteList = list(&context);
        routes.add(route(&context, &[O, C, D]), None);
        routes.add(route(&context, &[O, A, C, D]), None);

        let sorted = routes.sorted_entries();
        assert!(sorted[0].criteria()[0] > sorted[1].criteria()[0]);
        assert_eq!(routes.summaries()[0].stations, vec![O, A, C, D]);
    }

    #[test]
    fn merge_offers_every_route() {
        let context = fixtures::three_path_network();
        let left: RouteList = list(&context);
        let right: RouteList<u32> = list(&context);
        left.add(route(&context, &[O, B, C, D]), None);
        right.add(route(&context, &[O, A, C, D]), Some(1));
        right.add(route(&context, &[O, C, D]), Some(2));

        assert_eq!(left.merge_from(&right), 2);
        assert_eq!(left.len(), 2);
        assert_eq!(left.eviction_count(), 1);
    }

    #[test]
    fn frontier_difference_edges() {
        let context = fixtures::three_path_network();
        let empty: RouteList = list(&context);
        let full: RouteList = list(&context);
        full.add(route(&context, &[O, A, C, D]), None);
        full.add(route(&context, &[O, C, D]), None);
        let partial: RouteList = list(&context);
        partial.add(route(&context, &[O, C, D]), None);

        assert_eq!(frontier_difference(&empty, &empty), 0.0);
        assert_eq!(frontier_difference(&empty, &full), -1.0);
        assert_eq!(frontier_difference(&full, &empty), 1.0);
        assert_eq!(frontier_difference(&full, &full), 0.0);
        // Sweep: O-A-C-D (full), then O-C-D from both at a better time.
        assert!((frontier_difference(&full, &partial) - 1.0 / 2.0).abs() < 1e-12);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_keep_one_copy() {
        let context = fixtures::three_path_network();
        let routes: Arc<RouteList> = Arc::new(list(&context));
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..32 {
            let routes = Arc::clone(&routes);
            let context = Arc::clone(&context);
            tasks.spawn(async move {
                let ids: &[StationId] = match i % 3 {
                    0 => &[O, A, C, D],
                    1 => &[O, B, C, D],
                    _ => &[O, C, D],
                };
                routes.add(route(&context, ids), None);
            });
        }
        while tasks.join_next().await.is_some() {}

        assert_eq!(routes.insert_count(), 32);
        let mut ids = routes.station_ids();
        ids.sort();
        assert_eq!(ids, vec![vec![O, A, C, D], vec![O, C, D]]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn no_entry_dominates_another(order in prop::collection::vec(0usize..3, 1..30)) {
                let context = fixtures::three_path_network();
                let routes: RouteList = list(&context);
                let candidates: [&[StationId]; 3] = [&[O, A, C, D], &[O, B, C, D], &[O, C, D]];
                for i in order {
                    routes.add(route(&context, candidates[i]), None);
                    let entries = routes.entries();
                    for (x, a) in entries.iter().enumerate() {
                        for (y, b) in entries.iter().enumerate() {
                            if x != y {
                                prop_assert!(!routes.criteria().dominates(a.criteria(), b.criteria()));
                            }
                        }
                    }
                }
            }
        }
    }
}
