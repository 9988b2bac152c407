//! Route criteria and their path-weighted gain estimators.
//!
//! A [`Criterion`] scores complete routes and, once its estimator has been
//! initialised over a graph, predicts the expected score of the routes that
//! continue a partial path through a given candidate. Predictions are exact
//! path-count-weighted averages over every completion; counts are big
//! integers so large graphs neither overflow nor lose precision.

mod directness;
mod exact;
mod flow;
mod topology;
mod total_time;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::graph::{NodeId, StationGraph};
use crate::stations::{Station, StationContext};

pub use directness::DirectnessCriterion;
pub use flow::FlowCriterion;
pub use topology::{PathCounts, Topology};
pub use total_time::{DWELL_SECONDS, TotalTimeCriterion};

/// One optimisation objective over routes.
pub trait Criterion: Send + Sync {
    /// Short display name.
    fn name(&self) -> &'static str;

    /// Score a complete route.
    fn evaluate(&self, route: &[Arc<Station>]) -> f64;

    /// Whether score `a` is at least as good as score `b`.
    fn at_least_as_good(&self, a: f64, b: f64) -> bool;

    /// Map `value` from `[min, max]` onto `[0.05, 1.0]`, better scores higher.
    fn normalize(&self, value: f64, min: f64, max: f64) -> f64;

    /// Precompute prediction tables for `topology`'s graph.
    fn init_estimator(&mut self, topology: &Topology<'_>);

    /// Expected score of routes that extend `path` through `candidate`.
    ///
    /// Zero before [`init_estimator`](Criterion::init_estimator) has run or
    /// when `candidate` is not part of the initialised graph.
    fn predict_gain(&self, path: &[NodeId], candidate: NodeId) -> f64;
}

/// Normalisation shared by lower-is-better criteria.
pub(crate) fn normalize_descending(value: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return 1.0;
    }
    (max - value) / (max - min) * 0.95 + 0.05
}

/// Normalisation shared by higher-is-better criteria.
pub(crate) fn normalize_ascending(value: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return 1.0;
    }
    (value - min) / (max - min) * 0.95 + 0.05
}

/// The ordered criteria a route list ranks by.
pub struct CriteriaSet {
    criteria: Vec<Box<dyn Criterion>>,
}

impl CriteriaSet {
    pub fn new(criteria: Vec<Box<dyn Criterion>>) -> Self {
        Self { criteria }
    }

    /// Total time, flow and directness, in that order.
    pub fn standard(context: Arc<StationContext>) -> Self {
        Self::new(vec![
            Box::new(TotalTimeCriterion::new(Arc::clone(&context))),
            Box::new(FlowCriterion::new(Arc::clone(&context))),
            Box::new(DirectnessCriterion::new(context)),
        ])
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Criterion> {
        self.criteria.iter().map(|c| c.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|c| c.name()).collect()
    }

    /// Initialise every estimator over `graph`.
    pub fn init_estimators(&mut self, graph: &StationGraph) {
        let topology = Topology::new(graph);
        for criterion in &mut self.criteria {
            criterion.init_estimator(&topology);
        }
        debug!(
            nodes = topology.len(),
            routes = %topology.counts().get(0, topology.destination()),
            criteria = ?self.names(),
            "estimators initialised"
        );
    }

    /// Score a route on every criterion.
    pub fn evaluate(&self, route: &[Arc<Station>]) -> Vec<f64> {
        self.iter().map(|c| c.evaluate(route)).collect()
    }

    /// `a` is at least as good as `b` on every criterion.
    pub fn dominates(&self, a: &[f64], b: &[f64]) -> bool {
        self.iter()
            .zip(a.iter().zip(b))
            .all(|(criterion, (&x, &y))| criterion.at_least_as_good(x, y))
    }
}

impl fmt::Debug for CriteriaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, A, B, C, D, O};

    fn route(context: &StationContext, ids: &[crate::stations::StationId]) -> Vec<Arc<Station>> {
        ids.iter().map(|&id| Arc::clone(context.station(id).unwrap())).collect()
    }

    #[test]
    fn standard_order() {
        let set = CriteriaSet::standard(fixtures::three_path_network());
        assert_eq!(set.names(), vec!["TotalTime", "Flow", "Directness"]);
        assert_eq!(format!("{set:?}"), r#"["TotalTime", "Flow", "Directness"]"#);
    }

    #[test]
    fn dominance_is_non_strict() {
        let context = fixtures::three_path_network();
        let set = CriteriaSet::standard(Arc::clone(&context));
        let via_a = set.evaluate(&route(&context, &[O, A, C, D]));
        let via_b = set.evaluate(&route(&context, &[O, B, C, D]));
        let direct = set.evaluate(&route(&context, &[O, C, D]));

        assert!(set.dominates(&via_a, &via_b));
        assert!(!set.dominates(&via_b, &via_a));
        assert!(set.dominates(&via_a, &via_a));
        assert!(!set.dominates(&via_a, &direct));
        assert!(!set.dominates(&direct, &via_a));
    }

    #[test]
    fn normalisation_edges() {
        assert_eq!(normalize_ascending(5.0, 5.0, 5.0), 1.0);
        assert_eq!(normalize_descending(5.0, 5.0, 5.0), 1.0);
        assert!((normalize_ascending(10.0, 0.0, 10.0) - 1.0).abs() < 1e-12);
        assert!((normalize_ascending(0.0, 0.0, 10.0) - 0.05).abs() < 1e-12);
        assert!((normalize_descending(0.0, 0.0, 10.0) - 1.0).abs() < 1e-12);
        assert!((normalize_descending(10.0, 0.0, 10.0) - 0.05).abs() < 1e-12);
    }
}
