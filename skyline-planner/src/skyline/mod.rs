//! Route criteria, route identity and the skyline frontier.

pub mod criteria;
mod route;
mod route_list;

pub use criteria::{CriteriaSet, Criterion, DirectnessCriterion, FlowCriterion, TotalTimeCriterion};
pub use route::{Route, RouteSummary, route_hash};
pub use route_list::{AddOutcome, Frontier, RouteEntry, RouteList, frontier_difference};
