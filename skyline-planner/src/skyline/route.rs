//! Candidate routes and their direction-symmetric identity.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::stations::{Station, StationId};

const HASH_MODULUS: u64 = 121_527_269;

/// Order-aware hash that treats a route and its reversal as the same route.
///
/// Position `i` mixes in the id at `i` and the id at `n - 1 - i`, so the
/// reversed sequence feeds identical terms in identical order.
pub fn route_hash(ids: &[StationId]) -> u64 {
    let n = ids.len();
    (0..n).fold(0u64, |hash, i| {
        let term = u64::from(ids[i].get()) + u64::from(ids[n - 1 - i].get());
        (hash * 17 + term) % HASH_MODULUS
    })
}

/// A concrete origin-to-destination station sequence with its criteria.
#[derive(Clone)]
pub struct Route {
    stations: Vec<Arc<Station>>,
    criteria: Vec<f64>,
    hash: u64,
}

impl Route {
    pub fn new(stations: Vec<Arc<Station>>, criteria: Vec<f64>) -> Self {
        let hash = route_hash(&ids(&stations));
        Self {
            stations,
            criteria,
            hash,
        }
    }

    pub fn stations(&self) -> &[Arc<Station>] {
        &self.stations
    }

    pub fn ids(&self) -> Vec<StationId> {
        ids(&self.stations)
    }

    pub fn criteria(&self) -> &[f64] {
        &self.criteria
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Same stations, read forwards or backwards.
    pub fn same_stations(&self, other: &[Arc<Station>]) -> bool {
        if self.stations.len() != other.len() {
            return false;
        }
        let forward = self.stations.iter().zip(other).all(|(a, b)| a.id == b.id);
        forward || self.stations.iter().rev().zip(other).all(|(a, b)| a.id == b.id)
    }

    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            stations: self.ids(),
            criteria: self.criteria.clone(),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("stations", &self.ids())
            .field("criteria", &self.criteria)
            .finish()
    }
}

/// Serialisable view of a route: station ids and criteria values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub stations: Vec<StationId>,
    pub criteria: Vec<f64>,
}

fn ids(stations: &[Arc<Station>]) -> Vec<StationId> {
    stations.iter().map(|s| s.id).collect()
}
