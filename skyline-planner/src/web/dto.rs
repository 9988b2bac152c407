//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::search::RoundStats;
use crate::skyline::RouteSummary;
use crate::stations::{Station, StationId};

/// A station in the station list.
#[derive(Debug, Serialize)]
pub struct StationResult {
    pub id: StationId,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub trip_count: u32,
}

impl StationResult {
    pub fn from_station(station: &Station) -> Self {
        Self {
            id: station.id,
            name: station.name.clone(),
            lon: station.lon,
            lat: station.lat,
            trip_count: station.trip_count,
        }
    }
}

/// Every loaded station, ordered by id.
#[derive(Debug, Serialize)]
pub struct StationsResponse {
    pub stations: Vec<StationResult>,
}

/// Search strategy for a routes request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    #[default]
    Mcts,
    Pbs,
    BruteForce,
}

/// Request for the skyline routes between two stations.
#[derive(Debug, Deserialize)]
pub struct RoutesRequest {
    /// Origin station id
    pub origin: StationId,

    /// Destination station id
    pub dest: StationId,

    /// Comma-separated station ids every route must pass, in order
    pub stops: Option<String>,

    /// Search strategy (defaults to MCTS)
    #[serde(default)]
    pub algorithm: Algorithm,

    /// MCTS expansion heuristic: "uniform", "flow" or "estimation"
    pub heuristic: Option<String>,

    /// Seed for reproducible searches
    pub seed: Option<u64>,
}

impl RoutesRequest {
    /// The requested stops, in order. Blank entries are ignored.
    pub fn stop_ids(&self) -> Result<Vec<StationId>, String> {
        let Some(stops) = &self.stops else {
            return Ok(Vec::new());
        };
        stops
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse()
                    .map(StationId)
                    .map_err(|_| format!("Invalid stop: {s}"))
            })
            .collect()
    }
}

/// The skyline found for a routes request.
#[derive(Debug, Serialize)]
pub struct RoutesResponse {
    /// Criterion names, in the order of each route's `criteria`
    pub criteria: Vec<&'static str>,

    /// Frontier routes, best first
    pub routes: Vec<RouteSummary>,

    /// Routes offered to the frontier
    pub insertions: usize,

    /// Routes dropped from the frontier by later ones
    pub evictions: usize,

    /// Per-round statistics; empty for the baselines
    pub rounds: Vec<RoundStats>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
