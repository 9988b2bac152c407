//! Read-only lookup tables shared by graph construction and search.

use std::collections::HashMap;
use std::sync::Arc;

use super::station::{Station, StationId};

/// Average bus speed in metres per second (50 km/h).
pub const BUS_SPEED: f64 = 50.0 * 1000.0 / 3600.0;

/// Stations plus pairwise distance and flow tables.
///
/// Missing pairs read as zero. The context is built once (by
/// [`StationContextBuilder`] or the TSV loader) and then shared immutably.
#[derive(Debug, Default)]
pub struct StationContext {
    stations: HashMap<StationId, Arc<Station>>,
    distances: HashMap<(StationId, StationId), f64>,
    flows: HashMap<(StationId, StationId), u64>,
}

impl StationContext {
    /// Start building a context.
    pub fn builder() -> StationContextBuilder {
        StationContextBuilder::default()
    }

    /// Look up a station by id.
    pub fn station(&self, id: StationId) -> Option<&Arc<Station>> {
        self.stations.get(&id)
    }

    /// Iterate over every station, in no particular order.
    pub fn stations(&self) -> impl Iterator<Item = &Arc<Station>> {
        self.stations.values()
    }

    /// Number of stations.
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Whether the context has no stations.
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Road distance in metres, zero when unknown.
    pub fn distance(&self, from: StationId, to: StationId) -> f64 {
        self.distances.get(&(from, to)).copied().unwrap_or(0.0)
    }

    /// Travel time in seconds at [`BUS_SPEED`].
    pub fn travel_time(&self, from: StationId, to: StationId) -> f64 {
        self.distance(from, to) / BUS_SPEED
    }

    /// Observed trips from `from` to `to`, zero when unknown.
    pub fn flow(&self, from: StationId, to: StationId) -> u64 {
        self.flows.get(&(from, to)).copied().unwrap_or(0)
    }

    /// Number of distance entries.
    pub fn distance_count(&self) -> usize {
        self.distances.len()
    }

    /// Number of flow entries.
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }
}

/// Builder for [`StationContext`].
#[derive(Debug, Default)]
pub struct StationContextBuilder {
    stations: HashMap<StationId, Station>,
    distances: HashMap<(StationId, StationId), f64>,
    flows: HashMap<(StationId, StationId), u64>,
}

impl StationContextBuilder {
    /// Add a station, replacing any earlier one with the same id.
    pub fn station(mut self, station: Station) -> Self {
        self.insert_station(station);
        self
    }

    /// Set the neighbour list of an already-added station.
    /// Unknown station ids are ignored.
    pub fn neighbors(mut self, id: StationId, neighbors: &[StationId]) -> Self {
        self.set_neighbors(id, neighbors.iter().copied());
        self
    }

    /// Record a one-way distance in metres.
    pub fn distance(mut self, from: StationId, to: StationId, metres: f64) -> Self {
        self.insert_distance(from, to, metres);
        self
    }

    /// Record the same distance in both directions.
    pub fn symmetric_distance(self, a: StationId, b: StationId, metres: f64) -> Self {
        self.distance(a, b, metres).distance(b, a, metres)
    }

    /// Record a one-way flow.
    pub fn flow(mut self, from: StationId, to: StationId, trips: u64) -> Self {
        self.insert_flow(from, to, trips);
        self
    }

    /// Whether a station with this id has been added.
    pub fn contains(&self, id: StationId) -> bool {
        self.stations.contains_key(&id)
    }

    pub(crate) fn insert_station(&mut self, station: Station) {
        self.stations.insert(station.id, station);
    }

    pub(crate) fn set_neighbors(
        &mut self,
        id: StationId,
        neighbors: impl IntoIterator<Item = StationId>,
    ) -> bool {
        match self.stations.remove(&id) {
            Some(station) => {
                self.stations.insert(id, station.with_neighbors(neighbors));
                true
            }
            None => false,
        }
    }

    pub(crate) fn insert_distance(&mut self, from: StationId, to: StationId, metres: f64) {
        self.distances.insert((from, to), metres);
    }

    pub(crate) fn insert_flow(&mut self, from: StationId, to: StationId, trips: u64) {
        self.flows.insert((from, to), trips);
    }

    /// Freeze into a shared context.
    pub fn build(self) -> StationContext {
        StationContext {
            stations: self
                .stations
                .into_iter()
                .map(|(id, station)| (id, Arc::new(station)))
                .collect(),
            distances: self.distances,
            flows: self.flows,
        }
    }
}
