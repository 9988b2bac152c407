//! Station records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric station identifier, as used by every source table.
///
/// # Examples
///
/// ```
/// use skyline_planner::stations::StationId;
///
/// let id = StationId(6842);
/// assert_eq!(id.to_string(), "6842");
/// assert_eq!(format!("{:?}", id), "StationId(6842)");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(pub u32);

impl StationId {
    /// Returns the raw numeric id.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StationId({})", self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bus station.
///
/// Stations are immutable once loaded and are shared (behind `Arc`) by every
/// graph and route that mentions them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    /// Station id.
    pub id: StationId,

    /// Display name.
    pub name: String,

    /// Longitude.
    pub lon: f64,

    /// Latitude.
    pub lat: f64,

    /// Number of scheduled trips serving this station.
    pub trip_count: u32,

    /// Stations reachable by a single hop from this one.
    #[serde(skip)]
    pub neighbors: Vec<StationId>,
}

impl Station {
    /// Create a station with no trips and no neighbours.
    pub fn new(id: StationId, name: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            id,
            name: name.into(),
            lon,
            lat,
            trip_count: 0,
            neighbors: Vec::new(),
        }
    }

    /// Set the trip count.
    pub fn with_trip_count(mut self, trip_count: u32) -> Self {
        self.trip_count = trip_count;
        self
    }

    /// Set the neighbour list. Duplicate ids are dropped, first occurrence wins.
    pub fn with_neighbors(mut self, neighbors: impl IntoIterator<Item = StationId>) -> Self {
        self.neighbors.clear();
        for id in neighbors {
            if !self.neighbors.contains(&id) {
                self.neighbors.push(id);
            }
        }
        self
    }

    /// Planar offset `(dlon, dlat)` of this station relative to `other`.
    pub fn offset_from(&self, other: &Station) -> (f64, f64) {
        (self.lon - other.lon, self.lat - other.lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_formatting() {
        let id = StationId(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "StationId(42)");
        assert_eq!(id.get(), 42);
    }

    #[test]
    fn neighbors_are_deduplicated() {
        let station = Station::new(StationId(1), "A", 0.0, 0.0).with_neighbors([
            StationId(2),
            StationId(3),
            StationId(2),
        ]);
        assert_eq!(station.neighbors, vec![StationId(2), StationId(3)]);
    }

    #[test]
    fn offset_is_componentwise() {
        let a = Station::new(StationId(1), "A", 120.5, 30.25);
        let b = Station::new(StationId(2), "B", 120.0, 30.0);
        assert_eq!(a.offset_from(&b), (0.5, 0.25));
        assert_eq!(b.offset_from(&a), (-0.5, -0.25));
    }

    #[test]
    fn serializes_without_neighbors() {
        let station = Station::new(StationId(7), "Stop", 1.0, 2.0)
            .with_trip_count(12)
            .with_neighbors([StationId(8)]);
        let json = serde_json::to_value(&station).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["trip_count"], 12);
        assert!(json.get("neighbors").is_none());
    }
}
