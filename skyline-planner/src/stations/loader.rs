//! TSV loader for the station tables.
//!
//! Four tab-separated files, no header row:
//!
//! | file | columns |
//! |------|---------|
//! | stations | `id  name  lon  lat  trip_count` |
//! | neighbours | `id  comma-separated-ids` (or `nil`) |
//! | distances | `from  to  metres` |
//! | flows | `from  to  trips` |

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::context::StationContext;
use super::error::StationError;
use super::station::{Station, StationId};

/// Paths of the four station tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFiles {
    pub stations: PathBuf,
    pub neighbors: PathBuf,
    pub distances: PathBuf,
    pub flows: PathBuf,
}

impl DataFiles {
    /// The conventional file names inside one data directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            stations: dir.join("bus_stations.tsv"),
            neighbors: dir.join("station_neighbors.tsv"),
            distances: dir.join("dist_matrix.tsv"),
            flows: dir.join("flow_matrix.tsv"),
        }
    }
}

/// Load all four tables into a [`StationContext`].
///
/// Neighbour rows naming a station missing from the stations table are
/// skipped with a warning.
pub fn load_context(files: &DataFiles) -> Result<StationContext, StationError> {
    let mut builder = StationContext::builder();

    info!(path = %files.stations.display(), "loading stations");
    for_each_row(&files.stations, |(id, name, lon, lat, trips): (u32, String, f64, f64, u32), _| {
        builder.insert_station(
            Station::new(StationId(id), name, lon, lat).with_trip_count(trips),
        );
        Ok(())
    })?;

    info!(path = %files.neighbors.display(), "loading station neighbours");
    for_each_row(&files.neighbors, |(id, list): (u32, String), line| {
        let neighbors = parse_neighbor_list(&list)
            .map_err(|reason| malformed(&files.neighbors, line, reason))?;
        if !builder.set_neighbors(StationId(id), neighbors) {
            warn!(station = id, line, "neighbour row for unknown station");
        }
        Ok(())
    })?;

    info!(path = %files.distances.display(), "loading station distances");
    for_each_row(&files.distances, |(from, to, metres): (u32, u32, f64), _| {
        builder.insert_distance(StationId(from), StationId(to), metres);
        Ok(())
    })?;

    info!(path = %files.flows.display(), "loading flow matrix");
    for_each_row(&files.flows, |(from, to, trips): (u32, u32, u64), _| {
        builder.insert_flow(StationId(from), StationId(to), trips);
        Ok(())
    })?;

    let context = builder.build();
    info!(
        stations = context.len(),
        distances = context.distance_count(),
        flows = context.flow_count(),
        "station data loaded"
    );
    Ok(context)
}

fn for_each_row<T, F>(path: &Path, mut handle: F) -> Result<(), StationError>
where
    T: DeserializeOwned,
    F: FnMut(T, u64) -> Result<(), StationError>,
{
    let file = File::open(path).map_err(|source| StationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(file);

    let mut record = StringRecord::new();
    loop {
        let more = reader
            .read_record(&mut record)
            .map_err(|source| StationError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        if !more {
            return Ok(());
        }
        let line = record.position().map_or(0, |p| p.line());
        let row: T = record
            .deserialize(None)
            .map_err(|e| malformed(path, line, e.to_string()))?;
        handle(row, line)?;
    }
}

fn parse_neighbor_list(list: &str) -> Result<Vec<StationId>, String> {
    let list = list.trim();
    if list == "nil" || list.is_empty() {
        return Ok(Vec::new());
    }
    list.split(',')
        .map(|id| {
            id.trim()
                .parse::<u32>()
                .map(StationId)
                .map_err(|e| format!("bad neighbour id {id:?}: {e}"))
        })
        .collect()
}

fn malformed(path: &Path, line: u64, reason: String) -> StationError {
    StationError::Malformed {
        path: path.to_path_buf(),
        line,
        reason,
    }
}
