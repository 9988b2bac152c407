//! Station model and read-only lookup tables.
//!
//! Stations, their neighbour lists, pairwise road distances and pairwise trip
//! flows are loaded once and then shared by every graph build and search.
//! Only [`load_context`] touches the filesystem.

mod context;
mod error;
mod loader;
mod station;

pub use context::{BUS_SPEED, StationContext, StationContextBuilder};
pub use error::StationError;
pub use loader::{DataFiles, load_context};
pub use station::{Station, StationId};
