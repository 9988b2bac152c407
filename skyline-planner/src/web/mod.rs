//! Web layer for the skyline planner.
//!
//! Provides HTTP endpoints for listing stations, searching skyline routes
//! and following search progress.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
