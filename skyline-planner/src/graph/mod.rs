//! Directed acyclic station graphs between a fixed origin and destination.
//!
//! A graph is grown from the origin by following station neighbour lists,
//! keeping only edges that make geometric progress toward the destination
//! (see [`is_admissible`]). Nodes live in an arena and refer to each other by
//! [`NodeId`].

mod admissibility;
mod builder;
mod error;
mod station_graph;
mod waypoints;

pub use admissibility::{
    is_admissible, is_destination_closer, is_moving_forward, is_origin_farther, is_zigzag,
};
pub use builder::{BuildConfig, BuildOutcome, BuildStatus, GraphBuilder};
pub use error::GraphError;
pub use station_graph::{ChoiceStats, NodeId, StationGraph, StationNode};
