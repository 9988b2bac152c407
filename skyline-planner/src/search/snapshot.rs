//! Serializable views of the search tree for live progress display.

use serde::Serialize;

use crate::stations::StationId;

/// One tree node as seen by a progress subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotNode {
    pub station: StationId,
    pub parent: Option<StationId>,
    pub depth: usize,
    pub visits: u64,
    pub reward: f64,
    pub skyline_contribution: u32,
    /// UCT score against the parent; `None` for the root.
    pub uct: Option<f64>,
}

/// The attached tree nodes at one point of a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeSnapshot {
    pub round: usize,
    pub step: usize,
    pub frontier_size: usize,
    pub nodes: Vec<SnapshotNode>,
}
