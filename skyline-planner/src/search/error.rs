//! Search error types.

use crate::graph::GraphError;

/// Errors that stop a search before it starts.
///
/// Dead-end walks and exhausted trees are normal outcomes of randomized
/// exploration and never surface here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    /// Search parameters the schedule cannot run with
    #[error("invalid search configuration: {0}")]
    InvalidConfig(String),

    /// The graph cannot be searched
    #[error(transparent)]
    Graph(#[from] GraphError),
}
