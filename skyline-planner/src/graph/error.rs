//! Graph construction error types.

use super::builder::BuildStatus;
use crate::stations::StationId;

/// Errors that can occur when building a station graph.
///
/// An unreachable destination or a cyclic graph is not an error: those come
/// back as a [`BuildStatus`] on the build outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// An endpoint, waypoint or edge named a station the context does not know
    #[error("unknown station: {0}")]
    UnknownStation(StationId),

    /// The graph was requested for search after a failed build
    #[error("graph is not searchable: {0:?}")]
    NotSearchable(BuildStatus),

    /// An expansion task was cancelled before finishing
    #[error("graph expansion aborted: {0}")]
    ExpansionAborted(String),
}
