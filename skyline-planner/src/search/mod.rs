//! Skyline route search.
//!
//! [`SkylineSearch`] runs Monte-Carlo tree search guided by the criteria
//! estimators. [`search_pbs`] and [`search_pbs_parallel`] are the random-walk
//! baseline it is measured against, and [`search_brute_force`] enumerates
//! every route for small graphs.

mod brute_force;
mod config;
mod error;
mod mcts;
mod pbs;
mod sampling;
mod snapshot;


pub use brute_force::{DEFAULT_MAX_CONCURRENT, search_brute_force};
pub use config::{Heuristic, PbsConfig, SearchConfig};
pub use error::SearchError;
pub use mcts::{
    Contribution, MonteCarloTree, RoundStats, SearchOutcome, SkylineSearch, TreeIndex, TreeNode,
};
pub use pbs::{search_pbs, search_pbs_parallel};
pub use snapshot::{SnapshotNode, TreeSnapshot};
