//! Application state for the web layer.

use std::sync::Arc;

use tokio::sync::watch;

use crate::graph::BuildConfig;
use crate::search::{SearchConfig, TreeSnapshot};
use crate::stations::StationContext;

/// Shared application state.
///
/// Contains everything the handlers need to build graphs and run searches.
#[derive(Clone)]
pub struct AppState {
    /// Station tables, loaded once at startup
    pub context: Arc<StationContext>,

    /// MCTS preset; requests may override the heuristic and seed
    pub config: Arc<SearchConfig>,

    /// Graph construction settings
    pub build: BuildConfig,

    /// Tree snapshots of the running MCTS searches
    pub snapshots: Arc<watch::Sender<Option<TreeSnapshot>>>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(context: Arc<StationContext>, config: SearchConfig) -> Self {
        let (snapshots, _) = watch::channel(None);
        Self {
            context,
            config: Arc::new(config),
            build: BuildConfig::default(),
            snapshots: Arc::new(snapshots),
        }
    }

    pub fn with_build_config(mut self, build: BuildConfig) -> Self {
        self.build = build;
        self
    }

    /// Follow the snapshots published by searches started after this call.
    pub fn subscribe(&self) -> watch::Receiver<Option<TreeSnapshot>> {
        self.snapshots.subscribe()
    }
}
