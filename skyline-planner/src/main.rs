use std::error::Error;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use skyline_planner::graph::{BuildConfig, GraphBuilder};
use skyline_planner::search::{
    DEFAULT_MAX_CONCURRENT, Heuristic, PbsConfig, SearchConfig, SkylineSearch, search_brute_force,
    search_pbs_parallel,
};
use skyline_planner::skyline::RouteSummary;
use skyline_planner::stations::{DataFiles, StationContext, StationId, load_context};
use skyline_planner::web::{AppState, create_router};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Read a station id from the environment.
fn station_var(name: &str) -> Result<StationId, Box<dyn Error>> {
    let value = std::env::var(name).map_err(|_| format!("{name} must be set"))?;
    let id = value
        .trim()
        .parse()
        .map_err(|e| format!("{name}={value:?} is not a station id: {e}"))?;
    Ok(StationId(id))
}

/// Comma-separated station ids, empty when unset.
fn stops_var(name: &str) -> Result<Vec<StationId>, Box<dyn Error>> {
    let Ok(value) = std::env::var(name) else {
        return Ok(Vec::new());
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map(StationId)
                .map_err(|e| format!("{name}: {s:?} is not a station id: {e}").into())
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let data_dir = std::env::var("SKYLINE_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let context = Arc::new(load_context(&DataFiles::in_dir(&data_dir))?);
    info!(stations = context.len(), dir = %data_dir, "station tables loaded");

    match std::env::args().nth(1).as_deref() {
        Some("serve") => serve(context).await,
        _ => search_once(context).await,
    }
}

/// Serve the HTTP API until the process is stopped.
async fn serve(context: Arc<StationContext>) -> Result<(), Box<dyn Error>> {
    let addr: SocketAddr = std::env::var("SKYLINE_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()?;
    let static_dir = std::env::var("SKYLINE_STATIC_DIR").unwrap_or_else(|_| "static".to_string());

    let state = AppState::new(context, SearchConfig::default());
    let app = create_router(state, &static_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "skyline planner listening");
    info!("  GET /health        - Health check");
    info!("  GET /api/stations  - All stations");
    info!("  GET /api/routes    - Skyline routes (?origin=&dest=[&stops=&algorithm=&heuristic=&seed=])");
    info!("  GET /api/snapshots - Search tree snapshots (server-sent events)");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Search the environment-configured trip once and print the frontier.
async fn search_once(context: Arc<StationContext>) -> Result<(), Box<dyn Error>> {
    let origin = station_var("SKYLINE_ORIGIN")?;
    let destination = station_var("SKYLINE_DESTINATION")?;
    let stops = stops_var("SKYLINE_STOPS")?;
    let seed = match std::env::var("SKYLINE_SEED") {
        Ok(seed) => Some(seed.trim().parse::<u64>()?),
        Err(_) => None,
    };
    let algorithm = std::env::var("SKYLINE_ALGORITHM").unwrap_or_else(|_| "mcts".to_string());

    let builder = GraphBuilder::new(Arc::clone(&context), BuildConfig::default());
    let graph = if stops.is_empty() {
        builder.build(origin, destination).await?.into_graph()?
    } else {
        builder
            .build_with_stops(origin, destination, &stops)
            .await?
            .into_graph()?
            .restrict_to_waypoints()
    };
    info!(routes = %graph.count_routes(), "searching");

    let summaries: Vec<RouteSummary> = match algorithm.as_str() {
        "pbs" => {
            let mut config = PbsConfig::default().bidirectional();
            config.seed = seed;
            search_pbs_parallel(Arc::clone(&context), Arc::new(graph), &config)
                .await
                .summaries()
        }
        "brute-force" => search_brute_force(Arc::clone(&context), Arc::new(graph), DEFAULT_MAX_CONCURRENT)
            .await
            .summaries(),
        _ => {
            let mut config = SearchConfig::default();
            if let Ok(heuristic) = std::env::var("SKYLINE_HEURISTIC") {
                config = config.with_heuristic(Heuristic::from_str(&heuristic)?);
            }
            config.seed = seed;
            let search = SkylineSearch::new(Arc::clone(&context), config)?;
            let outcome = search.search(&graph);
            for round in &outcome.rounds {
                info!(
                    round = round.round,
                    pool = round.pool_size,
                    explorations = round.explorations,
                    frontier = round.frontier_size,
                    "round"
                );
            }
            outcome.routes.summaries()
        }
    };

    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
