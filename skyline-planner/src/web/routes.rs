//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures::stream::{self, Stream};
use tokio::sync::watch;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::graph::{GraphBuilder, GraphError};
use crate::search::{
    DEFAULT_MAX_CONCURRENT, Heuristic, PbsConfig, RoundStats, SearchError, SkylineSearch, TreeSnapshot,
    search_brute_force, search_pbs_parallel,
};
use crate::skyline::RouteList;

use super::dto::*;
use super::state::AppState;

/// Create the application router.
///
/// `static_dir` is the path to the static assets directory.
pub fn create_router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stations", get(list_stations))
        .route("/api/routes", get(find_routes))
        .route("/api/snapshots", get(stream_snapshots))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Every loaded station.
async fn list_stations(State(state): State<AppState>) -> Json<StationsResponse> {
    let mut stations: Vec<StationResult> = state
        .context
        .stations()
        .map(|station| StationResult::from_station(station))
        .collect();
    stations.sort_by_key(|s| s.id);
    Json(StationsResponse { stations })
}

/// Build the graph between two stations and search it for skyline routes.
async fn find_routes(
    State(state): State<AppState>,
    Query(req): Query<RoutesRequest>,
) -> Result<Json<RoutesResponse>, AppError> {
    let stops = req
        .stop_ids()
        .map_err(|message| AppError::BadRequest { message })?;

    let builder = GraphBuilder::new(Arc::clone(&state.context), state.build.clone());
    let graph = if stops.is_empty() {
        builder.build(req.origin, req.dest).await?.into_graph()?
    } else {
        builder
            .build_with_stops(req.origin, req.dest, &stops)
            .await?
            .into_graph()?
            .restrict_to_waypoints()
    };
    info!(
        origin = %req.origin,
        destination = %req.dest,
        algorithm = ?req.algorithm,
        nodes = graph.len(),
        "searching routes"
    );

    let response = match req.algorithm {
        Algorithm::Mcts => {
            let mut config = (*state.config).clone();
            if let Some(heuristic) = &req.heuristic {
                config = config.with_heuristic(heuristic.parse::<Heuristic>().unwrap_or_default());
            }
            if let Some(seed) = req.seed {
                config = config.with_seed(seed);
            }
            let search =
                SkylineSearch::new(Arc::clone(&state.context), config)?.with_snapshots(Arc::clone(&state.snapshots));
            let outcome = tokio::task::spawn_blocking(move || search.search(&graph))
                .await
                .map_err(|e| AppError::Internal {
                    message: format!("Search task failed: {e}"),
                })?;
            routes_response(&outcome.routes, outcome.rounds)
        }
        Algorithm::Pbs => {
            let mut config = PbsConfig::default().bidirectional();
            config.seed = req.seed;
            let routes = search_pbs_parallel(Arc::clone(&state.context), Arc::new(graph), &config).await;
            routes_response(&routes, Vec::new())
        }
        Algorithm::BruteForce => {
            let routes =
                search_brute_force(Arc::clone(&state.context), Arc::new(graph), DEFAULT_MAX_CONCURRENT).await;
            routes_response(&routes, Vec::new())
        }
    };
    Ok(Json(response))
}

fn routes_response<K>(routes: &RouteList<K>, rounds: Vec<RoundStats>) -> RoutesResponse {
    RoutesResponse {
        criteria: routes.criteria().names(),
        routes: routes.summaries(),
        insertions: routes.insert_count(),
        evictions: routes.eviction_count(),
        rounds,
    }
}

/// Server-sent events carrying each tree snapshot the MCTS searches publish.
async fn stream_snapshots(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    Sse::new(snapshot_events(state.subscribe())).keep_alive(KeepAlive::default())
}

/// One `snapshot` event per change seen by `receiver`. Ends when the
/// sender is gone.
fn snapshot_events(
    receiver: watch::Receiver<Option<TreeSnapshot>>,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    stream::unfold(receiver, |mut receiver| async move {
        receiver.changed().await.ok()?;
        let snapshot = receiver.borrow_and_update().clone();
        let event = Event::default().event("snapshot").json_data(snapshot);
        Some((event, receiver))
    })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Internal { message: String },
}

impl From<GraphError> for AppError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::UnknownStation(_) => AppError::NotFound {
                message: e.to_string(),
            },
            GraphError::NotSearchable(_) => AppError::BadRequest {
                message: e.to_string(),
            },
            GraphError::ExpansionAborted(_) => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<SearchError> for AppError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::InvalidConfig(message) => AppError::BadRequest { message },
            SearchError::Graph(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            warn!(%status, %message, "request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, A, C, D, O};
    use crate::graph::BuildStatus;
    use crate::search::SearchConfig;
    use crate::stations::StationId;
    use futures::StreamExt;

    fn state() -> AppState {
        let config = SearchConfig::new(1, 1, 1.0, 100, 100, 1.0)
            .with_rounds(1)
            .with_heuristic(Heuristic::Uniform);
        AppState::new(fixtures::three_path_network(), config)
    }

    fn request(origin: StationId, dest: StationId, algorithm: Algorithm) -> RoutesRequest {
        RoutesRequest {
            origin,
            dest,
            stops: None,
            algorithm,
            heuristic: None,
            seed: Some(11),
        }
    }

    fn sorted_stations(response: &RoutesResponse) -> Vec<Vec<StationId>> {
        let mut stations: Vec<_> = response.routes.iter().map(|r| r.stations.clone()).collect();
        stations.sort();
        stations
    }

    #[tokio::test]
    async fn health_is_ok() {
        assert_eq!(health().await, "ok");
    }

    #[tokio::test]
    async fn stations_are_listed_by_id() {
        let Json(response) = list_stations(State(state())).await;
        let ids: Vec<StationId> = response.stations.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![O, A, StationId(3), C, D]);
        assert_eq!(response.stations[0].name, "Stop 1");
    }

    #[tokio::test]
    async fn every_algorithm_finds_the_skyline() {
        for algorithm in [Algorithm::Mcts, Algorithm::Pbs, Algorithm::BruteForce] {
            let Json(response) = find_routes(State(state()), Query(request(O, D, algorithm)))
                .await
                .unwrap();
            assert_eq!(
                sorted_stations(&response),
                vec![vec![O, A, C, D], vec![O, C, D]],
                "{algorithm:?}"
            );
            assert_eq!(response.criteria.len(), 3);
            assert!(response.insertions >= response.routes.len());
            assert_eq!(response.rounds.is_empty(), algorithm != Algorithm::Mcts);
        }
    }

    #[tokio::test]
    async fn stops_restrict_the_routes() {
        let mut req = request(O, D, Algorithm::BruteForce);
        req.stops = Some("2".to_string());
        let Json(response) = find_routes(State(state()), Query(req)).await.unwrap();
        assert_eq!(sorted_stations(&response), vec![vec![O, A, C, D]]);
    }

    #[tokio::test]
    async fn unknown_stations_are_not_found() {
        let result = find_routes(State(state()), Query(request(O, StationId(99), Algorithm::Mcts))).await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn unreachable_destinations_are_bad_requests() {
        let result = find_routes(State(state()), Query(request(D, O, Algorithm::Mcts))).await;
        let Err(AppError::BadRequest { message }) = result else {
            panic!("expected a bad request");
        };
        assert_eq!(message, GraphError::NotSearchable(BuildStatus::Unreachable).to_string());
    }

    #[tokio::test]
    async fn malformed_stops_are_bad_requests() {
        let mut req = request(O, D, Algorithm::Mcts);
        req.stops = Some("4,x".to_string());
        let result = find_routes(State(state()), Query(req)).await;
        assert!(matches!(result, Err(AppError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn mcts_requests_publish_snapshots() {
        let state = state();
        let mut receiver = state.subscribe();
        find_routes(State(state.clone()), Query(request(O, D, Algorithm::Mcts)))
            .await
            .unwrap();

        assert!(receiver.has_changed().unwrap());
        let snapshot = receiver.borrow_and_update().clone().unwrap();
        assert_eq!(snapshot.nodes[0].station, O);
    }

    #[tokio::test]
    async fn snapshot_events_follow_the_channel() {
        let (sender, receiver) = watch::channel(None);
        let mut events = Box::pin(snapshot_events(receiver));

        sender.send_replace(Some(TreeSnapshot {
            round: 0,
            step: 0,
            frontier_size: 0,
            nodes: Vec::new(),
        }));
        assert!(events.next().await.unwrap().is_ok());

        drop(sender);
        assert!(events.next().await.is_none());
    }

    #[test]
    fn errors_map_to_status_codes() {
        let status = |e: AppError| e.into_response().status();
        assert_eq!(
            status(AppError::BadRequest {
                message: "bad".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(GraphError::UnknownStation(StationId(9)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(SearchError::InvalidConfig("rounds must be positive".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(GraphError::ExpansionAborted("cancelled".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn router_registers_without_conflicts() {
        let _router = create_router(state(), "static");
    }
}
