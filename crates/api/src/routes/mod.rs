pub mod health;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Live-session endpoints, mounted at the root.
///
/// ```text
/// /ws/analysis?userId=..          evaluation control channel
/// /ws/curation?userId=..          curation control channel
/// /ws/visualization?userId=..     visualization push channel
/// ```
pub fn ws_routes() -> Router<AppState> {
    Router::new()
        .route("/ws/analysis", get(ws::analysis_ws_handler))
        .route("/ws/curation", get(ws::curation_ws_handler))
        .route("/ws/visualization", get(ws::visualization_ws_handler))
}

/// Build the `/api/v1` route tree.
///
/// ```text
/// /{domain}/jobs/{job_id}/status      lifecycle state and checkpoint
/// /{domain}/jobs/{job_id}/results     persisted records, timeline order
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/{domain}/jobs/{job_id}/status", get(handlers::jobs::job_status))
        .route("/{domain}/jobs/{job_id}/results", get(handlers::jobs::job_results))
}
