use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the store is unreachable.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub store_healthy: bool,
    /// Per-user workers currently alive, by domain.
    pub workers: WorkerCounts,
    /// Live sessions across all WebSocket endpoints.
    pub live_sessions: usize,
}

#[derive(Serialize)]
pub struct WorkerCounts {
    pub evaluation: usize,
    pub curation: usize,
}

/// GET /health
///
/// Never fails: an unreachable store is reported, not raised, so the check
/// still distinguishes "process up" from "process down".
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_healthy = match state.store.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    };

    let mut live_sessions = 0;
    for registry in state.session_registries() {
        live_sessions += registry.connection_count().await;
    }

    Json(HealthResponse {
        status: if store_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        store_healthy,
        workers: WorkerCounts {
            evaluation: state.evaluation.pipeline.scheduler.worker_count(),
            curation: state.curation.pipeline.scheduler.worker_count(),
        },
        live_sessions,
    })
}

/// Mounted at the root, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
