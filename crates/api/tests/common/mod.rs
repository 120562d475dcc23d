#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use analyzer_api::config::ServerConfig;
use analyzer_api::router::build_app_router;
use analyzer_api::state::AppState;
use analyzer_core::analysis::{AnalysisDomain, CriteriaKind};
use analyzer_core::types::{JobId, UserId};
use analyzer_db::models::criteria::JobContext;
use analyzer_db::MemoryStore;
use analyzer_pipeline::{DomainSettings, PipelineConfig, StepBudget};
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::TimeDelta;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

/// Pipelines that finish a job in a few milliseconds.
pub fn fast_pipelines(steps: usize) -> PipelineConfig {
    let fast = |domain| DomainSettings {
        domain,
        step_delay: Duration::from_millis(2),
        budget: StepBudget::Fixed(steps),
        window: TimeDelta::minutes(10),
    };
    PipelineConfig {
        evaluation: fast(AnalysisDomain::Evaluation),
        curation: fast(AnalysisDomain::Curation),
    }
}

/// Application state and router over a fresh [`MemoryStore`].
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub router: Router,
}

/// Build the full application router, with the same middleware stack as
/// `main.rs`, over an in-memory store.
pub fn build_test_app(steps: usize) -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config.clone(), &fast_pipelines(steps), store.clone());
    let router = build_app_router(state.clone(), &config);

    TestApp {
        store,
        state,
        router,
    }
}

impl TestApp {
    pub async fn add_job(&self, id: &str, owner: &str, kind: CriteriaKind) -> JobId {
        let job_id = JobId::from(id);
        self.store
            .insert_job_context(JobContext {
                job_id: job_id.clone(),
                project_id: "project-1".into(),
                owner_user_id: UserId::from(owner),
                criteria_name: "lane keeping".into(),
                kind,
                tag_color: None,
            })
            .await;
        job_id
    }
}

/// Send a GET request through the router.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
