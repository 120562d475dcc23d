//! Integration tests for the health check and the read-only job endpoints.

mod common;

use analyzer_core::analysis::CriteriaKind;
use analyzer_core::types::UserId;
use axum::http::StatusCode;
use common::{body_json, get};

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = common::build_test_app(3);
    let response = get(app.router, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["store_healthy"], true);
    assert_eq!(json["workers"]["evaluation"], 0);
    assert_eq!(json["live_sessions"], 0);
}

// ---------------------------------------------------------------------------
// Test: /health counts the worker a user's first job spawned
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_spawned_workers() {
    let app = common::build_test_app(1);
    let job = app.add_job("pc-cur", "u1", CriteriaKind::Curation).await;
    let user = UserId::from("u1");

    let pipeline = &app.state.curation.pipeline;
    pipeline.controller.start(&user, &job).unwrap();
    pipeline.scheduler.wait_idle(&user).await;

    let json = body_json(get(app.router, "/health").await).await;
    assert_eq!(json["workers"]["curation"], 1);
    assert_eq!(json["workers"]["evaluation"], 0);
}

// ---------------------------------------------------------------------------
// Test: status of an idle job has no state and no checkpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_of_idle_job_is_empty() {
    let app = common::build_test_app(3);
    let response = get(app.router, "/api/v1/evaluation/jobs/pc-1/status").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["job_id"], "pc-1");
    assert!(json["data"]["state"].is_null());
    assert!(json["data"]["checkpoint"].is_null());
}

// ---------------------------------------------------------------------------
// Test: an unknown domain segment is a validation error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_domain_returns_400() {
    let app = common::build_test_app(3);
    let response = get(app.router, "/api/v1/weather/jobs/pc-1/status").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: results of an unknown job return 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn results_of_unknown_job_return_404() {
    let app = common::build_test_app(3);
    let response = get(app.router, "/api/v1/evaluation/jobs/missing/results").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Test: results are scoped to the job's own domain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn results_under_other_domain_return_404() {
    let app = common::build_test_app(3);
    app.add_job("pc-cur", "u1", CriteriaKind::Curation).await;

    let response = get(app.router, "/api/v1/evaluation/jobs/pc-cur/results").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: results of a finished job list every step in timeline order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn results_of_finished_job_are_listed() {
    let app = common::build_test_app(3);
    let job = app.add_job("pc-score", "u1", CriteriaKind::Score).await;
    let user = UserId::from("u1");

    let pipeline = &app.state.evaluation.pipeline;
    pipeline.controller.start(&user, &job).unwrap();
    pipeline.scheduler.wait_idle(&user).await;

    let response = get(app.router, "/api/v1/evaluation/jobs/pc-score/results").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let records = json["data"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    let steps: Vec<_> = records.iter().map(|r| r["step_index"].as_i64().unwrap()).collect();
    assert_eq!(steps, vec![0, 1, 2]);
}
