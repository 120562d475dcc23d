//! Read-only views of analysis jobs.

use analyzer_core::analysis::AnalysisDomain;
use analyzer_core::error::CoreError;
use analyzer_core::types::JobId;
use analyzer_db::models::result::ResultRecord;
use analyzer_pipeline::JobSnapshot;
use axum::extract::{Path, State};
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/{domain}/jobs/{job_id}/status
///
/// Current lifecycle state and checkpoint. `state` is `null` for a job that
/// is not running.
pub async fn job_status(
    State(state): State<AppState>,
    Path((domain, job_id)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<JobSnapshot>>> {
    let domain: AnalysisDomain = domain.parse()?;
    let snapshot = state
        .channel(domain)
        .pipeline
        .states
        .snapshot(&JobId::from(job_id));

    Ok(Json(DataResponse { data: snapshot }))
}

/// GET /api/v1/{domain}/jobs/{job_id}/results
pub async fn job_results(
    State(state): State<AppState>,
    Path((domain, job_id)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<Vec<ResultRecord>>>> {
    let domain: AnalysisDomain = domain.parse()?;
    let job_id = JobId::from(job_id);

    let context = state
        .store
        .load_job_context(&job_id)
        .await?
        .filter(|ctx| ctx.kind.domain() == domain)
        .ok_or_else(|| CoreError::not_found("project_criteria", &job_id))?;

    let records = state.store.list_results(&context.job_id).await?;
    Ok(Json(DataResponse { data: records }))
}
