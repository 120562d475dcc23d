//! Project-criteria association as seen by the job executor.

use analyzer_core::analysis::CriteriaKind;
use analyzer_core::types::{JobId, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// Everything the executor needs to know about one job before it runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobContext {
    pub job_id: JobId,
    pub project_id: String,
    pub owner_user_id: UserId,
    pub criteria_name: String,
    pub kind: CriteriaKind,
    pub tag_color: Option<String>,
}

/// Raw row joined from `project_criteria`, `analysis_projects` and `criteria`.
#[derive(Debug, Clone, FromRow)]
pub struct JobContextRow {
    pub id: String,
    pub project_id: String,
    pub owner_user_id: String,
    pub criteria_name: String,
    pub kind: String,
    pub tag_color: Option<String>,
}
