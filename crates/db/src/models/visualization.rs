//! Visualization projects and the segment artifacts the external
//! generator reports for them.

use analyzer_core::analysis::VisualizationStatus;
use analyzer_core::types::{JobId, Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `visualization_projects` table.
#[derive(Debug, Clone, FromRow)]
pub struct VisualizationProjectRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationProject {
    pub id: JobId,
    pub owner_user_id: UserId,
    pub name: String,
    pub status: VisualizationStatus,
}

/// One segment file produced by the generator, as reported on the bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSegmentArtifact {
    pub project_id: JobId,
    pub file_path: String,
    pub segment_name: String,
    pub segment_index: i32,
}
