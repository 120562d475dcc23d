//! Repository for `visualization_projects` and their `rrd_files`.

use sqlx::PgPool;

use crate::models::visualization::{NewSegmentArtifact, VisualizationProjectRow};

/// Column list for `visualization_projects` queries.
const COLUMNS: &str = "id, user_id, name, status, created_at, updated_at";

pub struct VisualizationRepo;

impl VisualizationRepo {
    pub async fn find_by_id(
        pool: &PgPool,
        id: &str,
    ) -> Result<Option<VisualizationProjectRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM visualization_projects WHERE id = $1");
        sqlx::query_as::<_, VisualizationProjectRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Record one segment file. A redelivered message for the same file
    /// path is a no-op.
    pub async fn insert_segment(
        pool: &PgPool,
        artifact: &NewSegmentArtifact,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO rrd_files (visualization_project_id, name, rrd_url, segment_index) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (rrd_url) DO NOTHING",
        )
        .bind(artifact.project_id.as_str())
        .bind(&artifact.segment_name)
        .bind(&artifact.file_path)
        .bind(artifact.segment_index)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update_status(pool: &PgPool, id: &str, status: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE visualization_projects SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(())
    }
}
