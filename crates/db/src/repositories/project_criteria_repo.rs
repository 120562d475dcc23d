//! Repository for the `project_criteria` association.

use sqlx::PgPool;

use crate::models::criteria::JobContextRow;

/// Read-only lookups on project-criteria associations.
pub struct ProjectCriteriaRepo;

impl ProjectCriteriaRepo {
    /// Load the association joined with its owning project and criteria name.
    pub async fn find_context(
        pool: &PgPool,
        id: &str,
    ) -> Result<Option<JobContextRow>, sqlx::Error> {
        sqlx::query_as::<_, JobContextRow>(
            "SELECT pc.id, pc.project_id, p.user_id AS owner_user_id, \
                    c.name AS criteria_name, pc.kind, pc.tag_color \
             FROM project_criteria pc \
             JOIN analysis_projects p ON p.id = pc.project_id \
             JOIN criteria c ON c.id = pc.criteria_id \
             WHERE pc.id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
