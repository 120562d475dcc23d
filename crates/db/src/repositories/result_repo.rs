//! Repository for the four per-step result tables.
//!
//! Which table a record lands in follows its [`ResultOutcome`]; every
//! insert is its own statement, so a crash mid-job keeps the steps that
//! already completed.

use analyzer_core::analysis::CriteriaKind;
use sqlx::PgPool;

use crate::models::result::{NewResultRecord, ResultOutcome, ResultRecord, ResultRow};

pub struct ResultRepo;

impl ResultRepo {
    /// Insert one record into the table matching its outcome.
    pub async fn insert(pool: &PgPool, record: &NewResultRecord) -> Result<(), sqlx::Error> {
        let job_id = record.job_id.as_str();

        match &record.outcome {
            ResultOutcome::Pass { message } => {
                sqlx::query(
                    "INSERT INTO pass_evaluation_results \
                     (project_criteria_id, step_index, fail_start_time, fail_end_time, message) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(job_id)
                .bind(record.step_index)
                .bind(record.window_start)
                .bind(record.window_end)
                .bind(message)
                .execute(pool)
                .await?;
            }
            ResultOutcome::Score { score, message } => {
                sqlx::query(
                    "INSERT INTO score_evaluation_results \
                     (project_criteria_id, step_index, start_time, end_time, score, message) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(job_id)
                .bind(record.step_index)
                .bind(record.window_start)
                .bind(record.window_end)
                .bind(score)
                .bind(message)
                .execute(pool)
                .await?;
            }
            ResultOutcome::Tagging { color, message } => {
                sqlx::query(
                    "INSERT INTO tagging_results \
                     (project_criteria_id, step_index, start_time, end_time, color, message) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(job_id)
                .bind(record.step_index)
                .bind(record.window_start)
                .bind(record.window_end)
                .bind(color.as_deref())
                .bind(message)
                .execute(pool)
                .await?;
            }
            ResultOutcome::Curation => {
                sqlx::query(
                    "INSERT INTO curation_results \
                     (project_criteria_id, step_index, start_time, end_time) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(job_id)
                .bind(record.step_index)
                .bind(record.window_start)
                .bind(record.window_end)
                .execute(pool)
                .await?;
            }
        }

        Ok(())
    }

    /// List every record for a job in timeline order.
    pub async fn list_for_job(
        pool: &PgPool,
        job_id: &str,
        kind: CriteriaKind,
    ) -> Result<Vec<ResultRecord>, sqlx::Error> {
        let query = match kind {
            CriteriaKind::Pass => {
                "SELECT id, project_criteria_id, step_index, \
                        fail_start_time AS window_start, fail_end_time AS window_end, \
                        NULL::DOUBLE PRECISION AS score, NULL::TEXT AS color, message, created_at \
                 FROM pass_evaluation_results WHERE project_criteria_id = $1 \
                 ORDER BY fail_start_time, id"
            }
            CriteriaKind::Score => {
                "SELECT id, project_criteria_id, step_index, \
                        start_time AS window_start, end_time AS window_end, \
                        score, NULL::TEXT AS color, message, created_at \
                 FROM score_evaluation_results WHERE project_criteria_id = $1 \
                 ORDER BY start_time, id"
            }
            CriteriaKind::Tagging => {
                "SELECT id, project_criteria_id, step_index, \
                        start_time AS window_start, end_time AS window_end, \
                        NULL::DOUBLE PRECISION AS score, color, message, created_at \
                 FROM tagging_results WHERE project_criteria_id = $1 \
                 ORDER BY start_time, id"
            }
            CriteriaKind::Curation => {
                "SELECT id, project_criteria_id, step_index, \
                        start_time AS window_start, end_time AS window_end, \
                        NULL::DOUBLE PRECISION AS score, NULL::TEXT AS color, \
                        NULL::TEXT AS message, created_at \
                 FROM curation_results WHERE project_criteria_id = $1 \
                 ORDER BY start_time, id"
            }
        };

        let rows = sqlx::query_as::<_, ResultRow>(query)
            .bind(job_id)
            .fetch_all(pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.into_record(kind)).collect())
    }
}
