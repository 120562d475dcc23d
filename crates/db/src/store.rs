//! Storage seams consumed by the job pipeline and the bus relay.
//!
//! The pipeline never talks to `sqlx` directly: it holds an
//! `Arc<dyn AnalysisStore>` (and the relay an `Arc<dyn VisualizationStore>`)
//! so tests and database-less runs can substitute [`crate::MemoryStore`].

use analyzer_core::analysis::{CriteriaKind, VisualizationStatus};
use analyzer_core::types::{JobId, UserId};
use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::criteria::{JobContext, JobContextRow};
use crate::models::result::{NewResultRecord, ResultRecord};
use crate::models::visualization::NewSegmentArtifact;
use crate::repositories::{ProjectCriteriaRepo, ResultRepo, VisualizationRepo};
use crate::DbPool;

/// Storage operations the job executor depends on.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Resolve a job identifier to its project-criteria context.
    async fn load_job_context(&self, job_id: &JobId) -> Result<Option<JobContext>, StoreError>;

    /// Persist one per-step record. Each call is its own atomic unit.
    async fn persist_result(&self, record: &NewResultRecord) -> Result<(), StoreError>;

    /// All records for a job in timeline order (empty if none).
    async fn list_results(&self, job_id: &JobId) -> Result<Vec<ResultRecord>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Storage operations the visualization relay depends on.
#[async_trait]
pub trait VisualizationStore: Send + Sync {
    /// Owner of a visualization project, or `None` if it does not exist.
    async fn load_visualization_owner(&self, job_id: &JobId)
        -> Result<Option<UserId>, StoreError>;

    async fn persist_segment_artifact(&self, artifact: &NewSegmentArtifact)
        -> Result<(), StoreError>;

    async fn set_visualization_status(
        &self,
        job_id: &JobId,
        status: VisualizationStatus,
    ) -> Result<(), StoreError>;
}

/// Postgres-backed implementation of both storage traits.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl TryFrom<JobContextRow> for JobContext {
    type Error = StoreError;

    fn try_from(row: JobContextRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse::<CriteriaKind>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(JobContext {
            job_id: JobId::new(row.id),
            project_id: row.project_id,
            owner_user_id: UserId::new(row.owner_user_id),
            criteria_name: row.criteria_name,
            kind,
            tag_color: row.tag_color,
        })
    }
}

#[async_trait]
impl AnalysisStore for PgStore {
    async fn load_job_context(&self, job_id: &JobId) -> Result<Option<JobContext>, StoreError> {
        ProjectCriteriaRepo::find_context(&self.pool, job_id.as_str())
            .await?
            .map(JobContext::try_from)
            .transpose()
    }

    async fn persist_result(&self, record: &NewResultRecord) -> Result<(), StoreError> {
        ResultRepo::insert(&self.pool, record).await?;
        Ok(())
    }

    async fn list_results(&self, job_id: &JobId) -> Result<Vec<ResultRecord>, StoreError> {
        let Some(context) = self.load_job_context(job_id).await? else {
            return Ok(Vec::new());
        };
        let records = ResultRepo::list_for_job(&self.pool, job_id.as_str(), context.kind).await?;
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl VisualizationStore for PgStore {
    async fn load_visualization_owner(
        &self,
        job_id: &JobId,
    ) -> Result<Option<UserId>, StoreError> {
        let row = VisualizationRepo::find_by_id(&self.pool, job_id.as_str()).await?;
        Ok(row.map(|r| UserId::new(r.user_id)))
    }

    async fn persist_segment_artifact(
        &self,
        artifact: &NewSegmentArtifact,
    ) -> Result<(), StoreError> {
        VisualizationRepo::insert_segment(&self.pool, artifact).await?;
        Ok(())
    }

    async fn set_visualization_status(
        &self,
        job_id: &JobId,
        status: VisualizationStatus,
    ) -> Result<(), StoreError> {
        VisualizationRepo::update_status(&self.pool, job_id.as_str(), status.as_str()).await?;
        Ok(())
    }
}
