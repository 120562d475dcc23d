//! In-process implementation of the storage traits.
//!
//! Backs the integration tests and `STORE_BACKEND=memory` local runs.
//! Contents live only as long as the process.

use std::collections::{HashMap, HashSet};

use analyzer_core::analysis::VisualizationStatus;
use analyzer_core::types::{JobId, UserId};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::criteria::JobContext;
use crate::models::result::{NewResultRecord, ResultRecord};
use crate::models::visualization::{NewSegmentArtifact, VisualizationProject};
use crate::store::{AnalysisStore, VisualizationStore};

#[derive(Default)]
struct Inner {
    contexts: HashMap<JobId, JobContext>,
    results: HashMap<JobId, Vec<ResultRecord>>,
    visualizations: HashMap<JobId, VisualizationProject>,
    artifacts: Vec<NewSegmentArtifact>,
    /// Jobs whose `persist_result` calls are rejected.
    failing: HashSet<JobId>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project-criteria association.
    pub async fn insert_job_context(&self, context: JobContext) {
        self.inner
            .write()
            .await
            .contexts
            .insert(context.job_id.clone(), context);
    }

    /// Register a visualization project in `PENDING` state.
    pub async fn insert_visualization(&self, id: JobId, owner: UserId, name: impl Into<String>) {
        let project = VisualizationProject {
            id: id.clone(),
            owner_user_id: owner,
            name: name.into(),
            status: VisualizationStatus::Pending,
        };
        self.inner.write().await.visualizations.insert(id, project);
    }

    /// Make every subsequent `persist_result` for `job_id` fail.
    pub async fn fail_persist_for(&self, job_id: JobId) {
        self.inner.write().await.failing.insert(job_id);
    }

    pub async fn visualization(&self, id: &JobId) -> Option<VisualizationProject> {
        self.inner.read().await.visualizations.get(id).cloned()
    }

    pub async fn artifacts_for(&self, id: &JobId) -> Vec<NewSegmentArtifact> {
        self.inner
            .read()
            .await
            .artifacts
            .iter()
            .filter(|a| &a.project_id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn load_job_context(&self, job_id: &JobId) -> Result<Option<JobContext>, StoreError> {
        Ok(self.inner.read().await.contexts.get(job_id).cloned())
    }

    async fn persist_result(&self, record: &NewResultRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.failing.contains(&record.job_id) {
            return Err(StoreError::Unavailable(format!(
                "persist rejected for job {}",
                record.job_id
            )));
        }

        inner.next_id += 1;
        let persisted = ResultRecord {
            id: inner.next_id,
            job_id: record.job_id.clone(),
            step_index: record.step_index,
            window_start: record.window_start,
            window_end: record.window_end,
            outcome: record.outcome.clone(),
            created_at: chrono::Utc::now(),
        };
        inner
            .results
            .entry(record.job_id.clone())
            .or_default()
            .push(persisted);
        Ok(())
    }

    async fn list_results(&self, job_id: &JobId) -> Result<Vec<ResultRecord>, StoreError> {
        let mut records = self
            .inner
            .read()
            .await
            .results
            .get(job_id)
            .cloned()
            .unwrap_or_default();
        records.sort_by_key(|r| (r.window_start, r.id));
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl VisualizationStore for MemoryStore {
    async fn load_visualization_owner(
        &self,
        job_id: &JobId,
    ) -> Result<Option<UserId>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .visualizations
            .get(job_id)
            .map(|p| p.owner_user_id.clone()))
    }

    async fn persist_segment_artifact(
        &self,
        artifact: &NewSegmentArtifact,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        // Same file path twice is a redelivery, not a new segment.
        if inner.artifacts.iter().any(|a| a.file_path == artifact.file_path) {
            return Ok(());
        }
        inner.artifacts.push(artifact.clone());
        Ok(())
    }

    async fn set_visualization_status(
        &self,
        job_id: &JobId,
        status: VisualizationStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.visualizations.get_mut(job_id) {
            Some(project) => {
                project.status = status;
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!(
                "visualization project {job_id} does not exist"
            ))),
        }
    }
}
