//! Step loop of one job activation.
//!
//! The executor checks the job's lifecycle state before every step,
//! persists one record per completed step, and reports each record and the
//! final completion through the [`ProgressNotifier`].

use std::sync::Arc;

use analyzer_core::analysis::JobLifecycleState;
use analyzer_core::error::CoreError;
use analyzer_core::types::{JobId, UserId};
use analyzer_db::models::result::NewResultRecord;
use analyzer_db::AnalysisStore;
use chrono::Utc;

use crate::config::DomainSettings;
use crate::error::PipelineError;
use crate::notifier::{ProgressEvent, ProgressNotifier};
use crate::simulate;
use crate::state::{JobStateStore, ResumeCheckpoint};

/// One activation request, as queued for a user's worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub user_id: UserId,
    pub job_id: JobId,
    pub is_resume: bool,
}

impl JobRequest {
    pub fn start(user_id: UserId, job_id: JobId) -> Self {
        Self {
            user_id,
            job_id,
            is_resume: false,
        }
    }

    pub fn resume(user_id: UserId, job_id: JobId) -> Self {
        Self {
            user_id,
            job_id,
            is_resume: true,
        }
    }
}

/// How an activation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step of the budget ran.
    Completed { steps: usize, records: usize },
    /// Paused before step `at`; resuming starts there.
    Paused { at: usize },
    /// Stop observed before step `at`.
    Stopped { at: usize },
}

pub struct JobExecutor {
    settings: DomainSettings,
    store: Arc<dyn AnalysisStore>,
    states: Arc<JobStateStore>,
    notifier: Arc<dyn ProgressNotifier>,
}

impl JobExecutor {
    pub fn new(
        settings: DomainSettings,
        store: Arc<dyn AnalysisStore>,
        states: Arc<JobStateStore>,
        notifier: Arc<dyn ProgressNotifier>,
    ) -> Self {
        Self {
            settings,
            store,
            states,
            notifier,
        }
    }

    pub fn settings(&self) -> &DomainSettings {
        &self.settings
    }

    /// Run one activation until it completes, pauses or stops.
    ///
    /// An unknown job fails with `NotFound` before touching any state. A
    /// persistence failure aborts the run, clears its state and sends no
    /// completion event.
    pub async fn run_job(&self, request: &JobRequest) -> Result<RunOutcome, PipelineError> {
        let job_id = &request.job_id;

        let context = self
            .store
            .load_job_context(job_id)
            .await?
            .ok_or_else(|| CoreError::not_found("project_criteria", job_id))?;

        let actual = context.kind.domain();
        if actual != self.settings.domain {
            return Err(PipelineError::WrongDomain {
                job_id: job_id.clone(),
                expected: self.settings.domain,
                actual,
            });
        }

        match self.states.state(job_id) {
            Some(JobLifecycleState::Stopped) => {
                self.states.clear(job_id);
                tracing::info!(user_id = %request.user_id, job_id = %job_id, "Job stopped before it ran");
                return Ok(RunOutcome::Stopped { at: 0 });
            }
            Some(JobLifecycleState::Paused) => {
                if !request.is_resume {
                    self.states.set_checkpoint(job_id, ResumeCheckpoint::initial());
                }
                let at = self.states.checkpoint_index(job_id);
                tracing::info!(user_id = %request.user_id, job_id = %job_id, at, "Job paused before it ran");
                return Ok(RunOutcome::Paused { at });
            }
            _ => {}
        }

        let resume_from = if request.is_resume {
            self.states.checkpoint(job_id)
        } else {
            None
        };
        let start_index = resume_from.map_or(0, |cp| cp.step);
        let mut cursor = resume_from.and_then(|cp| cp.cursor).unwrap_or_else(Utc::now);

        self.states.set_state(job_id, JobLifecycleState::Running);

        let budget = self.settings.budget.draw();
        tracing::info!(
            user_id = %request.user_id,
            job_id = %job_id,
            kind = %context.kind,
            start_index,
            budget,
            "Job activation started",
        );

        let mut records = 0;
        let mut step = start_index;

        while step < budget {
            match self.states.state(job_id) {
                Some(JobLifecycleState::Stopped) => {
                    self.states.clear(job_id);
                    tracing::info!(user_id = %request.user_id, job_id = %job_id, step, "Job stopped");
                    return Ok(RunOutcome::Stopped { at: step });
                }
                Some(JobLifecycleState::Paused) => {
                    self.states.set_checkpoint(
                        job_id,
                        ResumeCheckpoint {
                            step,
                            cursor: Some(cursor),
                        },
                    );
                    tracing::info!(user_id = %request.user_id, job_id = %job_id, step, "Job paused");
                    return Ok(RunOutcome::Paused { at: step });
                }
                _ => {}
            }

            // A step always runs to the end; control changes land at the
            // next boundary.
            tokio::time::sleep(self.settings.step_delay).await;

            let window_end = cursor + self.settings.window;
            let outcome = simulate::step_outcome(&context, &mut rand::rng());

            if let Some(outcome) = outcome {
                let record = NewResultRecord {
                    job_id: job_id.clone(),
                    step_index: step as i32,
                    window_start: cursor,
                    window_end,
                    outcome,
                };

                if let Err(e) = self.store.persist_result(&record).await {
                    self.states.clear(job_id);
                    return Err(e.into());
                }
                records += 1;

                self.notifier
                    .notify(
                        &request.user_id,
                        &ProgressEvent::new(context.kind.result_message(), job_id.clone()),
                    )
                    .await;
            }

            cursor = window_end;
            step += 1;
        }

        self.states.clear(job_id);
        self.notifier
            .notify(
                &request.user_id,
                &ProgressEvent::new(context.kind.completed_message(), job_id.clone()),
            )
            .await;
        tracing::info!(user_id = %request.user_id, job_id = %job_id, records, "Job completed");

        Ok(RunOutcome::Completed {
            steps: budget,
            records,
        })
    }
}
