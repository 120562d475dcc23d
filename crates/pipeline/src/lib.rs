//! Per-user, cancellable, resumable analysis job pipeline.
//!
//! One [`AnalysisPipeline`] exists per [`AnalysisDomain`]. It bundles:
//!
//! - [`JobStateStore`]: lifecycle state and resume checkpoints per job.
//! - [`JobScheduler`]: one FIFO lane and one worker task per user.
//! - [`JobExecutor`]: the step loop that persists results and reports
//!   progress through a [`ProgressNotifier`].
//! - [`JobController`]: the `START`/`PAUSE`/`RESUME`/`STOP` operations.

use std::sync::Arc;

use analyzer_core::analysis::AnalysisDomain;
use analyzer_db::AnalysisStore;

pub mod config;
pub mod control;
pub mod error;
pub mod executor;
pub mod notifier;
pub mod scheduler;
pub mod simulate;
pub mod state;

pub use config::{DomainSettings, PipelineConfig, StepBudget};
pub use control::{ControlCommand, JobController};
pub use error::PipelineError;
pub use executor::{JobExecutor, JobRequest, RunOutcome};
pub use notifier::{ProgressEvent, ProgressNotifier};
pub use scheduler::JobScheduler;
pub use state::{JobSnapshot, JobStateStore, ResumeCheckpoint};

/// Everything one analysis domain needs, wired together.
#[derive(Clone)]
pub struct AnalysisPipeline {
    pub domain: AnalysisDomain,
    pub states: Arc<JobStateStore>,
    pub scheduler: Arc<JobScheduler>,
    pub controller: Arc<JobController>,
}

impl AnalysisPipeline {
    pub fn new(
        settings: DomainSettings,
        store: Arc<dyn AnalysisStore>,
        notifier: Arc<dyn ProgressNotifier>,
    ) -> Self {
        let domain = settings.domain;
        let states = Arc::new(JobStateStore::new());
        let executor = Arc::new(JobExecutor::new(
            settings,
            store,
            Arc::clone(&states),
            notifier,
        ));
        let scheduler = Arc::new(JobScheduler::new(domain, executor));
        let controller = Arc::new(JobController::new(
            Arc::clone(&states),
            Arc::clone(&scheduler),
        ));

        Self {
            domain,
            states,
            scheduler,
            controller,
        }
    }
}
