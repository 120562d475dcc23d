use analyzer_core::analysis::AnalysisDomain;
use analyzer_core::error::CoreError;
use analyzer_core::types::JobId;
use analyzer_db::StoreError;

/// Errors raised while scheduling or running a job.
///
/// None of these escape a worker: the scheduler logs them and moves on to
/// the next request.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Job {job_id} belongs to the {actual} domain, not {expected}")]
    WrongDomain {
        job_id: JobId,
        expected: AnalysisDomain,
        actual: AnalysisDomain,
    },

    #[error("The {0} scheduler is shutting down")]
    ShuttingDown(AnalysisDomain),
}
