//! Process-wide lifecycle state of every known job.
//!
//! A job with no entry is "not running". That is not the same as
//! [`JobLifecycleState::Stopped`]: a `STOP` leaves a `Stopped` entry that the
//! executor clears once it observes it.

use analyzer_core::analysis::JobLifecycleState;
use analyzer_core::types::{JobId, Timestamp};
use dashmap::DashMap;
use serde::Serialize;

/// Where a paused job picks up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResumeCheckpoint {
    /// Index of the next step to run.
    pub step: usize,
    /// Start of the next result window. `None` until the job has run.
    pub cursor: Option<Timestamp>,
}

impl ResumeCheckpoint {
    pub fn initial() -> Self {
        Self {
            step: 0,
            cursor: None,
        }
    }
}

/// Read-only view of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub state: Option<JobLifecycleState>,
    pub checkpoint: Option<usize>,
}

struct JobEntry {
    state: JobLifecycleState,
    checkpoint: Option<ResumeCheckpoint>,
}

impl JobEntry {
    fn new(state: JobLifecycleState) -> Self {
        Self {
            state,
            checkpoint: None,
        }
    }
}

/// Concurrent map from job to lifecycle state and checkpoint.
///
/// Every operation is atomic on its own key; operations on different keys
/// never contend beyond the shard lock.
#[derive(Default)]
pub struct JobStateStore {
    entries: DashMap<JobId, JobEntry>,
}

impl JobStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, job_id: &JobId, state: JobLifecycleState) {
        self.entries
            .entry(job_id.clone())
            .and_modify(|entry| entry.state = state)
            .or_insert_with(|| JobEntry::new(state));
    }

    pub fn state(&self, job_id: &JobId) -> Option<JobLifecycleState> {
        self.entries.get(job_id).map(|entry| entry.state)
    }

    /// Store where a paused job resumes. Creates a `Paused` entry if none
    /// exists.
    pub fn set_checkpoint(&self, job_id: &JobId, checkpoint: ResumeCheckpoint) {
        self.entries
            .entry(job_id.clone())
            .or_insert_with(|| JobEntry::new(JobLifecycleState::Paused))
            .checkpoint = Some(checkpoint);
    }

    pub fn checkpoint(&self, job_id: &JobId) -> Option<ResumeCheckpoint> {
        self.entries.get(job_id).and_then(|entry| entry.checkpoint)
    }

    /// Stored step index, `0` when there is none.
    pub fn checkpoint_index(&self, job_id: &JobId) -> usize {
        self.checkpoint(job_id).map_or(0, |cp| cp.step)
    }

    /// Remove the state and checkpoint of a job.
    pub fn clear(&self, job_id: &JobId) {
        self.entries.remove(job_id);
    }

    pub fn snapshot(&self, job_id: &JobId) -> JobSnapshot {
        let entry = self.entries.get(job_id);
        JobSnapshot {
            job_id: job_id.clone(),
            state: entry.as_ref().map(|e| e.state),
            checkpoint: entry.as_ref().and_then(|e| e.checkpoint).map(|cp| cp.step),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobId {
        JobId::from("pc-1")
    }

    #[test]
    fn absent_job_is_not_stopped() {
        let store = JobStateStore::new();
        assert_eq!(store.state(&job()), None);
        assert_eq!(store.checkpoint_index(&job()), 0);
    }

    #[test]
    fn state_changes_keep_checkpoint() {
        let store = JobStateStore::new();
        store.set_state(&job(), JobLifecycleState::Running);
        store.set_checkpoint(
            &job(),
            ResumeCheckpoint {
                step: 2,
                cursor: None,
            },
        );

        store.set_state(&job(), JobLifecycleState::Paused);
        store.set_state(&job(), JobLifecycleState::Running);

        assert_eq!(store.state(&job()), Some(JobLifecycleState::Running));
        assert_eq!(store.checkpoint_index(&job()), 2);
    }

    #[test]
    fn repeated_pause_keeps_checkpoint() {
        let store = JobStateStore::new();
        store.set_state(&job(), JobLifecycleState::Paused);
        store.set_checkpoint(
            &job(),
            ResumeCheckpoint {
                step: 3,
                cursor: None,
            },
        );

        store.set_state(&job(), JobLifecycleState::Paused);
        store.set_state(&job(), JobLifecycleState::Paused);

        assert_eq!(store.checkpoint_index(&job()), 3);
    }

    #[test]
    fn clear_removes_state_and_checkpoint() {
        let store = JobStateStore::new();
        store.set_checkpoint(&job(), ResumeCheckpoint::initial());
        assert_eq!(store.state(&job()), Some(JobLifecycleState::Paused));

        store.clear(&job());

        assert_eq!(store.snapshot(&job()).state, None);
        assert_eq!(store.checkpoint(&job()), None);
        assert!(store.is_empty());
    }
}
