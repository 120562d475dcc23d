//! Control operations behind the inbound `START`/`PAUSE`/`RESUME`/`STOP`
//! commands.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use analyzer_core::analysis::JobLifecycleState;
use analyzer_core::error::CoreError;
use analyzer_core::types::{JobId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::executor::JobRequest;
use crate::scheduler::JobScheduler;
use crate::state::JobStateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    Start,
    Pause,
    Resume,
    Stop,
}

impl ControlCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Pause => "PAUSE",
            Self::Resume => "RESUME",
            Self::Stop => "STOP",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlCommand {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START" => Ok(Self::Start),
            "PAUSE" => Ok(Self::Pause),
            "RESUME" => Ok(Self::Resume),
            "STOP" => Ok(Self::Stop),
            other => Err(CoreError::Validation(format!("Unknown command '{other}'"))),
        }
    }
}

/// Applies control commands to one domain's state store and scheduler.
///
/// `PAUSE` and `STOP` only flip the state; the running activation notices
/// at its next step boundary.
pub struct JobController {
    states: Arc<JobStateStore>,
    scheduler: Arc<JobScheduler>,
}

impl JobController {
    pub fn new(states: Arc<JobStateStore>, scheduler: Arc<JobScheduler>) -> Self {
        Self { states, scheduler }
    }

    pub fn apply(
        &self,
        user_id: &UserId,
        job_id: &JobId,
        command: ControlCommand,
    ) -> Result<(), PipelineError> {
        tracing::debug!(
            domain = %self.scheduler.domain(),
            user_id = %user_id,
            job_id = %job_id,
            %command,
            "Applying control command",
        );

        match command {
            ControlCommand::Start => self.start(user_id, job_id),
            ControlCommand::Resume => self.resume(user_id, job_id),
            ControlCommand::Pause => {
                self.pause(job_id);
                Ok(())
            }
            ControlCommand::Stop => {
                self.stop(job_id);
                Ok(())
            }
        }
    }

    pub fn start(&self, user_id: &UserId, job_id: &JobId) -> Result<(), PipelineError> {
        self.states.set_state(job_id, JobLifecycleState::Running);
        self.scheduler
            .submit(JobRequest::start(user_id.clone(), job_id.clone()))
    }

    pub fn resume(&self, user_id: &UserId, job_id: &JobId) -> Result<(), PipelineError> {
        self.states.set_state(job_id, JobLifecycleState::Running);
        self.scheduler
            .submit(JobRequest::resume(user_id.clone(), job_id.clone()))
    }

    pub fn pause(&self, job_id: &JobId) {
        self.states.set_state(job_id, JobLifecycleState::Paused);
    }

    pub fn stop(&self, job_id: &JobId) {
        self.states.set_state(job_id, JobLifecycleState::Stopped);
    }
}
