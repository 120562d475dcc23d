//! Decoding and dispatch of inbound control frames.
//!
//! A frame looks like `{"command": "START", "jobId": "pc-1"}`. The job field
//! is also accepted under its older name `projectCriteriaId`.

use std::sync::Arc;

use analyzer_core::error::CoreError;
use analyzer_core::job_events::MSG_INVALID_COMMAND;
use analyzer_core::types::{JobId, UserId};
use analyzer_pipeline::{ControlCommand, JobController, PipelineError};
use serde::Deserialize;

/// Raw inbound frame.
#[derive(Debug, Deserialize)]
pub struct ClientCommand {
    pub command: String,
    #[serde(rename = "jobId", alias = "projectCriteriaId")]
    pub job_id: String,
}

/// Why a frame was rejected.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Rejected(#[from] PipelineError),
}

impl CommandError {
    /// Frame sent back to the connection that sent the bad command.
    pub fn reply(&self) -> serde_json::Value {
        serde_json::json!({
            "message": MSG_INVALID_COMMAND,
            "error": self.to_string(),
        })
    }
}

/// Decodes frames and hands them to a domain's [`JobController`].
pub struct CommandRouter {
    controller: Arc<JobController>,
}

impl CommandRouter {
    pub fn new(controller: Arc<JobController>) -> Self {
        Self { controller }
    }

    /// Decode one text frame and apply it on behalf of `user_id`.
    pub fn dispatch(&self, user_id: &UserId, frame: &str) -> Result<(ControlCommand, JobId), CommandError> {
        let (command, job_id) = decode(frame)?;
        self.controller.apply(user_id, &job_id, command)?;
        Ok((command, job_id))
    }
}

/// Parse a frame into a command and job.
pub fn decode(frame: &str) -> Result<(ControlCommand, JobId), CommandError> {
    let raw: ClientCommand =
        serde_json::from_str(frame).map_err(|e| CommandError::Malformed(e.to_string()))?;

    let job_id = raw.job_id.trim();
    if job_id.is_empty() {
        return Err(CommandError::Malformed("jobId must not be empty".into()));
    }

    let command = raw.command.parse::<ControlCommand>()?;
    Ok((command, JobId::from(job_id)))
}
