use analyzer_core::types::{JobId, UserId};
use async_trait::async_trait;
use serde::Serialize;

/// One outbound progress frame: `{ "message": .., "jobId": .. }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub message: String,
    #[serde(rename = "jobId")]
    pub job_id: JobId,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>, job_id: JobId) -> Self {
        Self {
            message: message.into(),
            job_id,
        }
    }
}

/// Best-effort delivery of progress to a user's live session.
///
/// Delivery failures are never reported as errors; the return value only
/// says whether a session was there to receive the event.
#[async_trait]
pub trait ProgressNotifier: Send + Sync {
    async fn notify(&self, user_id: &UserId, event: &ProgressEvent) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_uses_camel_case_job_field() {
        let event = ProgressEvent::new("NEW_SCORE_EVAL_RESULT", JobId::from("pc-9"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "NEW_SCORE_EVAL_RESULT", "jobId": "pc-9"})
        );
    }
}
