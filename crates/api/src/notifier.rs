use std::sync::Arc;

use analyzer_core::types::UserId;
use analyzer_pipeline::{ProgressEvent, ProgressNotifier};
use async_trait::async_trait;

use crate::ws::SessionRegistry;

/// Pushes pipeline progress to the user's live session on one endpoint.
pub struct WsNotifier {
    sessions: Arc<SessionRegistry>,
}

impl WsNotifier {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl ProgressNotifier for WsNotifier {
    async fn notify(&self, user_id: &UserId, event: &ProgressEvent) -> bool {
        let delivered = self.sessions.send_json(user_id, event).await;
        if !delivered {
            tracing::debug!(
                endpoint = self.sessions.name(),
                user_id = %user_id,
                job_id = %event.job_id,
                message = %event.message,
                "No live session, progress event dropped",
            );
        }
        delivered
    }
}
