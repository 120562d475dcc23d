//! Bridge between the out-of-process visualization generator and the
//! platform.
//!
//! The generator publishes on `visualization/backend/{kind}/{userId}/{jobId}`.
//! For each message the relay checks that the job exists and belongs to the
//! user in the topic, persists what the message reports, and republishes a
//! normalized event to the frontend topic, the user's visualization session
//! and (on completion) the cross-subsystem channel. A bad message is logged
//! and skipped; it never ends the subscription.

use std::sync::Arc;

use analyzer_core::analysis::VisualizationStatus;
use analyzer_core::error::CoreError;
use analyzer_core::types::{JobId, UserId};
use analyzer_db::models::visualization::NewSegmentArtifact;
use analyzer_db::{StoreError, VisualizationStore};
use analyzer_events::reconnect::{connect_with_retry, ReconnectConfig};
use analyzer_events::topic::{self, VISUALIZATION_BACKEND_FILTER, VISUALIZATION_BACKEND_LEVELS};
use analyzer_events::{BusClient, BusError, BusMessage, ConnectOptions, Subscription};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::ws::SessionRegistry;

const KIND_PROGRESS: &str = "progress";
const KIND_COMPLETE: &str = "complete";

/// Why a bus message was skipped.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Unexpected topic layout: {0}")]
    Topic(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("Invalid progress payload: {0}")]
    Payload(String),

    #[error("Unknown message kind '{0}'")]
    UnknownKind(String),
}

/// The three variable levels of a backend topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTopic {
    pub kind: String,
    pub user_id: UserId,
    pub job_id: JobId,
}

impl BackendTopic {
    pub fn parse(topic: &str) -> Result<Self, RelayError> {
        let levels: Vec<&str> = topic.split('/').collect();
        if levels.len() != VISUALIZATION_BACKEND_LEVELS
            || levels[0] != "visualization"
            || levels[1] != "backend"
        {
            return Err(RelayError::Topic(topic.to_string()));
        }

        Ok(Self {
            kind: levels[2].to_string(),
            user_id: UserId::from(levels[3]),
            job_id: JobId::from(levels[4]),
        })
    }
}

/// Body of a `progress` message.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressPayload {
    pub file_path: String,
    pub segment_name: String,
    pub segment_index: i32,
}

pub struct VisualizationRelay {
    client: Arc<dyn BusClient>,
    store: Arc<dyn VisualizationStore>,
    sessions: Arc<SessionRegistry>,
    options: ConnectOptions,
    reconnect: ReconnectConfig,
}

impl VisualizationRelay {
    pub fn new(
        client: Arc<dyn BusClient>,
        store: Arc<dyn VisualizationStore>,
        sessions: Arc<SessionRegistry>,
        options: ConnectOptions,
    ) -> Self {
        Self {
            client,
            store,
            sessions,
            options,
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Connect and subscribe, then relay messages until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let Some(subscription) = self.connect_and_subscribe(&cancel).await else {
            return;
        };
        self.pump(subscription, cancel).await;
    }

    /// Drop any stale connection, connect with retry, and subscribe to
    /// every backend-bound visualization topic.
    ///
    /// Returns `None` if `cancel` fires first.
    pub async fn connect_and_subscribe(&self, cancel: &CancellationToken) -> Option<Subscription> {
        loop {
            if self.client.is_connected().await {
                if let Err(e) = self.client.disconnect().await {
                    tracing::warn!(client_id = self.client.client_id(), error = %e, "Bus disconnect failed");
                }
            }

            if !connect_with_retry(self.client.as_ref(), &self.options, &self.reconnect, cancel).await {
                return None;
            }

            match self.client.subscribe(VISUALIZATION_BACKEND_FILTER).await {
                Ok(subscription) => {
                    tracing::info!(
                        client_id = self.client.client_id(),
                        filter = VISUALIZATION_BACKEND_FILTER,
                        "Visualization relay subscribed",
                    );
                    return Some(subscription);
                }
                Err(e) => {
                    tracing::error!(client_id = self.client.client_id(), error = %e, "Bus subscribe failed");
                    tokio::select! {
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(self.reconnect.initial_delay) => {}
                    }
                }
            }
        }
    }

    /// Relay messages from `subscription`, resubscribing if it ends.
    pub async fn pump(&self, mut subscription: Subscription, cancel: CancellationToken) {
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = subscription.next() => message,
            };

            match message {
                Some(Ok(message)) => {
                    if let Err(e) = self.handle(&message).await {
                        log_skipped(&message.topic, &e);
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Visualization messages lost");
                }
                None => {
                    if !self.options.auto_reconnect {
                        tracing::warn!("Visualization subscription ended");
                        break;
                    }
                    tracing::warn!("Visualization subscription ended, reconnecting");
                    match self.connect_and_subscribe(&cancel).await {
                        Some(next) => subscription = next,
                        None => break,
                    }
                }
            }
        }

        if let Err(e) = self.client.disconnect().await {
            tracing::warn!(error = %e, "Bus disconnect failed");
        }
        tracing::info!("Visualization relay stopped");
    }

    /// Process one backend-bound message.
    pub async fn handle(&self, message: &BusMessage) -> Result<(), RelayError> {
        let target = BackendTopic::parse(&message.topic)?;

        let owner = self
            .store
            .load_visualization_owner(&target.job_id)
            .await?
            .ok_or_else(|| CoreError::not_found("visualization_project", &target.job_id))?;

        if owner != target.user_id {
            return Err(CoreError::Forbidden(format!(
                "user {} does not own visualization {}",
                target.user_id, target.job_id
            ))
            .into());
        }

        match target.kind.as_str() {
            KIND_PROGRESS => self.on_progress(&target, &message.payload).await,
            KIND_COMPLETE => self.on_complete(&target).await,
            other => Err(RelayError::UnknownKind(other.to_string())),
        }
    }

    async fn on_progress(
        &self,
        target: &BackendTopic,
        payload: &serde_json::Value,
    ) -> Result<(), RelayError> {
        let progress = ProgressPayload::deserialize(payload)
            .map_err(|e| RelayError::Payload(e.to_string()))?;

        self.store
            .persist_segment_artifact(&NewSegmentArtifact {
                project_id: target.job_id.clone(),
                file_path: progress.file_path.clone(),
                segment_name: progress.segment_name.clone(),
                segment_index: progress.segment_index,
            })
            .await?;
        self.store
            .set_visualization_status(&target.job_id, VisualizationStatus::Progressing)
            .await?;

        let event = json!({
            "status": VisualizationStatus::Progressing.as_str(),
            "rrd_url": progress.file_path,
            "segment_index": progress.segment_index,
            "segment_name": progress.segment_name,
        });
        self.republish(target, event).await;

        tracing::debug!(
            user_id = %target.user_id,
            job_id = %target.job_id,
            segment_index = progress.segment_index,
            "Visualization segment relayed",
        );
        Ok(())
    }

    async fn on_complete(&self, target: &BackendTopic) -> Result<(), RelayError> {
        self.store
            .set_visualization_status(&target.job_id, VisualizationStatus::Complete)
            .await?;

        let event = json!({ "status": VisualizationStatus::Complete.as_str() });
        self.republish(target, event).await;

        let global = topic::global_visualization_complete(&target.user_id);
        if let Err(e) = self
            .client
            .publish(&global, json!({ "jobId": target.job_id }))
            .await
        {
            tracing::warn!(topic = %global, error = %e, "Failed to publish completion");
        }

        tracing::info!(user_id = %target.user_id, job_id = %target.job_id, "Visualization complete");
        Ok(())
    }

    /// Publish `event` to the frontend topic and push it, tagged with the
    /// job, to the user's visualization session.
    async fn republish(&self, target: &BackendTopic, mut event: serde_json::Value) {
        let frontend = topic::frontend_progress(&target.user_id, &target.job_id);
        if let Err(e) = self.client.publish(&frontend, event.clone()).await {
            tracing::warn!(topic = %frontend, error = %e, "Failed to publish to frontend topic");
        }

        event["jobId"] = json!(target.job_id);
        self.sessions.send_json(&target.user_id, &event).await;
    }
}

fn log_skipped(topic: &str, error: &RelayError) {
    match error {
        RelayError::Core(CoreError::Forbidden(_)) => {
            tracing::warn!(topic, error = %error, "Visualization message rejected");
        }
        RelayError::Topic(_)
        | RelayError::UnknownKind(_)
        | RelayError::Payload(_)
        | RelayError::Core(_) => {
            tracing::warn!(topic, error = %error, "Visualization message skipped");
        }
        RelayError::Store(_) | RelayError::Bus(_) => {
            tracing::error!(topic, error = %error, "Visualization message failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_backend_topic() {
        let parsed = BackendTopic::parse("visualization/backend/progress/u1/v1").unwrap();
        assert_eq!(parsed.kind, "progress");
        assert_eq!(parsed.user_id.as_str(), "u1");
        assert_eq!(parsed.job_id.as_str(), "v1");
    }

    #[test]
    fn rejects_wrong_level_count() {
        assert_matches!(
            BackendTopic::parse("visualization/backend/progress/u1"),
            Err(RelayError::Topic(_))
        );
        assert_matches!(
            BackendTopic::parse("visualization/backend/progress/u1/v1/x"),
            Err(RelayError::Topic(_))
        );
    }

    #[test]
    fn rejects_foreign_prefix() {
        assert_matches!(
            BackendTopic::parse("visualization/frontend/progress/u1/v1"),
            Err(RelayError::Topic(_))
        );
    }
}
