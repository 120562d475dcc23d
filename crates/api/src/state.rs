use std::sync::Arc;
use std::time::Duration;

use analyzer_core::analysis::AnalysisDomain;
use analyzer_db::AnalysisStore;
use analyzer_pipeline::{AnalysisPipeline, DomainSettings, PipelineConfig};

use crate::config::ServerConfig;
use crate::notifier::WsNotifier;
use crate::ws::{CommandRouter, SessionRegistry};

/// One analysis domain as seen from the transport: its pipeline, the live
/// sessions it reports to, and the router for its inbound commands.
#[derive(Clone)]
pub struct DomainChannel {
    pub pipeline: AnalysisPipeline,
    pub sessions: Arc<SessionRegistry>,
    pub commands: Arc<CommandRouter>,
}

impl DomainChannel {
    pub fn new(
        endpoint: &'static str,
        settings: DomainSettings,
        store: Arc<dyn AnalysisStore>,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(endpoint));
        let notifier = Arc::new(WsNotifier::new(Arc::clone(&sessions)));
        let pipeline = AnalysisPipeline::new(settings, store, notifier);
        let commands = Arc::new(CommandRouter::new(Arc::clone(&pipeline.controller)));

        Self {
            pipeline,
            sessions,
            commands,
        }
    }
}

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Storage collaborator shared by both pipelines.
    pub store: Arc<dyn AnalysisStore>,
    pub evaluation: DomainChannel,
    pub curation: DomainChannel,
    /// Push-only sessions fed by the visualization relay.
    pub visualization_sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        pipeline_config: &PipelineConfig,
        store: Arc<dyn AnalysisStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            evaluation: DomainChannel::new(
                "analysis",
                pipeline_config.evaluation.clone(),
                Arc::clone(&store),
            ),
            curation: DomainChannel::new(
                "curation",
                pipeline_config.curation.clone(),
                Arc::clone(&store),
            ),
            visualization_sessions: Arc::new(SessionRegistry::new("visualization")),
            store,
        }
    }

    pub fn channel(&self, domain: AnalysisDomain) -> &DomainChannel {
        match domain {
            AnalysisDomain::Evaluation => &self.evaluation,
            AnalysisDomain::Curation => &self.curation,
        }
    }

    pub fn session_registries(&self) -> Vec<Arc<SessionRegistry>> {
        vec![
            Arc::clone(&self.evaluation.sessions),
            Arc::clone(&self.curation.sessions),
            Arc::clone(&self.visualization_sessions),
        ]
    }

    /// Stop both schedulers, letting in-flight activations finish.
    pub async fn shutdown_pipelines(&self, timeout: Duration) {
        tokio::join!(
            self.evaluation.pipeline.scheduler.shutdown(timeout),
            self.curation.pipeline.scheduler.shutdown(timeout),
        );
    }

    /// Close every live session on every endpoint.
    pub async fn close_sessions(&self) {
        for registry in self.session_registries() {
            registry.shutdown_all().await;
        }
    }
}
