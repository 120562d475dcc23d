use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use analyzer_db::{AnalysisStore, MemoryStore, PgStore, VisualizationStore};
use analyzer_events::{BusClient, ConnectOptions, EventBus, LocalBusClient, MqttBusClient};
use analyzer_pipeline::PipelineConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use analyzer_api::config::{BusConfig, BusTransport, ServerConfig, StoreBackend};
use analyzer_api::relay::VisualizationRelay;
use analyzer_api::router::build_app_router;
use analyzer_api::state::AppState;
use analyzer_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "analyzer_api=debug,analyzer_pipeline=debug,analyzer_events=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    let bus_config = BusConfig::from_env();
    let backend = StoreBackend::from_env();
    tracing::info!(host = %config.host, port = %config.port, ?backend, "Loaded server configuration");

    // --- Storage ---
    let (analysis_store, visualization_store) = open_store(backend).await;

    // --- App state (pipelines, schedulers, session registries) ---
    let state = AppState::new(config.clone(), &pipeline_config, analysis_store);

    let background = CancellationToken::new();

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(state.session_registries(), background.clone());

    // --- Bus relay ---
    let bus_client = open_bus(&bus_config);
    let relay = Arc::new(VisualizationRelay::new(
        bus_client,
        visualization_store,
        Arc::clone(&state.visualization_sessions),
        ConnectOptions::persistent(bus_config.keep_alive()),
    ));
    let relay_handle = tokio::spawn(relay.run(background.clone()));
    tracing::info!(client_id = %bus_config.client_id, "Visualization relay started");

    // --- Router ---
    let app = build_app_router(state.clone(), &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let drain = config.shutdown_timeout();

    background.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), relay_handle).await;
    tracing::info!("Visualization relay stopped");

    state.shutdown_pipelines(drain).await;
    tracing::info!("Pipelines drained");

    state.close_sessions().await;
    let _ = tokio::time::timeout(Duration::from_secs(5), heartbeat_handle).await;
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Open the configured storage collaborator. Fails fast on any error.
async fn open_store(
    backend: StoreBackend,
) -> (Arc<dyn AnalysisStore>, Arc<dyn VisualizationStore>) {
    match backend {
        StoreBackend::Postgres => {
            let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

            let pool = analyzer_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            analyzer_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            analyzer_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            let store = Arc::new(PgStore::new(pool));
            let analysis: Arc<dyn AnalysisStore> = store.clone();
            let visualization: Arc<dyn VisualizationStore> = store;
            (analysis, visualization)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; nothing survives a restart");
            let store = Arc::new(MemoryStore::new());
            let analysis: Arc<dyn AnalysisStore> = store.clone();
            let visualization: Arc<dyn VisualizationStore> = store;
            (analysis, visualization)
        }
    }
}

/// Build the bus client the relay talks through.
fn open_bus(config: &BusConfig) -> Arc<dyn BusClient> {
    match &config.transport {
        BusTransport::Broker(broker) => {
            tracing::info!(%broker, "Using the MQTT broker for the visualization bus");
            Arc::new(MqttBusClient::new(
                config.client_id.clone(),
                broker.clone(),
                config.buffer_capacity,
            ))
        }
        BusTransport::Local => {
            tracing::warn!("Using the in-process bus; no external generator can reach it");
            let bus = Arc::new(EventBus::new(config.buffer_capacity));
            Arc::new(LocalBusClient::new(config.client_id.clone(), bus))
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
