use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ws::manager::SessionRegistry;

/// Interval between heartbeat pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn a background task that sends periodic Ping frames to every live
/// session of the given registries until `cancel` fires.
pub fn start_heartbeat(
    registries: Vec<Arc<SessionRegistry>>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    for registry in &registries {
                        let count = registry.connection_count().await;
                        tracing::debug!(endpoint = registry.name(), count, "WebSocket heartbeat ping");
                        registry.ping_all().await;
                    }
                }
            }
        }
    })
}
