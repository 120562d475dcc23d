//! Exponential-backoff connection logic for bus clients.
//!
//! The relay calls [`connect_with_retry`] at startup and whenever the
//! connection drops. It keeps retrying with increasing delays until the
//! client connects or the [`CancellationToken`] is triggered.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{BusClient, ConnectOptions};

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the second connection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Connect `client` with exponential backoff.
///
/// Returns `true` once connected, or `false` if `cancel` fires first.
pub async fn connect_with_retry(
    client: &dyn BusClient,
    options: &ConnectOptions,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> bool {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(client_id = client.client_id(), "Bus connect cancelled");
                return false;
            }
            result = client.connect(options.clone()) => {
                match result {
                    Ok(()) => {
                        tracing::info!(client_id = client.client_id(), attempt, "Bus client connected");
                        return true;
                    }
                    Err(e) => {
                        tracing::warn!(
                            client_id = client.client_id(),
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Bus connect attempt {attempt} failed",
                        );
                    }
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, config);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::client::{BusError, Subscription};

    /// Fails the first `failures` connection attempts.
    struct FlakyClient {
        failures: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl BusClient for FlakyClient {
        fn client_id(&self) -> &str {
            "flaky"
        }

        async fn is_connected(&self) -> bool {
            self.attempts.load(Ordering::SeqCst) > self.failures
        }

        async fn connect(&self, _options: ConnectOptions) -> Result<(), BusError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(BusError::Connection(format!("refused #{n}")))
            } else {
                Ok(())
            }
        }

        async fn disconnect(&self) -> Result<(), BusError> {
            Ok(())
        }

        async fn subscribe(&self, _filter: &str) -> Result<Subscription, BusError> {
            Err(BusError::NotConnected("flaky".into()))
        }

        async fn publish(&self, _topic: &str, _payload: serde_json::Value) -> Result<(), BusError> {
            Ok(())
        }
    }

    fn fast_config() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
        }
    }

    #[test]
    fn next_delay_doubles() {
        let config = ReconnectConfig::default();
        assert_eq!(next_delay(Duration::from_secs(1), &config), Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(next_delay(Duration::from_secs(8), &config), Duration::from_secs(10));
    }

    #[test]
    fn full_backoff_sequence() {
        let config = ReconnectConfig::default();
        let mut delay = config.initial_delay;
        for expected_secs in [1, 2, 4, 8, 16, 30, 30] {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &config);
        }
    }

    #[tokio::test]
    async fn retries_until_connected() {
        let client = FlakyClient {
            failures: 3,
            attempts: AtomicU32::new(0),
        };

        let connected = connect_with_retry(
            &client,
            &ConnectOptions::default(),
            &fast_config(),
            &CancellationToken::new(),
        )
        .await;

        assert!(connected);
        assert_eq!(client.attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cancellation_stops_retrying() {
        let client = FlakyClient {
            failures: u32::MAX,
            attempts: AtomicU32::new(0),
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let connected =
            connect_with_retry(&client, &ConnectOptions::default(), &fast_config(), &cancel).await;

        assert!(!connected);
    }
}
