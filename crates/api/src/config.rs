use std::str::FromStr;
use std::time::Duration;

use analyzer_events::BrokerAddress;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound for draining workers and the relay on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Where the visualization bus lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusTransport {
    /// An MQTT broker shared with the out-of-process generator.
    Broker(BrokerAddress),
    /// In-process only; nothing outside this server can publish to it.
    Local,
}

impl FromStr for BusTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "local" => Ok(Self::Local),
            url => BrokerAddress::parse(url)
                .map(Self::Broker)
                .map_err(|e| e.to_string()),
        }
    }
}

/// Connection settings for the bus subscriber.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Broker URL, or `local` for the in-process bus (default: `mqtt://localhost:1883`).
    pub transport: BusTransport,
    /// Client identifier (default: `backend-subscriber`).
    pub client_id: String,
    /// Keep-alive interval in seconds (default: `60`).
    pub keep_alive_secs: u64,
    /// Received messages a subscription may fall behind by (default: `1024`).
    pub buffer_capacity: usize,
}

impl BusConfig {
    /// | Env Var                | Default                  |
    /// |------------------------|--------------------------|
    /// | `BUS_BROKER_URL`       | `mqtt://localhost:1883`  |
    /// | `BUS_CLIENT_ID`        | `backend-subscriber`     |
    /// | `BUS_KEEP_ALIVE_SECS`  | `60`                     |
    /// | `BUS_BUFFER_CAPACITY`  | `1024`                   |
    pub fn from_env() -> Self {
        let transport: BusTransport = std::env::var("BUS_BROKER_URL")
            .unwrap_or_else(|_| "mqtt://localhost:1883".into())
            .parse()
            .unwrap_or_else(|e| panic!("BUS_BROKER_URL is invalid: {e}"));

        let client_id =
            std::env::var("BUS_CLIENT_ID").unwrap_or_else(|_| "backend-subscriber".into());

        let keep_alive_secs: u64 = std::env::var("BUS_KEEP_ALIVE_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("BUS_KEEP_ALIVE_SECS must be a valid u64");

        let buffer_capacity: usize = std::env::var("BUS_BUFFER_CAPACITY")
            .unwrap_or_else(|_| "1024".into())
            .parse()
            .expect("BUS_BUFFER_CAPACITY must be a valid usize");
        assert!(buffer_capacity > 0, "BUS_BUFFER_CAPACITY must be positive");

        Self {
            transport,
            client_id,
            keep_alive_secs,
            buffer_capacity,
        }
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// Which storage collaborator backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

impl StoreBackend {
    /// `STORE_BACKEND`, defaulting to `postgres`.
    pub fn from_env() -> Self {
        std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .parse()
            .unwrap_or_else(|e| panic!("STORE_BACKEND is invalid: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("postgres".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn bus_transport_parses_broker_or_local() {
        assert_eq!("local".parse::<BusTransport>(), Ok(BusTransport::Local));
        assert_eq!(
            "mqtt://broker:1884".parse::<BusTransport>(),
            Ok(BusTransport::Broker(BrokerAddress {
                host: "broker".into(),
                port: 1884,
            }))
        );
        assert!("mqtt://broker:x".parse::<BusTransport>().is_err());
    }
}
