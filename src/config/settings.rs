//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::Protocol;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Listener configuration (host, port, protocol)
    pub server: ServerSettings,

    /// Session limits and deadlines
    pub gateway: GatewaySettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,

    /// Transport spoken on the port ("tcp" or "websocket")
    pub protocol: Protocol,
}

/// Session limits and deadlines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewaySettings {
    /// Heartbeat read deadline in milliseconds (default: 180000)
    pub read_wait_ms: u64,

    /// Upgrade plus acceptor budget in milliseconds (default: 10000)
    pub handshake_timeout_ms: u64,

    /// Per write+flush budget in milliseconds (default: 10000)
    pub write_timeout_ms: u64,

    /// Maximum message size in bytes (default: 64KB)
    pub max_payload_size: usize,

    /// Graceful shutdown deadline in seconds (default: 5)
    pub shutdown_timeout_secs: u64,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if a limit is zero.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::builder(&environment)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__GATEWAY__READ_WAIT_MS=200 -> gateway.read_wait_ms = 200
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("GATEWAY_HOST").ok())?
            .set_override_option("server.port", std::env::var("GATEWAY_PORT").ok())?
            .set_override_option("server.protocol", std::env::var("GATEWAY_PROTOCOL").ok())?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    /// Defaults only, without files or environment.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder("development")?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    fn builder(
        environment: &str,
    ) -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 9000)?
            .set_default("server.protocol", "tcp")?
            .set_default("gateway.read_wait_ms", 180_000_i64)? // 3 minutes
            .set_default("gateway.handshake_timeout_ms", 10_000_i64)?
            .set_default("gateway.write_timeout_ms", 10_000_i64)?
            .set_default("gateway.max_payload_size", 65_536_i64)? // 64KB
            .set_default("gateway.shutdown_timeout_secs", 5_i64)
    }

    fn validate(settings: Self) -> Result<Self, ConfigError> {
        let gateway = &settings.gateway;
        if gateway.read_wait_ms == 0 {
            return Err(ConfigError::Message(
                "gateway.read_wait_ms must be greater than zero".into(),
            ));
        }
        if gateway.max_payload_size == 0 {
            return Err(ConfigError::Message(
                "gateway.max_payload_size must be greater than zero".into(),
            ));
        }
        if gateway.handshake_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "gateway.handshake_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(settings)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl GatewaySettings {
    pub fn read_wait(&self) -> Duration {
        Duration::from_millis(self.read_wait_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
