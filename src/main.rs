//! # Connection Gateway
//!
//! A long-lived connection gateway implemented in Rust.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - The demo gateway (login handshake, echo, disconnect logging)

use anyhow::Result;
use tracing::info;

use conn_gateway::config::Settings;
use conn_gateway::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    conn_gateway::telemetry::init_tracing();

    info!("Starting Connection Gateway...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        protocol = %settings.server.protocol,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Gateway ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
