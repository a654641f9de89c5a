//! Application Startup
//!
//! Builds the demo gateway from settings and runs it until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;

use crate::application::{Server, ServerOptions};
use crate::config::Settings;
use crate::infrastructure::metrics;
use crate::presentation::{EchoListener, LoggingStateListener, LoginAcceptor};
use crate::shared::error::GatewayError;

/// Application instance
pub struct Application {
    server: Server,
    settings: Settings,
}

impl Application {
    /// Build the application from settings and start listening
    pub async fn build(settings: Settings) -> Result<Self> {
        let mut server = Server::new(
            format!("gateway-{}", uuid::Uuid::new_v4()),
            settings.server_addr(),
            settings.server.protocol,
        )
        .with_options(ServerOptions::from(&settings.gateway));
        server.set_acceptor(Arc::new(LoginAcceptor::new()));
        server.set_message_listener(Arc::new(EchoListener));
        server.set_state_listener(Arc::new(LoggingStateListener));

        server.start().await?;

        Ok(Self { server, settings })
    }

    /// Run until Ctrl-C, then shut down within the configured deadline
    pub async fn run_until_stopped(self) -> Result<()> {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown signal received");
        self.shutdown().await
    }

    /// Shut the gateway down and log the final metrics snapshot.
    ///
    /// Forced sessions are reported but not treated as an error.
    pub async fn shutdown(self) -> Result<()> {
        let result = match self
            .server
            .shutdown(self.settings.gateway.shutdown_timeout())
            .await
        {
            Ok(()) => Ok(()),
            Err(GatewayError::ShutdownDeadlineExceeded { remaining }) => {
                tracing::warn!(remaining, "Sessions were force closed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        };
        tracing::info!(metrics = %metrics::gather_metrics(), "Final metrics snapshot");
        result
    }

    /// Get the bound address
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr()
    }

    pub fn server(&self) -> &Server {
        &self.server
    }
}
