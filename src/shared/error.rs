//! Gateway Error Types
//!
//! Centralized error handling for the gateway, its sessions and the client.

use std::io;
use std::time::Duration;

use tokio_tungstenite::tungstenite;

/// Gateway error type
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Malformed frame: {0}")]
    Decode(String),

    #[error("Read deadline of {0:?} elapsed")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("Channel already registered: {0}")]
    DuplicateChannel(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Shutdown deadline exceeded with {remaining} session(s) still open")]
    ShutdownDeadlineExceeded { remaining: usize },

    #[error("Connection closed")]
    Closed,

    #[error("Gateway is shutting down")]
    ShuttingDown,

    #[error("Gateway already started")]
    AlreadyStarted,

    #[error("Client already connected")]
    AlreadyConnected,

    #[error("Not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Gateway result alias
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

impl GatewayError {
    /// Stable label used in log fields and metric labels.
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::Handshake(_) => "handshake",
            GatewayError::HandshakeTimeout(_) => "handshake_timeout",
            GatewayError::Decode(_) => "decode",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Transport(_) => "transport",
            GatewayError::DuplicateChannel(_) => "duplicate_channel",
            GatewayError::ChannelNotFound(_) => "not_found",
            GatewayError::ShutdownDeadlineExceeded { .. } => "shutdown_deadline",
            GatewayError::Closed => "closed",
            GatewayError::ShuttingDown => "shutting_down",
            GatewayError::AlreadyStarted => "already_started",
            GatewayError::AlreadyConnected => "already_connected",
            GatewayError::NotConfigured(_) => "not_configured",
            GatewayError::Config(_) => "config",
        }
    }

    /// True for the read-deadline case that drives heartbeat disconnects.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout(_))
    }

    /// True when the error belongs to the handshake phase.
    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            GatewayError::Handshake(_) | GatewayError::HandshakeTimeout(_)
        )
    }

    /// Shorthand for an unexpected end of stream.
    pub(crate) fn eof() -> Self {
        GatewayError::Transport(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed by peer",
        ))
    }
}

impl From<tungstenite::Error> for GatewayError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                GatewayError::Closed
            }
            tungstenite::Error::Io(e) => GatewayError::Transport(e),
            tungstenite::Error::Capacity(e) => GatewayError::Decode(e.to_string()),
            tungstenite::Error::Protocol(e) => GatewayError::Decode(e.to_string()),
            other => GatewayError::Transport(io::Error::other(other.to_string())),
        }
    }
}
