//! Outbound dial parameters.

use std::time::Duration;

/// Immutable parameters for establishing one outbound connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialerContext {
    /// Client identifier, usually sent during the handshake
    pub id: String,
    /// Human readable client name
    pub name: String,
    /// Target address (`host:port`, or a `ws://` URL for WebSocket)
    pub address: String,
    /// Budget for connecting plus handshaking
    pub timeout: Duration,
}

impl DialerContext {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            timeout,
        }
    }
}
