//! Business-facing capability traits.
//!
//! The gateway never interprets payloads or identities itself. These
//! strategies are injected at configuration time and called from session
//! tasks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::entities::Conn;
use crate::shared::error::Result;

/// Handshake and authentication hook.
#[async_trait]
pub trait Acceptor: Send + Sync {
    /// Authenticate a freshly accepted connection and return its channel ID.
    ///
    /// May read and write frames on `conn`. Must finish within `timeout`;
    /// the gateway enforces the same bound. Returning an error drops the
    /// connection without a disconnect notification.
    async fn accept(&self, conn: &mut Conn, timeout: Duration) -> Result<String>;
}

/// Per-channel handle handed to business code.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The channel ID this agent is bound to.
    fn id(&self) -> &str;

    /// Push a message to the remote end of this channel.
    async fn push(&self, payload: Bytes) -> Result<()>;
}

/// Inbound message hook.
#[async_trait]
pub trait MessageListener: Send + Sync {
    /// Called for every completed Text or Binary message, in arrival order.
    async fn receive(&self, agent: Arc<dyn Agent>, payload: Bytes);
}

/// Disconnect notification hook.
#[async_trait]
pub trait StateListener: Send + Sync {
    /// Called exactly once after a registered channel has been torn down.
    async fn disconnect(&self, channel_id: &str) -> Result<()>;
}
