//! Outbound connection contract.

use async_trait::async_trait;

use crate::domain::entities::{Conn, DialerContext};
use crate::shared::error::Result;

/// Establishes a transport and performs the client side of the handshake.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Returns a ready connection or a fatal error. No retries happen here.
    async fn dial_and_handshake(&self, ctx: DialerContext) -> Result<Conn>;
}
