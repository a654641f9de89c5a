//! Outbound Dialers
//!
//! Concrete [`Dialer`] implementations for both transports. The client
//! side of the handshake is a single Text frame carrying the client ID,
//! which is what the bundled login acceptor expects on the server side.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::domain::{Conn, Dialer, DialerContext, OpCode};
use crate::infrastructure::codec::{tcp, websocket};
use crate::shared::error::{GatewayError, Result};

/// Default per-frame payload limit for dialed connections
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// Bound the whole dial plus login sequence by the context timeout.
async fn within<F>(ctx: &DialerContext, fut: F) -> Result<Conn>
where
    F: std::future::Future<Output = Result<Conn>>,
{
    if ctx.timeout == Duration::ZERO {
        return fut.await;
    }
    tokio::time::timeout(ctx.timeout, fut)
        .await
        .map_err(|_| GatewayError::HandshakeTimeout(ctx.timeout))?
}

async fn login(mut conn: Conn, ctx: &DialerContext) -> Result<Conn> {
    conn.write_frame(OpCode::Text, ctx.id.clone()).await?;
    conn.flush().await?;
    tracing::debug!(client_id = %ctx.id, address = %ctx.address, "Login frame sent");
    Ok(conn)
}

/// Dials the length-prefixed TCP wire format
#[derive(Debug, Clone)]
pub struct TcpDialer {
    max_payload: usize,
}

impl TcpDialer {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial_and_handshake(&self, ctx: DialerContext) -> Result<Conn> {
        within(&ctx, async {
            let stream = TcpStream::connect(ctx.address.as_str())
                .await
                .map_err(|e| GatewayError::Handshake(format!("connect {}: {}", ctx.address, e)))?;
            login(tcp::framed(stream, self.max_payload), &ctx).await
        })
        .await
    }
}

/// Dials a WebSocket endpoint
#[derive(Debug, Clone)]
pub struct WebSocketDialer {
    max_payload: usize,
}

impl WebSocketDialer {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    /// Accept bare `host:port` addresses as well as full URLs.
    fn url(address: &str) -> String {
        if address.starts_with("ws://") || address.starts_with("wss://") {
            address.to_string()
        } else {
            format!("ws://{}", address)
        }
    }
}

impl Default for WebSocketDialer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

#[async_trait]
impl Dialer for WebSocketDialer {
    async fn dial_and_handshake(&self, ctx: DialerContext) -> Result<Conn> {
        within(&ctx, async {
            let url = Self::url(&ctx.address);
            let (ws, _response) = tokio_tungstenite::connect_async_with_config(
                url.as_str(),
                Some(websocket::config(self.max_payload)),
                true,
            )
            .await
            .map_err(|e| GatewayError::Handshake(format!("connect {}: {}", url, e)))?;
            login(websocket::framed(ws), &ctx).await
        })
        .await
    }
}
