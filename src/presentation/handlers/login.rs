//! Login Acceptor
//!
//! The first data frame on a fresh connection carries the channel ID.
//! Ping frames sent before it are answered.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Acceptor, Conn, OpCode};
use crate::shared::error::{GatewayError, Result};

/// Longest channel ID accepted from a peer
pub const MAX_CHANNEL_ID_LEN: usize = 128;

#[derive(Debug, Clone, Default)]
pub struct LoginAcceptor;

impl LoginAcceptor {
    pub fn new() -> Self {
        Self
    }

    async fn read_login(conn: &mut Conn) -> Result<String> {
        loop {
            let frame = conn.read_frame().await?;
            match frame.op_code() {
                OpCode::Ping => {
                    conn.write_frame(OpCode::Pong, frame.into_payload()).await?;
                    conn.flush().await?;
                }
                OpCode::Pong => {}
                OpCode::Close => {
                    return Err(GatewayError::Handshake("closed before login".into()))
                }
                OpCode::Text | OpCode::Binary => {
                    let id = std::str::from_utf8(frame.payload())
                        .map_err(|_| GatewayError::Handshake("login is not UTF-8".into()))?
                        .trim();
                    if id.is_empty() {
                        return Err(GatewayError::Handshake("empty login".into()));
                    }
                    if id.len() > MAX_CHANNEL_ID_LEN {
                        return Err(GatewayError::Handshake(format!(
                            "login longer than {} bytes",
                            MAX_CHANNEL_ID_LEN
                        )));
                    }
                    return Ok(id.to_string());
                }
                OpCode::Continuation => {
                    return Err(GatewayError::Handshake("unexpected continuation".into()))
                }
            }
        }
    }
}

#[async_trait]
impl Acceptor for LoginAcceptor {
    async fn accept(&self, conn: &mut Conn, timeout: Duration) -> Result<String> {
        let channel_id = tokio::time::timeout(timeout, Self::read_login(conn))
            .await
            .map_err(|_| GatewayError::HandshakeTimeout(timeout))??;
        tracing::debug!(channel_id = %channel_id, "Login accepted");
        Ok(channel_id)
    }
}
