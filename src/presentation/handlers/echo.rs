//! Echo Listener

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::{Agent, MessageListener};

/// Pushes every inbound message back to its sender.
#[derive(Debug, Clone, Default)]
pub struct EchoListener;

#[async_trait]
impl MessageListener for EchoListener {
    async fn receive(&self, agent: Arc<dyn Agent>, payload: Bytes) {
        tracing::trace!(channel_id = %agent.id(), bytes = payload.len(), "Echo");
        if let Err(e) = agent.push(payload).await {
            tracing::warn!(channel_id = %agent.id(), error = %e, "Echo push failed");
        }
    }
}
