//! Channel registry contract.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::listeners::Agent;
use crate::shared::error::{GatewayError, Result};

/// Concurrent mapping from channel ID to a pushable agent.
///
/// Implementations must be safe under any number of concurrent callers and
/// must keep `add`/`remove` on the same key linearizable.
#[async_trait]
pub trait ChannelMap: Send + Sync {
    /// Register an agent under its ID.
    ///
    /// Fails with [`GatewayError::DuplicateChannel`] if the ID is taken; the
    /// existing entry is kept and the caller owns cleanup of the new one.
    fn add(&self, agent: Arc<dyn Agent>) -> Result<()>;

    /// Remove an entry. Absent keys are a no-op.
    fn remove(&self, channel_id: &str);

    fn get(&self, channel_id: &str) -> Option<Arc<dyn Agent>>;

    /// Snapshot of the registered IDs.
    fn channel_ids(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a channel and deliver `payload` to it.
    async fn push(&self, channel_id: &str, payload: Bytes) -> Result<()> {
        let agent = self
            .get(channel_id)
            .ok_or_else(|| GatewayError::ChannelNotFound(channel_id.to_string()))?;
        agent.push(payload).await
    }
}
