//! Logging State Listener

use async_trait::async_trait;

use crate::domain::StateListener;
use crate::shared::error::Result;

/// Records disconnects in the log and nothing else.
#[derive(Debug, Clone, Default)]
pub struct LoggingStateListener;

#[async_trait]
impl StateListener for LoggingStateListener {
    async fn disconnect(&self, channel_id: &str) -> Result<()> {
        tracing::info!(channel_id = %channel_id, "Channel released");
        Ok(())
    }
}
