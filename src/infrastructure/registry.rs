//! Channel Registry
//!
//! Default [`ChannelMap`] backed by a sharded `DashMap`.
//!
//! # Concurrency
//!
//! ```text
//! push(id) ──> get(id) ──clone Arc──> shard lock released ──> agent.push().await
//! add(agent) ──> entry(id) ──vacant?──> insert        (same shard lock)
//! remove(id) ──> remove                               (same shard lock)
//! ```
//!
//! Lookups never hold a shard lock across an `.await`, so a slow push can
//! not stall registrations on the same shard.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{Agent, ChannelMap};
use crate::shared::error::{GatewayError, Result};

/// In-memory channel registry
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<dyn Agent>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the map for an expected number of concurrent channels
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::with_capacity(capacity),
        }
    }
}

#[async_trait]
impl ChannelMap for ChannelRegistry {
    fn add(&self, agent: Arc<dyn Agent>) -> Result<()> {
        match self.channels.entry(agent.id().to_string()) {
            Entry::Occupied(entry) => Err(GatewayError::DuplicateChannel(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(channel_id = %entry.key(), "Channel added");
                entry.insert(agent);
                Ok(())
            }
        }
    }

    fn remove(&self, channel_id: &str) {
        if self.channels.remove(channel_id).is_some() {
            tracing::debug!(channel_id = %channel_id, "Channel removed");
        }
    }

    fn get(&self, channel_id: &str) -> Option<Arc<dyn Agent>> {
        self.channels.get(channel_id).map(|entry| entry.value().clone())
    }

    fn channel_ids(&self) -> Vec<String> {
        self.channels.iter().map(|entry| entry.key().clone()).collect()
    }

    fn len(&self) -> usize {
        self.channels.len()
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channels.len())
            .finish()
    }
}
